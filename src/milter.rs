use crate::config::Config;
use crate::headers::{add_headers, wants_headers_added, HeaderSet};
use crate::options::get_options;
use crate::policy::{is_local_ip, is_private_ip, should_check, EmailAddress, MailContext};
use crate::scanner::Scanner;
use crate::verdict::ACTION_REJECT;
use indymilter::{run, Actions, Callbacks, Config as IndyConfig, ContextActions, SocketInfo, Status};
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::{Arc, Mutex};
use tokio::net::UnixListener;

pub struct Milter {
    config: Arc<Config>,
    scanner: Arc<Scanner>,
}

// Simple state storage
type StateMap = Arc<Mutex<HashMap<String, MailContext>>>;

impl Milter {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let scanner = Arc::new(Scanner::new(&config)?);
        Ok(Milter {
            config: Arc::new(config),
            scanner,
        })
    }

    pub async fn run(&self, socket_path: &str) -> anyhow::Result<()> {
        log::info!("Starting milter on: {}", socket_path);
        // Remove existing socket if it exists
        if std::path::Path::new(socket_path).exists() {
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        let config = self.config.clone();
        let scanner = self.scanner.clone();
        let state: StateMap = Arc::new(Mutex::new(HashMap::new()));

        // Create callbacks with explicit type annotation
        let callbacks: Callbacks<()> = Callbacks {
            connect: Some(Box::new({
                let state = state.clone();
                move |_ctx: &mut indymilter::Context<()>, hostname, socket_info| {
                    let state = state.clone();
                    Box::pin(async move {
                        let hostname_str = hostname.to_string_lossy().to_string();
                        let client_ip = match socket_info {
                            SocketInfo::Inet(addr) => Some(addr.ip()),
                            _ => None,
                        };
                        log::debug!("Connection from: {hostname_str} ({client_ip:?})");
                        let mail_ctx = MailContext {
                            hostname: Some(hostname_str.clone()),
                            client_ip,
                            is_local: client_ip.as_ref().map(is_local_ip).unwrap_or(false),
                            is_private: client_ip.as_ref().map(is_private_ip).unwrap_or(false),
                            ..Default::default()
                        };
                        state.lock().unwrap().insert(hostname_str, mail_ctx);
                        Status::Continue
                    })
                }
            })),

            helo: Some(Box::new({
                let state = state.clone();
                move |_ctx: &mut indymilter::Context<()>, helo_host| {
                    let state = state.clone();
                    Box::pin(async move {
                        let helo_str = helo_host.to_string_lossy().to_string();
                        log::debug!("Helo: {helo_str}");
                        if let Some((_, mail_ctx)) = state.lock().unwrap().iter_mut().last() {
                            mail_ctx.helo = Some(helo_str);
                        }
                        Status::Continue
                    })
                }
            })),

            mail: Some(Box::new({
                let state = state.clone();
                move |ctx: &mut indymilter::Context<()>, sender| {
                    let state = state.clone();
                    let auth_user = CString::new("{auth_authen}").ok().and_then(|name| {
                        ctx.macros
                            .get(name.as_c_str())
                            .map(|value| value.to_string_lossy().to_string())
                    });
                    Box::pin(async move {
                        let sender_str = sender
                            .first()
                            .map(|s| s.to_string_lossy().to_string())
                            .unwrap_or_default();
                        log::debug!("Mail from: {sender_str} (auth user: {auth_user:?})");
                        // Update the most recent context
                        if let Some((_, mail_ctx)) = state.lock().unwrap().iter_mut().last() {
                            mail_ctx.mail_from = EmailAddress::parse(&sender_str);
                            mail_ctx.auth_user = auth_user;
                        }
                        Status::Continue
                    })
                }
            })),

            rcpt: Some(Box::new({
                let state = state.clone();
                move |_ctx: &mut indymilter::Context<()>, recipient| {
                    let state = state.clone();
                    Box::pin(async move {
                        let recipient_str = recipient
                            .first()
                            .map(|s| s.to_string_lossy().to_string())
                            .unwrap_or_default();
                        log::debug!("Rcpt to: {recipient_str}");
                        if let Some((_, mail_ctx)) = state.lock().unwrap().iter_mut().last() {
                            if let Some(addr) = EmailAddress::parse(&recipient_str) {
                                mail_ctx.recipients.push(addr);
                            }
                        }
                        Status::Continue
                    })
                }
            })),

            header: Some(Box::new({
                let state = state.clone();
                move |_ctx: &mut indymilter::Context<()>, name, value| {
                    let state = state.clone();
                    Box::pin(async move {
                        let name_str = name.to_string_lossy().to_string();
                        let value_str = value.to_string_lossy().to_string();

                        if let Some((_, mail_ctx)) = state.lock().unwrap().iter_mut().last() {
                            if name_str.eq_ignore_ascii_case("subject") {
                                mail_ctx.subject = Some(value_str.clone());
                            }
                            mail_ctx.headers.push((name_str, value_str));
                        }
                        Status::Continue
                    })
                }
            })),

            body: Some(Box::new({
                let state = state.clone();
                move |_ctx: &mut indymilter::Context<()>, body_chunk| {
                    let state = state.clone();
                    Box::pin(async move {
                        if let Some((_, mail_ctx)) = state.lock().unwrap().iter_mut().last() {
                            mail_ctx.body.extend_from_slice(&body_chunk);
                        }
                        Status::Continue
                    })
                }
            })),

            eom: Some(Box::new({
                let config = config.clone();
                let scanner = scanner.clone();
                let state = state.clone();
                move |ctx: &mut indymilter::EomContext<()>| {
                    let config = config.clone();
                    let scanner = scanner.clone();
                    let state = state.clone();
                    Box::pin(async move {
                        log::info!("End of message - evaluating");

                        // Clone mail context to avoid holding mutex across await
                        let mail_ctx_clone = state.lock().unwrap().values().last().cloned();
                        let Some(mut mail_ctx) = mail_ctx_clone else {
                            return Status::Accept;
                        };

                        mail_ctx.queue_id = CString::new("i").ok().and_then(|name| {
                            ctx.macros
                                .get(name.as_c_str())
                                .map(|value| value.to_string_lossy().to_string())
                        });

                        if !should_check(&mail_ctx, &config) {
                            log::debug!(
                                "Scan skipped by policy for {:?}",
                                mail_ctx.queue_id.as_deref().unwrap_or("<no queue id>")
                            );
                            return Status::Accept;
                        }

                        let options = get_options(&mail_ctx);
                        let message = mail_ctx.message_bytes();
                        let verdict = match scanner.check(&options, message).await {
                            Some(verdict) => verdict,
                            None => {
                                // Fail open: no verdict means default disposition
                                log::info!("No scanner verdict, accepting message");
                                return Status::Accept;
                            }
                        };

                        log::info!(
                            "Scanner verdict: score {} action {:?}",
                            verdict.score,
                            verdict.action
                        );

                        if wants_headers_added(&verdict, &config) {
                            let mut headers = HeaderSet::default();
                            add_headers(&mut headers, &config, &verdict);
                            for (name, value) in headers.iter() {
                                if let Err(e) = ctx
                                    .actions
                                    .add_header(name.to_string(), value.to_string())
                                    .await
                                {
                                    log::error!("Failed to add header: {e}");
                                }
                            }
                        }

                        if verdict.action == ACTION_REJECT && config.reject.spam {
                            log::info!("Rejecting message: {}", config.reject.message);
                            return Status::Reject;
                        }

                        Status::Accept
                    })
                }
            })),

            ..Default::default()
        };

        // Configure indymilter to enable ADD_HEADER action
        let indy_config = IndyConfig {
            actions: Actions::ADD_HEADER,
            ..Default::default()
        };

        run(listener, callbacks, indy_config, tokio::signal::ctrl_c()).await?;
        Ok(())
    }
}
