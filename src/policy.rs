use crate::config::Config;
use std::net::IpAddr;

/// Envelope address split at the last `@`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub local_part: String,
    pub domain: String,
}

impl EmailAddress {
    /// Parse an envelope argument as handed over by the MTA, tolerating the
    /// angle-bracket form (`<user@example.com>`). Returns `None` for empty
    /// senders (the null reverse-path) and anything without a domain.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim();
        if trimmed.is_empty() {
            return None;
        }

        let at = trimmed.rfind('@')?;
        let (local_part, domain) = trimmed.split_at(at);
        Some(EmailAddress {
            local_part: local_part.to_string(),
            domain: domain[1..].to_string(),
        })
    }
}

/// Per-message transaction state accumulated across milter callbacks.
#[derive(Debug, Default, Clone)]
pub struct MailContext {
    pub hostname: Option<String>,
    pub helo: Option<String>,
    pub client_ip: Option<IpAddr>,
    pub is_local: bool,
    pub is_private: bool,
    pub relaying: bool,
    pub auth_user: Option<String>,
    pub queue_id: Option<String>,
    pub mail_from: Option<EmailAddress>,
    pub recipients: Vec<EmailAddress>,
    pub subject: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MailContext {
    /// Reassemble the message as captured from the milter header and body
    /// callbacks, for submission to the scanner.
    pub fn message_bytes(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(self.body.len() + 256);
        for (name, value) in &self.headers {
            message.extend_from_slice(name.as_bytes());
            message.extend_from_slice(b": ");
            message.extend_from_slice(value.as_bytes());
            message.extend_from_slice(b"\r\n");
        }
        message.extend_from_slice(b"\r\n");
        message.extend_from_slice(&self.body);
        message
    }
}

pub fn is_local_ip(ip: &IpAddr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => ip.is_private() || ip.is_link_local(),
        // Unique-local (fc00::/7) and link-local (fe80::/10) ranges
        IpAddr::V6(ip) => {
            (ip.segments()[0] & 0xfe00) == 0xfc00 || (ip.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Decide whether a message should be submitted to the scanner.
///
/// Authentication and relay status outrank network locality, and a local
/// address outranks a private one, so the first applicable gate wins.
pub fn should_check(ctx: &MailContext, cfg: &Config) -> bool {
    if ctx.auth_user.is_some() {
        return cfg.check.authenticated;
    }
    if ctx.relaying {
        return cfg.check.relay;
    }
    if ctx.is_local {
        return cfg.check.local_ip;
    }
    if ctx.is_private {
        return cfg.check.private_ip;
    }
    true
}
