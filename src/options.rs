use crate::encoding::to_ascii;
use crate::policy::{EmailAddress, MailContext};
use std::fmt;

/// Placeholder substituted for a mailbox local part that cannot be
/// represented in ASCII. Scanners cannot reliably interpret non-ASCII local
/// parts, so a fixed marker keeps the address syntactically valid while
/// signaling the substitution.
pub const UTF8_LOCAL_PART: &str = "utf8-local-part";

enum LocalPart<'a> {
    Ascii(&'a str),
    NonAscii,
}

impl<'a> From<&'a str> for LocalPart<'a> {
    fn from(local: &'a str) -> Self {
        if local.is_ascii() {
            LocalPart::Ascii(local)
        } else {
            LocalPart::NonAscii
        }
    }
}

impl fmt::Display for LocalPart<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalPart::Ascii(local) => f.write_str(local),
            LocalPart::NonAscii => f.write_str(UTF8_LOCAL_PART),
        }
    }
}

/// Request metadata sent to the scanner as protocol headers.
///
/// Repeated names are allowed (one `Rcpt` entry per recipient), so this is an
/// ordered list rather than a map.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    entries: Vec<(String, String)>,
}

impl ScanOptions {
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        // Header values travel on a single protocol line
        let value = value.replace(['\r', '\n'], " ");
        self.entries.push((name.to_string(), value));
    }

    /// First value recorded under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the scan request metadata from the transaction.
///
/// HELO hosts and sender domains go through punycode conversion; everything
/// else is ASCII-transparent and passes through as captured. Absent
/// transaction fields simply yield absent entries.
pub fn get_options(ctx: &MailContext) -> ScanOptions {
    let mut options = ScanOptions::default();

    if let Some(helo) = &ctx.helo {
        options.push("Helo", to_ascii(helo));
    }
    if let Some(from) = &ctx.mail_from {
        options.push("From", render_sender(from));
    }
    for rcpt in &ctx.recipients {
        options.push("Rcpt", format!("{}@{}", rcpt.local_part, rcpt.domain));
    }
    if let Some(ip) = ctx.client_ip {
        options.push("IP", ip.to_string());
    }
    if let Some(hostname) = &ctx.hostname {
        options.push("Hostname", hostname.clone());
    }
    if let Some(user) = &ctx.auth_user {
        options.push("User", user.clone());
    }
    if let Some(queue_id) = &ctx.queue_id {
        options.push("Queue-Id", queue_id.clone());
    }
    if let Some(subject) = &ctx.subject {
        options.push("Subject", subject.clone());
    }

    options
}

fn render_sender(addr: &EmailAddress) -> String {
    format!(
        "{}@{}",
        LocalPart::from(addr.local_part.as_str()),
        to_ascii(&addr.domain)
    )
}
