use idna::domain_to_ascii;

/// Convert a domain label to its ASCII-compatible (punycode) form.
///
/// Pure-ASCII input is returned as-is, which also makes the conversion
/// idempotent: an already-encoded `xn--` label passes straight through.
/// Conversion failures fall back to the original string so that option
/// building never blocks message delivery.
pub fn to_ascii(label: &str) -> String {
    if label.is_ascii() {
        return label.to_string();
    }

    match domain_to_ascii(label) {
        Ok(ascii) => ascii,
        Err(e) => {
            log::debug!("punycode conversion failed for {label:?}: {e:?}");
            label.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(to_ascii("example.com"), "example.com");
        assert_eq!(to_ascii(""), "");
        assert_eq!(to_ascii("mail.example.com"), "mail.example.com");
    }

    #[test]
    fn test_punycode_conversion() {
        assert_eq!(to_ascii("münchen.example"), "xn--mnchen-3ya.example");
        assert_eq!(to_ascii("bücher.example"), "xn--bcher-kva.example");
    }

    #[test]
    fn test_idempotent() {
        let once = to_ascii("münchen.example");
        assert_eq!(to_ascii(&once), once);

        let ascii = to_ascii("example.com");
        assert_eq!(to_ascii(&ascii), ascii);
    }
}
