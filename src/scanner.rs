use crate::config::Config;
use crate::options::ScanOptions;
use crate::verdict::{parse_response, Verdict};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// HTTP client for the scanner's `checkv2` endpoint.
///
/// Transport failures never surface as errors: every degradation path ends in
/// `None` so the pipeline applies its default disposition instead of failing
/// closed on a third-party outage.
pub struct Scanner {
    client: Client,
    endpoint: String,
}

impl Scanner {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.main.timeout_secs))
            .user_agent(concat!("rspamd-milter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let endpoint = format!("http://{}:{}/checkv2", config.main.host, config.main.port);
        Url::parse(&endpoint)?;

        Ok(Scanner { client, endpoint })
    }

    /// Submit a message for scanning and interpret the reply.
    ///
    /// The request carries the scan options as protocol headers and the raw
    /// message bytes as the body; the complete buffered response body is
    /// handed to the parser exactly once.
    pub async fn check(&self, options: &ScanOptions, message: Vec<u8>) -> Option<Verdict> {
        let mut request = self.client.post(&self.endpoint);
        for (name, value) in options.iter() {
            request = request.header(name, value);
        }

        let response = match request.body(message).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("scanner request failed: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            log::warn!("scanner returned HTTP {}", response.status());
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("failed to read scanner response: {e}");
                return None;
            }
        };

        log::debug!("scanner response: {body}");
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_config() {
        let config = Config::default();
        let scanner = Scanner::new(&config).unwrap();
        assert_eq!(scanner.endpoint, "http://localhost:11333/checkv2");
    }

    #[test]
    fn test_endpoint_custom_host() {
        let mut config = Config::default();
        config.main.host = "scan.example.net".to_string();
        config.main.port = 11334;
        let scanner = Scanner::new(&config).unwrap();
        assert_eq!(scanner.endpoint, "http://scan.example.net:11334/checkv2");
    }
}
