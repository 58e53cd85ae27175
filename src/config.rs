use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub socket_path: String,
    pub main: MainConfig,
    pub check: CheckConfig,
    pub reject: RejectConfig,
    pub header: HeaderConfig,
}

/// Scanner endpoint and annotation mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    pub add_headers: AddHeadersMode,
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

/// Per-connection-condition scan gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub local_ip: bool,
    pub private_ip: bool,
    pub authenticated: bool,
    pub relay: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectConfig {
    pub spam: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub bar: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddHeadersMode {
    Always,
    Never,
    Sometimes,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            socket_path: "/var/run/rspamd-milter.sock".to_string(),
            main: MainConfig::default(),
            check: CheckConfig::default(),
            reject: RejectConfig::default(),
            header: HeaderConfig::default(),
        }
    }
}

impl Default for MainConfig {
    fn default() -> Self {
        MainConfig {
            add_headers: AddHeadersMode::Sometimes,
            host: "localhost".to_string(),
            port: 11333,
            timeout_secs: 29,
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            local_ip: true,
            private_ip: true,
            authenticated: true,
            relay: true,
        }
    }
}

impl Default for RejectConfig {
    fn default() -> Self {
        RejectConfig {
            spam: true,
            message: "Message rejected by content scanner".to_string(),
        }
    }
}

impl Default for HeaderConfig {
    fn default() -> Self {
        HeaderConfig { bar: true }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.main.add_headers, AddHeadersMode::Sometimes);
        assert_eq!(config.main.port, 11333);
        assert!(config.check.local_ip);
        assert!(config.check.private_ip);
        assert!(config.reject.spam);
        assert!(config.header.bar);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
socket_path: /tmp/test.sock
main:
  add_headers: always
  host: scanner.internal
  port: 11334
check:
  local_ip: false
  authenticated: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.socket_path, "/tmp/test.sock");
        assert_eq!(config.main.add_headers, AddHeadersMode::Always);
        assert_eq!(config.main.host, "scanner.internal");
        assert_eq!(config.main.port, 11334);
        assert!(!config.check.local_ip);
        assert!(!config.check.authenticated);
        // Unset keys keep their defaults
        assert!(config.check.private_ip);
        assert!(config.reject.spam);
    }

    #[test]
    fn test_add_headers_modes() {
        for (text, mode) in [
            ("always", AddHeadersMode::Always),
            ("never", AddHeadersMode::Never),
            ("sometimes", AddHeadersMode::Sometimes),
        ] {
            let yaml = format!("main:\n  add_headers: {text}\n");
            let config: Config = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(config.main.add_headers, mode);
        }
    }
}
