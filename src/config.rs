//! Session configuration
//!
//! `SessionConfig` is a plain serde struct persisted as JSON. Binary RFC 4777
//! values (substitute password, Kerberos ticket) are stored base64 encoded.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::lib5250::display::{DEFAULT_COLS, DEFAULT_ROWS, WIDE_COLS, WIDE_ROWS};
use crate::lib5250::telnet::{EnvVar, IBMRSEED, IBMSUBSPW, IBMTICKET};
use crate::lib5250::TerminalType;
use crate::network::TlsOptions;
use crate::protocol_common::ebcdic::{supported_ccsids, CodePage};
use crate::protocol_common::DEFAULT_CCSID;

/// Port of the TLS variant of the Telnet service
pub const TLS_PORT: u16 = 992;
pub const DEFAULT_PORT: u16 = 23;

/// Environment variable overriding the default config file location
pub const CONFIG_PATH_ENV: &str = "TN5250E_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// `None` means TLS exactly when the port is 992
    pub tls: Option<bool>,
    /// PEM or DER trust anchors replacing the platform roots
    pub tls_ca_bundle: Option<PathBuf>,
    pub ccsid: u16,
    /// TERMINAL-TYPE name, e.g. "IBM-3477-FC"
    pub terminal_type: String,
    /// Screen size override; defaults to the terminal type's size
    pub screen_size: Option<(usize, usize)>,
    pub connect_timeout_secs: u64,
    pub negotiation_timeout_secs: u64,
    /// Display device name (DEVNAME)
    pub device_name: Option<String>,
    pub user: Option<String>,
    /// Keyboard type (KBDTYPE)
    pub keyboard_type: String,
    /// Base64 IBMSUBSPW value
    pub substitute_password: Option<String>,
    /// Base64 IBMTICKET value
    pub ticket: Option<String>,
    /// Extra USERVARs offered during NEW-ENVIRON
    pub environment: BTreeMap<String, String>,
    /// Queue depth of each async event subscriber
    pub event_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            tls: None,
            tls_ca_bundle: None,
            ccsid: DEFAULT_CCSID,
            terminal_type: TerminalType::default().as_str().to_string(),
            screen_size: None,
            connect_timeout_secs: 30,
            negotiation_timeout_secs: 10,
            device_name: None,
            user: None,
            keyboard_type: "USB".to_string(),
            substitute_password: None,
            ticket: None,
            environment: BTreeMap::new(),
            event_channel_capacity: crate::events::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, ..Self::default() }
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.unwrap_or(self.port == TLS_PORT)
    }

    /// TLS trust settings when TLS is on
    pub fn tls_options(&self) -> Option<TlsOptions> {
        self.tls_enabled().then(|| TlsOptions { ca_bundle: self.tls_ca_bundle.clone() })
    }

    pub fn terminal(&self) -> TerminalType {
        TerminalType::from_name(&self.terminal_type)
    }

    pub fn screen_size(&self) -> (usize, usize) {
        self.screen_size.unwrap_or_else(|| self.terminal().screen_size())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiation_timeout_secs)
    }

    pub fn codepage(&self) -> Result<&'static CodePage, ConfigError> {
        CodePage::for_ccsid(self.ccsid).map_err(|e| invalid("ccsid", self.ccsid, e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("host", &self.host, "host is required"));
        }
        if self.port == 0 {
            return Err(invalid("port", self.port, "port must be 1-65535"));
        }
        if !supported_ccsids().contains(&self.ccsid) {
            return Err(invalid("ccsid", self.ccsid, format!("supported: {:?}", supported_ccsids())));
        }
        if self.terminal_type.trim().is_empty() || self.terminal_type.len() > 40 {
            return Err(invalid("terminal_type", &self.terminal_type, "1-40 characters required"));
        }
        if let Some((rows, cols)) = self.screen_size {
            if (rows, cols) != (DEFAULT_ROWS, DEFAULT_COLS) && (rows, cols) != (WIDE_ROWS, WIDE_COLS) {
                return Err(invalid("screen_size", format!("{rows}x{cols}"), "must be 24x80 or 27x132"));
            }
        }
        if self.connect_timeout_secs == 0 {
            return Err(invalid("connect_timeout_secs", 0, "must be positive"));
        }
        if self.negotiation_timeout_secs == 0 {
            return Err(invalid("negotiation_timeout_secs", 0, "must be positive"));
        }
        if self.event_channel_capacity == 0 {
            return Err(invalid("event_channel_capacity", 0, "must be positive"));
        }
        if let Some(name) = &self.device_name {
            if name.is_empty() || name.len() > 10 {
                return Err(invalid("device_name", name, "1-10 characters required"));
            }
        }
        decode_secret("substitute_password", self.substitute_password.as_deref())?;
        decode_secret("ticket", self.ticket.as_deref())?;
        Ok(())
    }

    /// Variables offered to the host's NEW-ENVIRON SEND, with a fresh
    /// client seed
    pub fn environment(&self) -> Result<Vec<EnvVar>, ConfigError> {
        let mut vars = Vec::new();
        if let Some(user) = &self.user {
            vars.push(EnvVar::var("USER", user.as_str()));
        }
        if let Some(device) = &self.device_name {
            vars.push(EnvVar::user_var("DEVNAME", device.as_str()));
        }
        let (code_page, charset) = code_page_and_charset(self.ccsid);
        vars.push(EnvVar::user_var("KBDTYPE", self.keyboard_type.as_str()));
        vars.push(EnvVar::user_var("CODEPAGE", code_page.to_string()));
        vars.push(EnvVar::user_var("CHARSET", charset.to_string()));

        let mut seed = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut seed);
        vars.push(EnvVar::user_var(IBMRSEED, seed.to_vec()));
        if let Some(password) = decode_secret("substitute_password", self.substitute_password.as_deref())? {
            vars.push(EnvVar::user_var(IBMSUBSPW, password));
        }
        if let Some(ticket) = decode_secret("ticket", self.ticket.as_deref())? {
            vars.push(EnvVar::user_var(IBMTICKET, ticket));
        }
        for (name, value) in &self.environment {
            vars.push(EnvVar::user_var(name, value.as_str()));
        }
        Ok(vars)
    }

    /// Store a binary substitute password
    pub fn set_substitute_password(&mut self, password: &[u8]) {
        self.substitute_password = Some(BASE64.encode(password));
    }

    pub fn set_ticket(&mut self, ticket: &[u8]) {
        self.ticket = Some(BASE64.encode(ticket));
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| file_error(path, e))?;
        let config = Self::from_json(&json)?;
        debug!("loaded session config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| file_error(parent, e))?;
        }
        fs::write(path, self.to_json()?).map_err(|e| file_error(path, e))
    }

    /// Config at [`default_config_path`], or defaults when there is none
    pub fn load_default() -> Self {
        let path = default_config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// `$TN5250E_CONFIG`, else `<config dir>/tn5250e/session.json`, else
/// `./session.json`
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("tn5250e").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("session.json"))
}

/// Code page and character set ids sent as CODEPAGE and CHARSET
pub fn code_page_and_charset(ccsid: u16) -> (u16, u16) {
    match ccsid {
        930 => (290, 1172),
        424 => (ccsid, 941),
        870 => (ccsid, 959),
        875 => (ccsid, 925),
        1025 => (ccsid, 1150),
        1026 => (ccsid, 1126),
        1112 => (ccsid, 1305),
        1140..=1148 => (ccsid, 695),
        other => (other, 697),
    }
}

fn decode_secret(parameter: &str, value: Option<&str>) -> Result<Option<Vec<u8>>, ConfigError> {
    value
        .map(|v| BASE64.decode(v).map_err(|e| invalid(parameter, "<redacted>", format!("invalid base64: {e}"))))
        .transpose()
}

fn invalid(parameter: &str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn file_error(path: &Path, error: std::io::Error) -> ConfigError {
    ConfigError::FileError { path: path.display().to_string(), error: error.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib5250::telnet::EnvVarKind;

    #[test]
    fn test_code_page_and_charset() {
        assert_eq!(code_page_and_charset(37), (37, 697));
        assert_eq!(code_page_and_charset(285), (285, 697));
        assert_eq!(code_page_and_charset(930), (290, 1172));
        assert_eq!(code_page_and_charset(1025), (1025, 1150));
        assert_eq!(code_page_and_charset(1141), (1141, 695));
    }

    #[test]
    fn test_tls_default_for_port_992() {
        assert!(SessionConfig::new("example.com", 992).tls_enabled());
        assert!(!SessionConfig::new("example.com", 23).tls_enabled());

        let mut config = SessionConfig::new("example.com", 23);
        config.tls = Some(true);
        assert!(config.tls_enabled());
        let mut config = SessionConfig::new("example.com", 992);
        config.tls = Some(false);
        assert!(config.tls_options().is_none());
    }

    #[test]
    fn test_screen_size_follows_terminal_type() {
        let mut config = SessionConfig::new("h", 23);
        assert_eq!(config.screen_size(), (27, 132));
        config.terminal_type = "IBM-3179-2".to_string();
        assert_eq!(config.screen_size(), (24, 80));
        config.screen_size = Some((27, 132));
        assert_eq!(config.screen_size(), (27, 132));
    }

    #[test]
    fn test_validate() {
        assert!(SessionConfig::new("as400.example.com", 23).validate().is_ok());
        assert!(matches!(
            SessionConfig::default().validate(),
            Err(ConfigError::InvalidParameter { ref parameter, .. }) if parameter == "host"
        ));

        let mut config = SessionConfig::new("h", 23);
        config.ccsid = 1208;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::new("h", 23);
        config.screen_size = Some((25, 80));
        assert!(config.validate().is_err());

        let mut config = SessionConfig::new("h", 23);
        config.substitute_password = Some("not base64!".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_vars() {
        let mut config = SessionConfig::new("h", 23);
        config.user = Some("QUSER".to_string());
        config.device_name = Some("QPADEV0001".to_string());
        config.set_substitute_password(&[1, 2, 3, 4, 5, 6, 7, 8]);
        config.environment.insert("IBMIGNORE".to_string(), "1".to_string());

        let vars = config.environment().unwrap();
        let find = |name: &str| vars.iter().find(|v| v.name == name).cloned();
        assert_eq!(find("USER").unwrap().kind, EnvVarKind::Var);
        assert_eq!(find("DEVNAME").unwrap().value, Some(b"QPADEV0001".to_vec()));
        assert_eq!(find("CODEPAGE").unwrap().value, Some(b"37".to_vec()));
        assert_eq!(find("CHARSET").unwrap().value, Some(b"697".to_vec()));
        assert_eq!(find(IBMRSEED).unwrap().value.unwrap().len(), 8);
        assert_eq!(find(IBMSUBSPW).unwrap().value, Some(vec![1, 2, 3, 4, 5, 6, 7, 8]));
        assert!(find(IBMTICKET).is_none());
        assert!(find("IBMIGNORE").is_some());
    }

    #[test]
    fn test_json_round_trip_and_partial_input() {
        let mut config = SessionConfig::new("as400.example.com", 992);
        config.set_ticket(b"ticket");
        let json = config.to_json().unwrap();
        assert_eq!(SessionConfig::from_json(&json).unwrap(), config);

        let partial = SessionConfig::from_json(r#"{"host": "h", "ccsid": 273}"#).unwrap();
        assert_eq!(partial.port, 23);
        assert_eq!(partial.ccsid, 273);
        assert!(matches!(SessionConfig::from_json("{"), Err(ConfigError::Format { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let config = SessionConfig::new("as400.example.com", 23);
        config.save(&path).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap(), config);
        assert!(matches!(
            SessionConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::FileError { .. })
        ));
    }
}
