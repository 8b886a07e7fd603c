// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Core - Settings loading
//
// Settings come from a `KEY=value` env file, then process environment
// variables of the same names. Command-line flags are applied on top by
// each binary before `validate()` is called.

use crate::scan::ExtensionFilter;
use crate::types::{AppError, OverwritePolicy};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the settings file looked up in the working directory and the
/// per-user config directory
pub const ENV_FILE_NAME: &str = "wireless-file-copy.env";

pub const KEY_VAR: &str = "WIRELESS_FILE_COPY_KEY";
pub const ADDRESS_VAR: &str = "WIRELESS_FILE_COPY_ADDRESS";
pub const PORT_VAR: &str = "WIRELESS_FILE_COPY_PORT";
pub const OVERWRITE_VAR: &str = "WIRELESS_FILE_COPY_OVERWRITE_SETTINGS";
pub const EXTENSIONS_VAR: &str = "WIRELESS_FILE_COPY_ALLOWED_EXTENSIONS";
pub const CONNECT_TIMEOUT_VAR: &str = "WIRELESS_FILE_COPY_CONNECT_TIMEOUT";
pub const READ_TIMEOUT_VAR: &str = "WIRELESS_FILE_COPY_READ_TIMEOUT";

const ALL_VARS: [&str; 7] = [
    KEY_VAR,
    ADDRESS_VAR,
    PORT_VAR,
    OVERWRITE_VAR,
    EXTENSIONS_VAR,
    CONNECT_TIMEOUT_VAR,
    READ_TIMEOUT_VAR,
];

pub const DEFAULT_PORT: u16 = 14937;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Shared secret clients must present to `/auth/`
    pub authentication_key: String,
    /// Bind address; empty means every interface
    pub server_address: String,
    pub port: u16,
    /// Destination root for uploaded files
    pub root_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            authentication_key: String::new(),
            server_address: String::new(),
            port: DEFAULT_PORT,
            root_dir: PathBuf::from("."),
        }
    }
}

impl ServerSettings {
    /// Address passed to the listener
    pub fn bind_address(&self) -> &str {
        if self.server_address.trim().is_empty() {
            "0.0.0.0"
        } else {
            self.server_address.trim()
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.authentication_key.trim().is_empty() {
            return Err(AppError::InvalidConfig(format!(
                "authentication key is empty (set {} or --authentication-key)",
                KEY_VAR
            )));
        }
        if !self.root_dir.is_dir() {
            return Err(AppError::InvalidConfig(format!(
                "root directory does not exist: {}",
                self.root_dir.display()
            )));
        }
        Ok(())
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub authentication_key: String,
    /// Base URL of the server, e.g. `http://192.168.1.20:14937`
    pub endpoint: String,
    /// Local tree to mirror
    pub source_dir: PathBuf,
    pub overwrite: OverwritePolicy,
    pub allowed_extensions: ExtensionFilter,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            authentication_key: String::new(),
            endpoint: String::new(),
            source_dir: PathBuf::from("."),
            overwrite: OverwritePolicy::default(),
            allowed_extensions: ExtensionFilter::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl ClientSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.authentication_key.trim().is_empty() {
            return Err(AppError::InvalidConfig(format!(
                "authentication key is empty (set {} or --authentication-key)",
                KEY_VAR
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(AppError::InvalidConfig("server endpoint is empty".to_string()));
        }
        if self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(AppError::InvalidConfig(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if !self.source_dir.is_dir() {
            return Err(AppError::InvalidConfig(format!(
                "source directory does not exist: {}",
                self.source_dir.display()
            )));
        }
        Ok(())
    }
}

/// Parse the contents of an env file.
///
/// Blank lines, `#` comments and lines without `=` are ignored. Values may
/// be single- or double-quoted; unquoted values end at an inline ` #`.
/// The first occurrence of a key wins.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let key = key.strip_prefix("export ").unwrap_or(key).trim();
        if key.is_empty() {
            continue;
        }
        values
            .entry(key.to_string())
            .or_insert_with(|| parse_value(raw.trim()));
    }

    values
}

fn parse_value(raw: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            return match rest.find(quote) {
                Some(end) => rest[..end].to_string(),
                None => rest.to_string(),
            };
        }
    }
    match raw.find(" #") {
        Some(idx) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}

/// Merged view of the env file and the process environment
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    values: HashMap<String, String>,
    source: Option<PathBuf>,
}

impl SettingsLoader {
    /// Load from the first env file found, then overlay process variables
    pub fn load() -> Result<Self, AppError> {
        let (file_values, source) = match Self::find_env_file() {
            Some(path) => {
                tracing::info!("Loading settings from {:?}", path);
                let content = fs::read_to_string(&path).map_err(|e| {
                    AppError::FileIo(format!("Failed to read {}: {}", path.display(), e))
                })?;
                (parse_env_file(&content), Some(path))
            }
            None => {
                tracing::info!("No {} found, using defaults", ENV_FILE_NAME);
                (HashMap::new(), None)
            }
        };

        let mut loader = Self::from_sources(file_values, |var| std::env::var(var).ok());
        loader.source = source;
        Ok(loader)
    }

    /// Overlay variables returned by `lookup` onto `file_values`
    pub fn from_sources<F>(file_values: HashMap<String, String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = file_values;
        for var in ALL_VARS {
            if let Some(value) = lookup(var) {
                values.insert(var.to_string(), value);
            }
        }
        Self {
            values,
            source: None,
        }
    }

    /// Env file the settings were read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn find_env_file() -> Option<PathBuf> {
        let local = std::env::current_dir().ok()?.join(ENV_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        let user = directories::ProjectDirs::from("com", "wireless", "file-copy")?
            .config_dir()
            .join(ENV_FILE_NAME);
        user.is_file().then_some(user)
    }

    fn get(&self, var: &str) -> Option<&str> {
        self.values.get(var).map(String::as_str)
    }

    fn parse_number<T: std::str::FromStr>(&self, var: &str) -> Result<Option<T>, AppError> {
        match self.get(var) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| {
                    AppError::InvalidConfig(format!("{} is not a valid number: {}", var, raw))
                }),
            None => Ok(None),
        }
    }

    /// Server settings before command-line overrides
    pub fn server_settings(&self) -> Result<ServerSettings, AppError> {
        let mut settings = ServerSettings::default();
        if let Some(key) = self.get(KEY_VAR) {
            settings.authentication_key = key.to_string();
        }
        if let Some(address) = self.get(ADDRESS_VAR) {
            settings.server_address = address.to_string();
        }
        if let Some(port) = self.parse_number(PORT_VAR)? {
            settings.port = port;
        }
        Ok(settings)
    }

    /// Client settings before command-line overrides
    pub fn client_settings(&self) -> Result<ClientSettings, AppError> {
        let mut settings = ClientSettings::default();
        if let Some(key) = self.get(KEY_VAR) {
            settings.authentication_key = key.to_string();
        }
        if let Some(policy) = self.get(OVERWRITE_VAR) {
            settings.overwrite = policy.parse()?;
        }
        if let Some(list) = self.get(EXTENSIONS_VAR) {
            settings.allowed_extensions = ExtensionFilter::parse(list);
        }
        if let Some(secs) = self.parse_number(CONNECT_TIMEOUT_VAR)? {
            settings.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.parse_number(READ_TIMEOUT_VAR)? {
            settings.read_timeout_secs = secs;
        }
        Ok(settings)
    }
}
