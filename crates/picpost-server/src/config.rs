use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::{eyre::WrapErr, Result};
use dirs::config_dir;
use picpost_core::records::PasswordRedaction;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured passphrase.
pub const PASSPHRASE_ENV: &str = "PICPOST_SECRET_KEY";

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_PASSPHRASE: &str = "password";
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

/// Server configuration loaded from `~/.config/picpost/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Listen address for the HTTP surface.
    pub bind_address: Option<String>,
    /// Override for the data directory (file store).
    pub data_dir: Option<PathBuf>,
    /// Record store backend.
    pub store: Option<StoreKind>,
    /// Wait ceiling applied to every store call.
    pub store_timeout_secs: Option<u64>,
    /// Passphrase the credential key is derived from.
    pub passphrase: Option<String>,
    /// How passwords are shaped on outbound users.
    pub password_redaction: Option<PasswordRedaction>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

/// Where the effective passphrase came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassphraseSource {
    Env,
    File,
    Default,
}

impl Config {
    /// Defaults written by `picpost config init`. Leaves the passphrase unset.
    pub fn template() -> Self {
        Self {
            bind_address: Some(DEFAULT_BIND_ADDRESS.to_string()),
            data_dir: None,
            store: Some(StoreKind::File),
            store_timeout_secs: Some(DEFAULT_STORE_TIMEOUT_SECS),
            passphrase: None,
            password_redaction: Some(PasswordRedaction::Strip),
        }
    }

    pub fn bind_address(&self) -> String {
        self.bind_address
            .clone()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store.unwrap_or_default()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(
            self.store_timeout_secs
                .unwrap_or(DEFAULT_STORE_TIMEOUT_SECS),
        )
    }

    pub fn password_redaction(&self) -> PasswordRedaction {
        self.password_redaction.unwrap_or_default()
    }

    /// Resolve the passphrase: environment, then config file, then the default.
    pub fn passphrase(&self) -> (String, PassphraseSource) {
        self.passphrase_with_env(std::env::var(PASSPHRASE_ENV).ok())
    }

    fn passphrase_with_env(&self, env: Option<String>) -> (String, PassphraseSource) {
        if let Some(value) = env.filter(|v| !v.is_empty()) {
            return (value, PassphraseSource::Env);
        }
        match &self.passphrase {
            Some(value) if !value.is_empty() => (value.clone(), PassphraseSource::File),
            _ => (DEFAULT_PASSPHRASE.to_string(), PassphraseSource::Default),
        }
    }
}

/// Read the picpost config from `<config dir>/picpost/config.toml`.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Read a picpost config file. A missing or blank file yields
/// `Config::default()`, whose resolvers supply the server defaults
/// (bind `0.0.0.0:3000`, file store, 30 s store ceiling).
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(err) => {
            return Err(err).wrap_err_with(|| format!("reading {}", path.display()));
        }
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    toml::from_str(&contents).wrap_err_with(|| format!("parsing {}", path.display()))
}

/// `<platform config dir>/picpost/config.toml`, used when `--config` is absent.
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("picpost").join("config.toml"))
}

/// Write the config template to `path` unless a file is already there.
pub fn write_template_if_missing(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(&Config::template())?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
