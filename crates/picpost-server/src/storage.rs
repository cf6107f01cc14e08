use std::{path::PathBuf, sync::Arc};

use color_eyre::Result;
use dirs::data_dir;
use picpost_core::store::{BoundedStore, InMemoryRecordStore, RecordStore};
use picpost_service::ServiceSettings;
use picpost_storage::file_record_store::FileRecordStore;
use tracing::{debug, warn};

use crate::config::{Config, PassphraseSource, StoreKind, PASSPHRASE_ENV};

/// Store handle shared by every request: the configured backend behind one wait ceiling.
pub type SharedStore = BoundedStore<Arc<dyn RecordStore>>;

/// Resolve the default data directory for Picpost.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("picpost"))
}

/// Build the record store described by the config.
pub fn store_from_config(config: &Config) -> Result<SharedStore> {
    let backend: Arc<dyn RecordStore> = match config.store_kind() {
        StoreKind::File => {
            let root = match &config.data_dir {
                Some(root) => root.clone(),
                None => default_data_dir()?,
            };
            debug!(?root, "initializing file record store");
            Arc::new(FileRecordStore::new(root))
        }
        StoreKind::Memory => {
            warn!("using in-memory record store; records are lost on exit");
            Arc::new(InMemoryRecordStore::new())
        }
    };
    Ok(BoundedStore::new(backend, config.store_timeout()))
}

/// Build the immutable service settings from config and environment.
pub fn settings_from_config(config: &Config) -> ServiceSettings {
    let (passphrase, source) = config.passphrase();
    match source {
        PassphraseSource::Default => warn!(
            "no passphrase configured; set {PASSPHRASE_ENV} or `passphrase` in the config file"
        ),
        PassphraseSource::Env => debug!("passphrase taken from {PASSPHRASE_ENV}"),
        PassphraseSource::File => debug!("passphrase taken from config file"),
    }
    ServiceSettings {
        passphrase,
        redaction: config.password_redaction(),
    }
}

#[cfg(test)]
mod tests {
    use picpost_core::store::{Collection, Document};

    use super::*;

    #[tokio::test]
    async fn file_store_from_config_uses_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let store = store_from_config(&config).expect("store");
        assert_eq!(store.ceiling(), config.store_timeout());

        store.ping().await.expect("ping");
        let id = store
            .insert(Collection::Posts, Document::new())
            .await
            .expect("insert");
        assert!(store.find_by_id(Collection::Posts, &id).await.is_ok());
        assert!(dir.path().join("posts").is_dir());
    }

    #[test]
    fn settings_carry_redaction_policy() {
        let config = Config {
            passphrase: Some("from-file".into()),
            password_redaction: Some(picpost_core::records::PasswordRedaction::Mask),
            ..Config::default()
        };
        let settings = settings_from_config(&config);
        assert_eq!(
            settings.redaction,
            picpost_core::records::PasswordRedaction::Mask
        );
    }
}
