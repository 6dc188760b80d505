use nptr_store::{BlobStore, ObjectNamer};

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Shared, read-only state handed to every handler.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: BlobStore,
    pub namer: ObjectNamer,
    usage_hint: String,
}

impl AppState {
    /// Validate the config and open the store it points at.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let store = BlobStore::open(&config.storage_root)?;
        let namer = ObjectNamer::new(config.naming);
        let usage_hint = config.usage_hint();
        Ok(Self {
            config,
            store,
            namer,
            usage_hint,
        })
    }

    pub fn usage_hint(&self) -> &str {
        &self.usage_hint
    }

    /// Cap applied to the whole request body. Leaves room for multipart
    /// framing around a file of exactly `max_upload_size` bytes.
    pub fn body_limit(&self) -> u64 {
        self.config.max_upload_size.saturating_add(FORM_OVERHEAD)
    }
}

/// Allowance for multipart boundaries and part headers.
pub const FORM_OVERHEAD: u64 = 64 * 1024;

#[cfg(test)]
mod tests {
    use super::*;
    use nptr_store::NamingScheme;

    #[test]
    fn new_opens_store_and_namer() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            storage_root: dir.path().to_path_buf(),
            naming: NamingScheme::Blake3,
            max_upload_size: 10,
            ..ServerConfig::default()
        };
        let state = AppState::new(config).unwrap();
        assert_eq!(state.store.root(), dir.path());
        assert_eq!(state.namer.scheme(), NamingScheme::Blake3);
        assert_eq!(state.body_limit(), 10 + FORM_OVERHEAD);
        assert!(state.usage_hint().starts_with("curl -F'f=@f' "));
    }

    #[test]
    fn new_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            storage_root: dir.path().join("nope"),
            ..ServerConfig::default()
        };
        assert!(AppState::new(config).is_err());
    }
}
