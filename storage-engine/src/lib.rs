use dogpile::ports::KvStore;
use shared::Result;
use shared::config::{Config, StoreBackend};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub mod moka_store;
pub mod sled_store;

pub use moka_store::MokaKvStore;
pub use sled_store::SledKvStore;

const SLED_FILE: &str = "dogpile.sled";

/// Open the store selected by `config.store`
pub fn open_store(config: &Config) -> Result<Arc<dyn KvStore>> {
    match config.store {
        StoreBackend::Memory => {
            info!(
                "Using in-memory store (max entries: {})",
                config
                    .max_entries
                    .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
            );
            Ok(Arc::new(MokaKvStore::new("dogpile", config.max_entries)))
        }
        StoreBackend::Sled => {
            let path = Path::new(&config.data_dir).join(SLED_FILE);
            info!("Using sled store at {}", path.display());
            Ok(Arc::new(SledKvStore::new(path)?))
        }
    }
}
