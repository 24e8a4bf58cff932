use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::lifecycle::AssetLifecycle;
use crate::storage::ObjectStore;
use crate::storage::asset_store::AssetStore;
use crate::storage::driver::filesystem::FilesystemStore;
use crate::storage::driver::memory::MemoryStore;
use crate::storage::driver::s3::S3Store;
use crate::storage::owner_storage::OwnerStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub owners: OwnerStorage,
    pub lifecycle: AssetLifecycle,
}

impl AppState {
    pub async fn new(config: Config, pool: Arc<Pool<Sqlite>>) -> Self {
        let objects: Arc<dyn ObjectStore> = match config.storage_typ.as_str() {
            "FILESYSTEM" => Arc::new(FilesystemStore::new(&config.root_dir, &config.public_url)),
            "MEMORY" => Arc::new(MemoryStore::new()),
            _ => Arc::new(
                S3Store::new(&config.bucket, &config.region, config.s3_endpoint.clone()).await,
            ),
        };

        AppState {
            config: Arc::new(config),
            owners: OwnerStorage::new(pool.clone()),
            lifecycle: AssetLifecycle::new(objects, AssetStore::new(pool)),
        }
    }
}
