//! Asset lifecycle synchronizer.
//!
//! Object-store calls and the owner-document write are not transactional
//! together, so every operation sequences its side effects to keep the two
//! stores from diverging observably. A crash or failure between steps may
//! leave an orphan object, which an out-of-band reconciliation sweep can
//! find by diffing store keys against record URLs; it must never leave a
//! record pointing at bytes that were not written.
//!
//! Each operation runs through a transient phase (uploading, renaming,
//! replacing, deleting) that either resolves to a stable record before the
//! handler returns or reverts to the previous stable one. Only stable
//! records are durable.

use std::sync::Arc;

use crate::domain::asset_model::{AssetRecord, fold_name};
use crate::domain::owner_model::Owner;
use crate::error::AppError;
use crate::storage::ObjectStore;
use crate::storage::asset_store::AssetStore;
use crate::storage::keys;
use crate::utils::validation::is_valid_image_name;

/// A decoded upload: raw bytes plus the client's original file name.
/// Multipart parsing happens at the transport layer; this module never
/// sees wire encoding.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub bytes: Vec<u8>,
    pub filename: String,
}

#[derive(Clone)]
pub struct AssetLifecycle {
    objects: Arc<dyn ObjectStore>,
    records: AssetStore,
}

impl AssetLifecycle {
    pub fn new(objects: Arc<dyn ObjectStore>, records: AssetStore) -> Self {
        Self { objects, records }
    }

    /// Uploads a new named asset. The object is stored before the record
    /// is inserted, so a store failure is a clean no-op and a record never
    /// references bytes that were not written.
    pub async fn upload(
        &self,
        owner: &Owner,
        name: &str,
        payload: &FilePayload,
    ) -> Result<AssetRecord, AppError> {
        let name = normalized(name)?;
        require_payload(payload)?;

        let mut assets = self.records.load(&owner.id).await?;
        if assets.find_ci(&name).is_some() {
            return Err(AppError::DuplicateName(name));
        }

        let key = keys::primary_key(&owner.username, &name, keys::extension_of(&payload.filename));
        let url = self.objects.put(&key, &payload.bytes).await?;

        let record = AssetRecord::new(name.clone(), url);
        assets.insert(record.clone());
        if let Err(err) = self.records.save(&owner.id, &assets).await {
            tracing::warn!(
                owner = %owner.username,
                asset = %name,
                key = %key,
                "record write failed after upload; object is orphaned pending reconciliation"
            );
            return Err(err);
        }
        Ok(record)
    }

    /// Renames an asset. Object moves are copy-before-delete so the bytes
    /// stay reachable from at least one key at every step; the record is
    /// only written after all moves succeed.
    pub async fn rename(
        &self,
        owner: &Owner,
        old_name: &str,
        new_name: &str,
    ) -> Result<AssetRecord, AppError> {
        let new_name = normalized(new_name)?;

        let mut assets = self.records.load(&owner.id).await?;
        let record = assets
            .find(old_name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("image {old_name}")))?;
        if new_name == record.name {
            return Ok(record);
        }
        // The record itself may change case; any other record folding
        // equal to the new name is a duplicate.
        if fold_name(&new_name) != fold_name(old_name) && assets.find_ci(&new_name).is_some() {
            return Err(AppError::DuplicateName(new_name));
        }

        let old_key = keys::key_from_url(&record.url).to_string();
        let new_key =
            keys::primary_key(&owner.username, &new_name, keys::extension_of_url(&record.url));
        self.objects.copy(&old_key, &new_key).await?;
        if let Err(err) = self.objects.delete(&old_key).await {
            tracing::warn!(
                owner = %owner.username,
                asset = %record.name,
                key = %new_key,
                "old primary key delete failed after copy; copied object is orphaned"
            );
            return Err(err.into());
        }

        let mut new_res_key = None;
        if let Some(res_url) = &record.res_url {
            let old_res_key = keys::key_from_url(res_url).to_string();
            let moved_key =
                keys::result_key(&owner.username, &new_name, keys::extension_of_url(res_url));
            let moved = match self.objects.copy(&old_res_key, &moved_key).await {
                Ok(()) => self.objects.delete(&old_res_key).await,
                Err(err) => Err(err),
            };
            if let Err(err) = moved {
                tracing::error!(
                    owner = %owner.username,
                    asset = %record.name,
                    old_key = %old_res_key,
                    new_key = %moved_key,
                    "result object move failed after the primary was renamed; keys need reconciliation"
                );
                return Err(err.into());
            }
            new_res_key = Some(moved_key);
        }

        let mut updated = record.clone();
        updated.name = new_name.clone();
        updated.url = self.objects.url_for(&new_key);
        if let Some(key) = &new_res_key {
            updated.res_url = Some(self.objects.url_for(key));
        }

        assets.rename(old_name, &new_name);
        assets.update(&new_name, |r| *r = updated.clone());
        if let Err(err) = self.records.save(&owner.id, &assets).await {
            tracing::error!(
                owner = %owner.username,
                asset = %record.name,
                old_key = %old_key,
                new_key = %new_key,
                "inconsistent state: objects renamed but record write failed"
            );
            return Err(AppError::Inconsistent(format!(
                "image {old_name} was moved in the object store but its record could not be updated: {err}"
            )));
        }
        Ok(updated)
    }

    /// Replaces an asset's primary file. A new primary invalidates any
    /// prior detection result, so both old objects are deleted up front
    /// and the result fields are cleared in the same record write.
    pub async fn replace(
        &self,
        owner: &Owner,
        name: &str,
        payload: &FilePayload,
    ) -> Result<AssetRecord, AppError> {
        require_payload(payload)?;

        let mut assets = self.records.load(&owner.id).await?;
        let record = assets
            .find(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("image {name}")))?;

        let old_key = keys::key_from_url(&record.url).to_string();
        if let Err(err) = self.objects.delete(&old_key).await {
            tracing::warn!(
                owner = %owner.username,
                asset = %name,
                key = %old_key,
                error = %err,
                "old primary object could not be deleted"
            );
        }
        if let Some(res_url) = &record.res_url {
            let res_key = keys::key_from_url(res_url).to_string();
            if let Err(err) = self.objects.delete(&res_key).await {
                tracing::warn!(
                    owner = %owner.username,
                    asset = %name,
                    key = %res_key,
                    error = %err,
                    "old result object could not be deleted"
                );
            }
        }

        let new_key =
            keys::primary_key(&owner.username, &record.name, keys::extension_of(&payload.filename));
        let url = match self.objects.put(&new_key, &payload.bytes).await {
            Ok(url) => url,
            Err(err) => {
                tracing::error!(
                    owner = %owner.username,
                    asset = %name,
                    old_key = %old_key,
                    new_key = %new_key,
                    "inconsistent state: old primary deleted but replacement store failed"
                );
                return Err(AppError::Inconsistent(format!(
                    "the previous file for image {name} was removed but the replacement could not \
                     be stored ({err}); please upload the file again"
                )));
            }
        };

        let mut updated = record.clone();
        updated.url = url;
        updated.res_url = None;
        updated.res_count = None;
        assets.update(&record.name, |r| *r = updated.clone());
        if let Err(err) = self.records.save(&owner.id, &assets).await {
            tracing::error!(
                owner = %owner.username,
                asset = %name,
                new_key = %new_key,
                "inconsistent state: replacement stored but record write failed"
            );
            return Err(AppError::Inconsistent(format!(
                "the new file for image {name} was stored but its record could not be updated: {err}"
            )));
        }
        Ok(updated)
    }

    /// Deletes an asset and both its objects. Object deletes run first and
    /// are idempotent; the record is removed last, so a mid-way failure
    /// leaves a record that can simply be deleted again.
    pub async fn delete(&self, owner: &Owner, name: &str) -> Result<(), AppError> {
        let mut assets = self.records.load(&owner.id).await?;
        let record = assets
            .find(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("image {name}")))?;

        self.objects.delete(keys::key_from_url(&record.url)).await?;
        if let Some(res_url) = &record.res_url {
            self.objects.delete(keys::key_from_url(res_url)).await?;
        }

        assets.remove(&record.name);
        if let Err(err) = self.records.save(&owner.id, &assets).await {
            tracing::error!(
                owner = %owner.username,
                asset = %name,
                "objects deleted but record removal failed; re-running the delete is safe"
            );
            return Err(AppError::Inconsistent(format!(
                "objects for image {name} were deleted but the record could not be removed: {err}"
            )));
        }
        Ok(())
    }

    /// Attaches a detection result to an existing asset, overwriting any
    /// prior result pointer and count. Result slots are one-per-asset, so
    /// re-attaching needs no duplicate check. A missing or unparseable
    /// count is stored as 0.
    pub async fn attach_result(
        &self,
        owner: &Owner,
        name: &str,
        payload: &FilePayload,
        count: Option<&str>,
    ) -> Result<AssetRecord, AppError> {
        require_payload(payload)?;
        let count = count.and_then(|raw| raw.trim().parse::<u32>().ok()).unwrap_or(0);

        let mut assets = self.records.load(&owner.id).await?;
        let record = assets
            .find(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("image {name}")))?;

        let res_key =
            keys::result_key(&owner.username, &record.name, keys::extension_of(&payload.filename));
        let res_url = self.objects.put(&res_key, &payload.bytes).await?;

        let mut updated = record;
        updated.res_url = Some(res_url);
        updated.res_count = Some(count);
        assets.update(name, |r| *r = updated.clone());
        if let Err(err) = self.records.save(&owner.id, &assets).await {
            tracing::warn!(
                owner = %owner.username,
                asset = %name,
                key = %res_key,
                "record write failed after result upload; object is orphaned pending reconciliation"
            );
            return Err(err);
        }
        Ok(updated)
    }

    /// Assets in insertion order.
    pub async fn list(&self, owner: &Owner) -> Result<Vec<AssetRecord>, AppError> {
        Ok(self.records.load(&owner.id).await?.iter().cloned().collect())
    }
}

fn normalized(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Image name is required".to_string()));
    }
    if !is_valid_image_name(name) {
        return Err(AppError::Validation(format!("invalid image name: {name}")));
    }
    Ok(name.to_string())
}

fn require_payload(payload: &FilePayload) -> Result<(), AppError> {
    if payload.bytes.is_empty() {
        return Err(AppError::Validation("Upload failed or invalid file".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::storage::StoreError;
    use crate::storage::driver::memory::MemoryStore;
    use crate::storage::owner_storage::OwnerStorage;

    async fn test_pool() -> Arc<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        Arc::new(pool)
    }

    async fn setup(username: &str) -> (AssetLifecycle, Arc<MemoryStore>, Owner) {
        let pool = test_pool().await;
        let owner = Owner::new(username, format!("{username}@example.com"), "hash");
        OwnerStorage::new(pool.clone()).insert_owner(&owner).await.unwrap();
        let store = Arc::new(MemoryStore::new());
        let lifecycle = AssetLifecycle::new(store.clone(), AssetStore::new(pool));
        (lifecycle, store, owner)
    }

    fn jpeg(filename: &str) -> FilePayload {
        FilePayload {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            filename: filename.to_string(),
        }
    }

    #[tokio::test]
    async fn upload_stores_object_and_record() {
        let (lifecycle, store, owner) = setup("alice").await;
        let record = lifecycle.upload(&owner, "plate1", &jpeg("car.jpg")).await.unwrap();
        assert_eq!(record.name, "plate1");
        assert!(store.contains("alice_plate1.jpg").await);

        let listed = lifecycle.list(&owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].url, record.url);
    }

    #[tokio::test]
    async fn upload_rejects_case_insensitive_duplicates() {
        let (lifecycle, store, owner) = setup("alice").await;
        lifecycle.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();
        let err = lifecycle.upload(&owner, "Plate1", &jpeg("b.jpg")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName(_)));
        assert_eq!(store.keys().await, vec!["alice_plate1.jpg".to_string()]);
    }

    #[tokio::test]
    async fn upload_rejects_blank_name_before_any_store_call() {
        let (lifecycle, store, owner) = setup("alice").await;
        let err = lifecycle.upload(&owner, "   ", &jpeg("a.jpg")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn upload_then_delete_leaves_no_objects() {
        let (lifecycle, store, owner) = setup("alice").await;
        lifecycle.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();
        lifecycle.delete(&owner, "plate1").await.unwrap();
        assert!(store.keys().await.is_empty());
        assert!(lifecycle.list(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_moves_the_primary_key() {
        let (lifecycle, store, owner) = setup("user").await;
        lifecycle.upload(&owner, "plate1", &jpeg("plate1.jpg")).await.unwrap();
        let record = lifecycle.rename(&owner, "plate1", "plate1_v2").await.unwrap();
        assert!(!store.contains("user_plate1.jpg").await);
        assert!(store.contains("user_plate1_v2.jpg").await);
        assert!(record.url.ends_with("user_plate1_v2.jpg"));
    }

    #[tokio::test]
    async fn rename_moves_the_result_objects_too() {
        let (lifecycle, store, owner) = setup("user").await;
        lifecycle.upload(&owner, "plate1", &jpeg("p.jpg")).await.unwrap();
        lifecycle
            .attach_result(&owner, "plate1", &jpeg("r.png"), Some("4"))
            .await
            .unwrap();

        let record = lifecycle.rename(&owner, "plate1", "plate2").await.unwrap();
        assert!(store.contains("user_plate2.jpg").await);
        assert!(store.contains("user_plate2_result.png").await);
        assert!(!store.contains("user_plate1_result.png").await);
        assert_eq!(record.res_count, Some(4));
        assert!(record.res_url.unwrap().ends_with("user_plate2_result.png"));
    }

    #[tokio::test]
    async fn rename_to_existing_name_fails_and_touches_nothing() {
        let (lifecycle, store, owner) = setup("user").await;
        lifecycle.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();
        lifecycle.upload(&owner, "plate2", &jpeg("b.jpg")).await.unwrap();

        let err = lifecycle.rename(&owner, "plate2", "Plate1").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateName(_)));
        assert_eq!(
            store.keys().await,
            vec!["user_plate1.jpg".to_string(), "user_plate2.jpg".to_string()]
        );
        let names: Vec<String> =
            lifecycle.list(&owner).await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["plate1", "plate2"]);
    }

    #[tokio::test]
    async fn rename_may_change_the_case_of_its_own_name() {
        let (lifecycle, store, owner) = setup("user").await;
        lifecycle.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();
        let record = lifecycle.rename(&owner, "plate1", "Plate1").await.unwrap();
        assert_eq!(record.name, "Plate1");
        assert!(store.contains("user_Plate1.jpg").await);
        assert!(!store.contains("user_plate1.jpg").await);
    }

    #[tokio::test]
    async fn rename_keeps_listing_position() {
        let (lifecycle, _store, owner) = setup("user").await;
        lifecycle.upload(&owner, "a", &jpeg("a.jpg")).await.unwrap();
        lifecycle.upload(&owner, "b", &jpeg("b.jpg")).await.unwrap();
        lifecycle.upload(&owner, "c", &jpeg("c.jpg")).await.unwrap();
        lifecycle.rename(&owner, "b", "b2").await.unwrap();
        let names: Vec<String> =
            lifecycle.list(&owner).await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "b2", "c"]);
    }

    #[tokio::test]
    async fn rename_of_unknown_asset_is_not_found() {
        let (lifecycle, _store, owner) = setup("user").await;
        let err = lifecycle.rename(&owner, "ghost", "plate1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn replace_clears_the_detection_result() {
        let (lifecycle, store, owner) = setup("user").await;
        lifecycle.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();
        lifecycle
            .attach_result(&owner, "plate1", &jpeg("r.png"), Some("2"))
            .await
            .unwrap();

        let record = lifecycle.replace(&owner, "plate1", &jpeg("b.png")).await.unwrap();
        assert_eq!(record.res_url, None);
        assert_eq!(record.res_count, None);
        assert!(!store.contains("user_plate1_result.png").await);
        assert!(!store.contains("user_plate1.jpg").await);
        assert!(store.contains("user_plate1.png").await);
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found_the_second_time() {
        let (lifecycle, _store, owner) = setup("user").await;
        lifecycle.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();
        lifecycle.delete(&owner, "plate1").await.unwrap();
        let err = lifecycle.delete(&owner, "plate1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn attach_result_defaults_bad_counts_to_zero() {
        let (lifecycle, _store, owner) = setup("user").await;
        lifecycle.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();

        let record = lifecycle
            .attach_result(&owner, "plate1", &jpeg("r.png"), Some("lots"))
            .await
            .unwrap();
        assert_eq!(record.res_count, Some(0));

        let record = lifecycle
            .attach_result(&owner, "plate1", &jpeg("r.png"), Some("-3"))
            .await
            .unwrap();
        assert_eq!(record.res_count, Some(0));

        let record = lifecycle
            .attach_result(&owner, "plate1", &jpeg("r.png"), None)
            .await
            .unwrap();
        assert_eq!(record.res_count, Some(0));
    }

    #[tokio::test]
    async fn attach_result_overwrites_the_previous_result() {
        let (lifecycle, _store, owner) = setup("user").await;
        lifecycle.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();
        lifecycle
            .attach_result(&owner, "plate1", &jpeg("r.png"), Some("2"))
            .await
            .unwrap();
        let record = lifecycle
            .attach_result(&owner, "plate1", &jpeg("r.png"), Some("5"))
            .await
            .unwrap();
        assert_eq!(record.res_count, Some(5));
        let listed = lifecycle.list(&owner).await.unwrap();
        assert_eq!(listed[0].res_count, Some(5));
    }

    #[tokio::test]
    async fn attach_result_to_unknown_asset_leaves_the_store_untouched() {
        let (lifecycle, store, owner) = setup("user").await;
        let err = lifecycle
            .attach_result(&owner, "ghost", &jpeg("r.png"), Some("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.keys().await.is_empty());
    }

    /// Wraps the memory store and fails one class of operation.
    struct FailingStore {
        inner: Arc<MemoryStore>,
        fail_op: &'static str,
    }

    impl FailingStore {
        fn injected(&self, op: &'static str) -> StoreError {
            StoreError::Permanent {
                op,
                message: "injected failure".to_string(),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn put(&self, key: &str, data: &[u8]) -> Result<String, StoreError> {
            if self.fail_op == "put" {
                return Err(self.injected("put"));
            }
            self.inner.put(key, data).await
        }

        async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
            if self.fail_op == "copy" {
                return Err(self.injected("copy"));
            }
            self.inner.copy(src_key, dst_key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_op == "delete" {
                return Err(self.injected("delete"));
            }
            self.inner.delete(key).await
        }

        fn url_for(&self, key: &str) -> String {
            self.inner.url_for(key)
        }
    }

    /// A healthy lifecycle and a failing one over the same stores.
    async fn setup_failing(
        username: &str,
        fail_op: &'static str,
    ) -> (AssetLifecycle, AssetLifecycle, Arc<MemoryStore>, Owner) {
        let pool = test_pool().await;
        let owner = Owner::new(username, format!("{username}@example.com"), "hash");
        OwnerStorage::new(pool.clone()).insert_owner(&owner).await.unwrap();
        let store = Arc::new(MemoryStore::new());
        let records = AssetStore::new(pool);
        let healthy = AssetLifecycle::new(store.clone(), records.clone());
        let failing = AssetLifecycle::new(
            Arc::new(FailingStore {
                inner: store.clone(),
                fail_op,
            }),
            records,
        );
        (healthy, failing, store, owner)
    }

    #[tokio::test]
    async fn upload_store_failure_creates_no_record() {
        let (healthy, failing, store, owner) = setup_failing("user", "put").await;
        let err = failing.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert!(store.keys().await.is_empty());
        assert!(healthy.list(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_copy_failure_leaves_record_and_objects_unchanged() {
        let (healthy, failing, store, owner) = setup_failing("user", "copy").await;
        healthy.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();

        let err = failing.rename(&owner, "plate1", "plate2").await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert!(store.contains("user_plate1.jpg").await);
        assert!(!store.contains("user_plate2.jpg").await);

        let listed = healthy.list(&owner).await.unwrap();
        assert_eq!(listed[0].name, "plate1");
        assert!(listed[0].url.ends_with("user_plate1.jpg"));
    }

    #[tokio::test]
    async fn replace_store_failure_surfaces_inconsistent_state() {
        let (healthy, failing, _store, owner) = setup_failing("user", "put").await;
        healthy.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();
        let err = failing.replace(&owner, "plate1", &jpeg("b.jpg")).await.unwrap_err();
        assert!(matches!(err, AppError::Inconsistent(_)));
    }

    #[tokio::test]
    async fn delete_object_failure_keeps_the_record_for_retry() {
        let (healthy, failing, store, owner) = setup_failing("user", "delete").await;
        healthy.upload(&owner, "plate1", &jpeg("a.jpg")).await.unwrap();

        let err = failing.delete(&owner, "plate1").await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(healthy.list(&owner).await.unwrap().len(), 1);

        // Once the store recovers, re-running the delete finishes the job.
        healthy.delete(&owner, "plate1").await.unwrap();
        assert!(store.keys().await.is_empty());
        assert!(healthy.list(&owner).await.unwrap().is_empty());
    }
}
