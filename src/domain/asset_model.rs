use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One named image: a primary object plus at most one detection result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res_count: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl AssetRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        AssetRecord {
            name: name.into(),
            url: url.into(),
            res_url: None,
            res_count: None,
            created_at: Utc::now(),
        }
    }
}

/// Collection key: names that fold equal are the same asset.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// An owner's assets, keyed by folded name, in insertion order.
///
/// Serialized as a plain JSON object so the whole collection round-trips
/// through the single `assets` column on the owner row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetCollection {
    records: IndexMap<String, AssetRecord>,
}

impl AssetCollection {
    /// Exact-name lookup.
    pub fn find(&self, name: &str) -> Option<&AssetRecord> {
        self.records.get(&fold_name(name)).filter(|r| r.name == name)
    }

    /// Case-insensitive lookup on the trimmed name.
    pub fn find_ci(&self, name: &str) -> Option<&AssetRecord> {
        self.records.get(&fold_name(name))
    }

    /// Appends a record. Returns false when a case-insensitive duplicate
    /// already exists.
    pub fn insert(&mut self, record: AssetRecord) -> bool {
        let key = fold_name(&record.name);
        if self.records.contains_key(&key) {
            return false;
        }
        self.records.insert(key, record);
        true
    }

    /// Applies `mutate` to the record stored under `name`.
    pub fn update<F: FnOnce(&mut AssetRecord)>(&mut self, name: &str, mutate: F) -> bool {
        match self.records.get_mut(&fold_name(name)) {
            Some(record) => {
                mutate(record);
                true
            }
            None => false,
        }
    }

    /// Re-keys the record under `old_name` to `new_name`, keeping both its
    /// listing position and its other fields.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> bool {
        let old_key = fold_name(old_name);
        let Some(index) = self.records.get_index_of(&old_key) else {
            return false;
        };
        let Some(mut record) = self.records.shift_remove(&old_key) else {
            return false;
        };
        record.name = new_name.trim().to_string();
        self.records.shift_insert(index, fold_name(new_name), record);
        true
    }

    /// Removes the record stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<AssetRecord> {
        self.records.shift_remove(&fold_name(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
