//! Directory-backed snapshot store.

use crate::error::{StoreError, StoreResult};
use confsync_core::{ConfigSource, CoreError, CoreResult, Index, Item};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const INDEX_FILE: &str = "index.json";
const ITEMS_DIR: &str = "items";
const ATTACHMENTS_DIR: &str = "attachments";

/// A snapshot rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    extended_naming: bool,
}

impl LocalStore {
    /// Opens (or prepares to create) a snapshot at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extended_naming: false,
        }
    }

    /// Enables extended naming: item file names carry the item id as a
    /// suffix, disambiguating names that collide once sanitized.
    pub fn with_extended_naming(mut self, extended_naming: bool) -> Self {
        self.extended_naming = extended_naming;
        self
    }

    /// The snapshot root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn category_dir(&self, category: &str) -> PathBuf {
        self.root.join(category)
    }

    fn item_path(&self, category: &str, id: &str, name: &str) -> PathBuf {
        self.category_dir(category)
            .join(ITEMS_DIR)
            .join(self.file_name(id, name))
    }

    fn attachments_path(&self, category: &str, name: &str) -> PathBuf {
        self.category_dir(category)
            .join(ATTACHMENTS_DIR)
            .join(format!("{}.json", sanitize(name)))
    }

    fn file_name(&self, id: &str, name: &str) -> String {
        if self.extended_naming {
            format!("{}_{}.json", sanitize(name), id)
        } else {
            format!("{}.json", sanitize(name))
        }
    }

    /// Saves the index for one category.
    pub fn save_index(&self, category: &str, index: &Index) -> StoreResult<()> {
        let path = self.category_dir(category).join(INDEX_FILE);
        let value =
            serde_json::to_value(index).map_err(|e| StoreError::malformed(&path, e))?;
        write_json(&path, &value)
    }

    /// Saves one item.
    pub fn save_item(&self, item: &Item) -> StoreResult<()> {
        let path = self.item_path(&item.category, &item.id, &item.name);
        debug!(category = %item.category, name = %item.name, "saving item");
        let value = serde_json::to_value(item).map_err(|e| StoreError::malformed(&path, e))?;
        write_json(&path, &value)
    }

    /// Saves the attachment records of one item (device templates).
    pub fn save_attachments(
        &self,
        category: &str,
        name: &str,
        attachments: &[Value],
    ) -> StoreResult<()> {
        let path = self.attachments_path(category, name);
        write_json(&path, &Value::Array(attachments.to_vec()))
    }

    /// Loads the attachment records of one item, if present.
    pub fn load_attachments(&self, category: &str, name: &str) -> StoreResult<Option<Vec<Value>>> {
        let path = self.attachments_path(category, name);
        match read_json(&path)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::malformed(path, e)),
        }
    }

    /// Categories present in the snapshot (directories with an index file).
    pub fn categories(&self) -> StoreResult<Vec<String>> {
        let mut categories = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(categories),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            if entry.path().join(INDEX_FILE).is_file() {
                categories.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        categories.sort();
        Ok(categories)
    }
}

impl ConfigSource for LocalStore {
    fn load_index(&self, category: &str) -> CoreResult<Option<Index>> {
        let path = self.category_dir(category).join(INDEX_FILE);
        let value = read_json(&path).map_err(|e| CoreError::backend(e.to_string()))?;
        match value {
            None => Ok(None),
            Some(value) => {
                let index =
                    serde_json::from_value(value).map_err(|e| CoreError::backend(e.to_string()))?;
                Ok(Some(index))
            }
        }
    }

    fn load_item(&self, category: &str, id: &str, name: &str) -> CoreResult<Option<Item>> {
        let path = self.item_path(category, id, name);
        let value = read_json(&path).map_err(|e| CoreError::backend(e.to_string()))?;
        match value {
            None => Ok(None),
            Some(value) => {
                let item =
                    serde_json::from_value(value).map_err(|e| CoreError::backend(e.to_string()))?;
                Ok(Some(item))
            }
        }
    }
}

/// Replaces characters unsafe in file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn write_json(path: &Path, value: &Value) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let text = serde_json::to_string_pretty(value).map_err(|e| StoreError::malformed(path, e))?;
    fs::write(path, text).map_err(|e| StoreError::io(path, e))
}

fn read_json(path: &Path) -> StoreResult<Option<Value>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| StoreError::malformed(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn item(id: &str, name: &str) -> Item {
        Item::new(
            id,
            name,
            "policy_list_site",
            json!({"listId": id, "name": name, "entries": []}),
        )
    }

    #[test]
    fn index_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let index = Index::from_pairs(vec![("i1", "alpha"), ("i2", "beta")]);
        store.save_index("policy_list_site", &index).unwrap();

        let loaded = store.load_index("policy_list_site").unwrap().unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn missing_index_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.load_index("policy_list_site").unwrap().is_none());
    }

    #[test]
    fn item_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let original = item("i1", "corp-sites");
        store.save_item(&original).unwrap();

        let loaded = store
            .load_item("policy_list_site", "i1", "corp-sites")
            .unwrap()
            .unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn names_are_sanitized() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let original = item("i1", "corp/sites east");
        store.save_item(&original).unwrap();

        let loaded = store
            .load_item("policy_list_site", "i1", "corp/sites east")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name, "corp/sites east");
        assert!(dir
            .path()
            .join("policy_list_site/items/corp_sites_east.json")
            .is_file());
    }

    #[test]
    fn extended_naming_disambiguates() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).with_extended_naming(true);

        // Two names that collapse to the same sanitized form.
        store.save_item(&item("i1", "corp sites")).unwrap();
        store.save_item(&item("i2", "corp/sites")).unwrap();

        let first = store
            .load_item("policy_list_site", "i1", "corp sites")
            .unwrap()
            .unwrap();
        let second = store
            .load_item("policy_list_site", "i2", "corp/sites")
            .unwrap()
            .unwrap();
        assert_eq!(first.id, "i1");
        assert_eq!(second.id, "i2");
    }

    #[test]
    fn attachments_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let records = vec![json!({"uuid": "dev-1"}), json!({"uuid": "dev-2"})];
        store
            .save_attachments("template_device", "branch-router", &records)
            .unwrap();

        let loaded = store
            .load_attachments("template_device", "branch-router")
            .unwrap()
            .unwrap();
        assert_eq!(loaded, records);

        assert!(store
            .load_attachments("template_device", "missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn categories_lists_snapshot_contents() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .save_index("policy_list_site", &Index::from_pairs(vec![("i", "n")]))
            .unwrap();
        store
            .save_index("template_device", &Index::new())
            .unwrap();

        assert_eq!(
            store.categories().unwrap(),
            vec!["policy_list_site".to_string(), "template_device".to_string()]
        );
    }
}
