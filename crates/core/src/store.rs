use crate::{BookId, BookRecord};

/// Persistent record store keyed by [`BookId`]. Each call is atomic for the
/// single record it touches.
pub trait BookStore {
    fn put(&self, record: &BookRecord) -> anyhow::Result<()>;
    fn get(&self, id: &BookId) -> anyhow::Result<Option<BookRecord>>;
    fn list(&self) -> anyhow::Result<Vec<BookRecord>>;
    /// Ids only, without loading content.
    fn ids(&self) -> anyhow::Result<Vec<BookId>>;
    fn delete(&self, id: &BookId) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Scalar string store for preferences and small per-book pointers.
pub trait PreferenceStore {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove_item(&self, key: &str) -> anyhow::Result<()>;
    fn clear_items(&self) -> anyhow::Result<()>;
}
