//! String interning
//!
//! Tag names and values repeat across many events, so the store keeps each
//! distinct string once and refers to it by a small integer id. The interner
//! is a service owned by (and injected into) a store, never global state.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::storage::error::{StorageError, StorageResult};

/// Interned string identifier
pub type SymbolId = u32;

/// String interning service
pub trait Interner: Send + Sync {
    /// Return the id for `s`, assigning a new one if needed
    fn intern(&self, s: &str) -> StorageResult<SymbolId>;

    /// Look up the string for an id
    fn resolve(&self, id: SymbolId) -> StorageResult<String>;

    /// Number of distinct strings held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory interner backed by a vector and a reverse lookup map
#[derive(Debug, Default)]
pub struct StringTable {
    inner: Mutex<TableInner>,
}

#[derive(Debug, Default)]
struct TableInner {
    /// Strings indexed by id
    strings: Vec<String>,
    /// String to id lookup
    ids: HashMap<String, SymbolId>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, TableInner>> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire string table lock: {}", e)))
    }
}

impl Interner for StringTable {
    fn intern(&self, s: &str) -> StorageResult<SymbolId> {
        let mut table = self.lock()?;
        if let Some(&id) = table.ids.get(s) {
            return Ok(id);
        }

        let id = table.strings.len() as SymbolId;
        table.strings.push(s.to_string());
        table.ids.insert(s.to_string(), id);
        Ok(id)
    }

    fn resolve(&self, id: SymbolId) -> StorageResult<String> {
        self.lock()?
            .strings
            .get(id as usize)
            .cloned()
            .ok_or(StorageError::UnknownSymbol(id))
    }

    fn len(&self) -> usize {
        self.lock().map(|t| t.strings.len()).unwrap_or(0)
    }
}
