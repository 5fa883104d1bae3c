//! Bounded in-process tier.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Most-recently-used map: reads and writes move an entry to the back,
/// inserting past capacity drops from the front.
#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    entries: Mutex<IndexMap<String, Arc<[u8]>>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity.min(1024))),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        let mut entries = self.entries.lock();
        let value = entries.shift_remove(key)?;
        entries.insert(key.to_string(), Arc::clone(&value));
        Some(value)
    }

    pub fn set(&self, key: &str, value: Arc<[u8]>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        entries.shift_remove(key);
        entries.insert(key.to_string(), value);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
