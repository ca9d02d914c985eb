use std::collections::BTreeMap;

use crate::foundation::error::{ToodleError, ToodleResult};
use crate::runtime::{RawHandle, ResourceKind};

#[derive(Debug)]
struct Entry<V> {
    refs: u32,
    value: V,
}

/// Runtime-side storage for counted resources of one kind.
///
/// `insert` creates an entry with a count of one. The entry is destroyed when `release`
/// brings the count to zero; after that the handle is dead and any further use is misuse.
#[derive(Debug)]
pub struct HandleTable<V> {
    kind: ResourceKind,
    entries: BTreeMap<u64, Entry<V>>,
    next_id: u64,
}

impl<V> HandleTable<V> {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn insert(&mut self, value: V) -> RawHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, Entry { refs: 1, value });
        RawHandle(id)
    }

    pub fn get(&self, handle: RawHandle) -> ToodleResult<&V> {
        self.entries
            .get(&handle.0)
            .map(|e| &e.value)
            .ok_or_else(|| self.dead(handle, "use"))
    }

    pub fn get_mut(&mut self, handle: RawHandle) -> ToodleResult<&mut V> {
        let kind = self.kind;
        self.entries
            .get_mut(&handle.0)
            .map(|e| &mut e.value)
            .ok_or_else(|| dead(kind, handle, "use"))
    }

    pub fn retain(&mut self, handle: RawHandle) -> ToodleResult<()> {
        let kind = self.kind;
        let entry = self
            .entries
            .get_mut(&handle.0)
            .ok_or_else(|| dead(kind, handle, "retain"))?;
        entry.refs += 1;
        Ok(())
    }

    /// Drop one reference. Returns the value when this was the last one.
    pub fn release(&mut self, handle: RawHandle) -> ToodleResult<Option<V>> {
        let Some(entry) = self.entries.get_mut(&handle.0) else {
            return Err(self.dead(handle, "release"));
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(None);
        }
        Ok(self.entries.remove(&handle.0).map(|e| e.value))
    }

    /// Current count, `0` for dead or never-issued handles.
    pub fn ref_count(&self, handle: RawHandle) -> u32 {
        self.entries.get(&handle.0).map_or(0, |e| e.refs)
    }

    pub fn live(&self) -> usize {
        self.entries.len()
    }

    /// Number of handles ever issued.
    pub fn issued(&self) -> u64 {
        self.next_id - 1
    }

    fn dead(&self, handle: RawHandle, op: &str) -> ToodleError {
        dead(self.kind, handle, op)
    }
}

fn dead(kind: ResourceKind, handle: RawHandle, op: &str) -> ToodleError {
    ToodleError::resource_misuse(format!("{op} of dead {} handle {handle}", kind.as_str()))
}

/// Report misuse detected on a path that has no error return (retain/release). Loud in debug
/// builds, logged otherwise.
pub fn report_misuse(err: &ToodleError) {
    tracing::error!(error = %err, "runtime handle misuse");
    debug_assert!(false, "{err}");
}
