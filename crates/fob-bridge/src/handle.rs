//! Handle registry.
//!
//! Foreign code refers to bridge-side objects through opaque 64-bit handles.
//! Each kind of object lives in its own [`HandleTable`]. The table's
//! [`Namespace`] is stamped into the top byte of every handle it issues, and
//! the low 56 bits carry a per-table sequence number starting at 1. Handles
//! are therefore never zero, never reused, and a handle presented to the
//! wrong table is told apart from one that was simply released.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{BridgeError, Result};

const TAG_SHIFT: u32 = 56;
const SEQUENCE_MASK: u64 = (1 << TAG_SHIFT) - 1;

/// Opaque handle as seen by foreign code.
pub type Handle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Namespace {
    Options = 1,
    Context = 2,
    Plugin = 3,
    PluginSession = 4,
}

impl Namespace {
    /// Namespace stamped into `handle`, if any.
    pub fn of(handle: Handle) -> Option<Namespace> {
        match handle >> TAG_SHIFT {
            1 => Some(Namespace::Options),
            2 => Some(Namespace::Context),
            3 => Some(Namespace::Plugin),
            4 => Some(Namespace::PluginSession),
            _ => None,
        }
    }

    fn tag(self, sequence: u64) -> Handle {
        ((self as u64) << TAG_SHIFT) | (sequence & SEQUENCE_MASK)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Namespace::Options => "options",
            Namespace::Context => "context",
            Namespace::Plugin => "plugin",
            Namespace::PluginSession => "plugin session",
        })
    }
}

/// Thread-safe map from handles of one [`Namespace`] to values.
///
/// Values are cloned out on [`load`](Self::load); store `Arc`s for anything
/// that isn't cheap to clone.
pub struct HandleTable<T> {
    namespace: Namespace,
    next: AtomicU64,
    entries: RwLock<FxHashMap<Handle, T>>,
}

impl<T> HandleTable<T> {
    /// Empty table issuing handles in `namespace`.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            next: AtomicU64::new(1),
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Reserve a fresh handle. Nothing is stored under it yet.
    pub fn allocate(&self) -> Handle {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        self.namespace.tag(sequence)
    }

    /// Store `value` under a handle from [`allocate`](Self::allocate).
    pub fn store(&self, handle: Handle, value: T) {
        tracing::trace!(namespace = %self.namespace, handle, "store handle");
        self.entries.write().insert(handle, value);
    }

    /// Allocate a handle and store `value` under it.
    pub fn insert(&self, value: T) -> Handle {
        let handle = self.allocate();
        self.store(handle, value);
        handle
    }

    /// Remove the value under `handle`. Unknown handles are ignored.
    pub fn delete(&self, handle: Handle) -> Option<T> {
        tracing::trace!(namespace = %self.namespace, handle, "delete handle");
        self.entries.write().remove(&handle)
    }

    /// Fail unless `handle` was issued by a table of this namespace.
    pub fn check_namespace(&self, handle: Handle) -> Result<()> {
        match Namespace::of(handle) {
            Some(found) if found == self.namespace => Ok(()),
            Some(found) if handle & SEQUENCE_MASK != 0 => Err(BridgeError::WrongNamespace {
                expected: self.namespace,
                found,
                handle,
            }),
            _ => Err(self.invalid(handle)),
        }
    }

    /// Run `f` against the value under `handle` while holding the write lock.
    pub fn update<R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.check_namespace(handle)?;
        let mut entries = self.entries.write();
        match entries.get_mut(&handle) {
            Some(value) => Ok(f(value)),
            None => Err(self.invalid(handle)),
        }
    }

    /// Whether `handle` currently has a value.
    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.read().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn invalid(&self, handle: Handle) -> BridgeError {
        BridgeError::InvalidHandle {
            namespace: self.namespace,
            handle,
        }
    }
}

impl<T: Clone> HandleTable<T> {
    /// Clone the value under `handle`.
    pub fn load(&self, handle: Handle) -> Result<T> {
        self.check_namespace(handle)?;
        self.entries
            .read()
            .get(&handle)
            .cloned()
            .ok_or_else(|| self.invalid(handle))
    }
}

impl<T> fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("namespace", &self.namespace)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_handles_are_nonzero_and_increasing() {
        let table: HandleTable<u32> = HandleTable::new(Namespace::Options);
        let a = table.allocate();
        let b = table.allocate();
        assert_ne!(a, 0);
        assert!(b > a);
        assert_eq!(Namespace::of(a), Some(Namespace::Options));
    }

    #[test]
    fn test_store_load_delete() {
        let table = HandleTable::new(Namespace::Context);
        let h = table.insert("ctx".to_string());
        assert_eq!(table.load(h).unwrap(), "ctx");
        assert_eq!(table.delete(h).as_deref(), Some("ctx"));
        assert_eq!(
            table.load(h),
            Err(BridgeError::InvalidHandle {
                namespace: Namespace::Context,
                handle: h
            })
        );
        assert_eq!(table.delete(h), None);
    }

    #[test]
    fn test_deleted_handles_are_not_reissued() {
        let table = HandleTable::new(Namespace::Plugin);
        let first = table.insert(1);
        table.delete(first);
        let second = table.insert(2);
        assert_ne!(first, second);
        assert!(table.load(first).is_err());
    }

    #[test]
    fn test_wrong_namespace_is_detected() {
        let options: HandleTable<u8> = HandleTable::new(Namespace::Options);
        let contexts: HandleTable<u8> = HandleTable::new(Namespace::Context);
        let h = options.insert(7);
        assert_eq!(
            contexts.load(h),
            Err(BridgeError::WrongNamespace {
                expected: Namespace::Context,
                found: Namespace::Options,
                handle: h,
            })
        );
    }

    #[test]
    fn test_zero_and_untagged_handles_are_invalid() {
        let table: HandleTable<u8> = HandleTable::new(Namespace::Options);
        assert!(matches!(table.load(0), Err(BridgeError::InvalidHandle { .. })));
        assert!(matches!(table.load(42), Err(BridgeError::InvalidHandle { .. })));
        assert!(matches!(
            table.load(Namespace::Plugin.tag(0)),
            Err(BridgeError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn test_update_mutates_in_place() {
        let table = HandleTable::new(Namespace::Options);
        let h = table.insert(vec![1]);
        table.update(h, |v| v.push(2)).unwrap();
        assert_eq!(table.load(h).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let table = Arc::new(HandleTable::<()>::new(Namespace::PluginSession));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || (0..500).map(|_| table.insert(())).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for handle in worker.join().unwrap() {
                assert!(seen.insert(handle), "duplicate handle {handle:#x}");
            }
        }
        assert_eq!(table.len(), 8 * 500);
    }
}
