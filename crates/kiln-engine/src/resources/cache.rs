use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};

/// In-flight load that any number of requesters can await.
///
/// The wrapped future runs once; every clone observes the same result.
pub type PendingOp<E> = Shared<LocalBoxFuture<'static, Result<(), E>>>;

/// Where a name is in its load lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Pending,
    Ready,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryState::Absent => "not loaded",
            EntryState::Pending => "still loading",
            EntryState::Ready => "loaded",
        })
    }
}

enum Slot<T, E> {
    Pending(Option<PendingOp<E>>),
    Ready(Rc<T>),
}

struct Entry<T, E> {
    slot: Slot<T, E>,
    ref_count: u32,
}

/// Name → resource map with reference counts and in-flight load tracking.
///
/// Invariants:
/// - a name is absent, pending or ready, never two at once
/// - the reference count starts at 1 when a name turns pending (or is set
///   directly) and only [`unload`](Self::unload) decrements it
/// - a ready entry is removed exactly when its count drops from 1 to 0
///
/// All methods take `&self`; completion futures update the cache while other
/// holders keep using it. No borrow is held across a call out of the cache.
pub struct ResourceCache<T, E> {
    entries: RefCell<HashMap<String, Entry<T, E>>>,
}

impl<T, E> Default for ResourceCache<T, E> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<T, E> ResourceCache<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `name` is pending or ready.
    pub fn has(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn state(&self, name: &str) -> EntryState {
        match self.entries.borrow().get(name) {
            None => EntryState::Absent,
            Some(Entry { slot: Slot::Pending(_), .. }) => EntryState::Pending,
            Some(Entry { slot: Slot::Ready(_), .. }) => EntryState::Ready,
        }
    }

    /// The ready resource, or `None` while absent or pending.
    pub fn get(&self, name: &str) -> Option<Rc<T>> {
        match &self.entries.borrow().get(name)?.slot {
            Slot::Ready(value) => Some(Rc::clone(value)),
            Slot::Pending(_) => None,
        }
    }

    /// Stores `value` under `name`, turning a pending entry ready.
    ///
    /// A pending entry keeps the count accumulated while it loaded; an absent
    /// name starts at 1.
    pub fn set(&self, name: &str, value: T) -> Rc<T> {
        let value = Rc::new(value);
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(name) {
            Some(entry) => {
                if matches!(entry.slot, Slot::Ready(_)) {
                    log::warn!("cache: replacing ready resource `{name}`");
                }
                entry.slot = Slot::Ready(Rc::clone(&value));
            }
            None => {
                entries.insert(
                    name.to_owned(),
                    Entry {
                        slot: Slot::Ready(Rc::clone(&value)),
                        ref_count: 1,
                    },
                );
            }
        }
        value
    }

    /// Adds a holder to an existing entry. Returns `false` if `name` is absent.
    pub fn inc_ref(&self, name: &str) -> bool {
        match self.entries.borrow_mut().get_mut(name) {
            Some(entry) => {
                entry.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Marks an absent name as loading. Returns `false` if it was already present.
    pub fn mark_pending(&self, name: &str) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(
            name.to_owned(),
            Entry {
                slot: Slot::Pending(None),
                ref_count: 1,
            },
        );
        true
    }

    /// Attaches the in-flight operation to a pending name so later requesters can await it.
    pub fn register_pending(&self, name: &str, op: PendingOp<E>) -> bool {
        match self.entries.borrow_mut().get_mut(name) {
            Some(Entry { slot: slot @ Slot::Pending(None), .. }) => {
                *slot = Slot::Pending(Some(op));
                true
            }
            _ => {
                log::error!("cache: cannot register a load for `{name}`: not freshly pending");
                false
            }
        }
    }

    /// The in-flight operation for a pending name.
    pub fn pending(&self, name: &str) -> Option<PendingOp<E>> {
        match &self.entries.borrow().get(name)?.slot {
            Slot::Pending(op) => op.clone(),
            Slot::Ready(_) => None,
        }
    }

    /// Every registered in-flight operation.
    pub fn pending_operations(&self) -> Vec<PendingOp<E>> {
        self.entries
            .borrow()
            .values()
            .filter_map(|entry| match &entry.slot {
                Slot::Pending(op) => op.clone(),
                Slot::Ready(_) => None,
            })
            .collect()
    }

    /// Returns a pending name to absent after its load failed.
    pub fn forget_pending(&self, name: &str) -> bool {
        let mut entries = self.entries.borrow_mut();
        if matches!(entries.get(name), Some(Entry { slot: Slot::Pending(_), .. })) {
            entries.remove(name);
            true
        } else {
            false
        }
    }

    /// Drops one holder of a ready entry.
    ///
    /// Returns the removed resource when this was the last holder, so the
    /// caller can release whatever it owns. Absent or pending names are left
    /// untouched and yield `None`.
    pub fn unload(&self, name: &str) -> Option<Rc<T>> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(name)?;
        if !matches!(entry.slot, Slot::Ready(_)) {
            log::error!("cache: unload of `{name}` while it is still loading");
            return None;
        }

        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count > 0 {
            return None;
        }

        match entries.remove(name) {
            Some(Entry { slot: Slot::Ready(value), .. }) => Some(value),
            _ => None,
        }
    }

    /// Empties the cache, returning every ready resource regardless of its count.
    ///
    /// Pending entries are dropped; their operations can no longer store a result.
    pub fn drain(&self) -> Vec<(String, Rc<T>)> {
        self.entries
            .borrow_mut()
            .drain()
            .filter_map(|(name, entry)| match entry.slot {
                Slot::Ready(value) => Some((name, value)),
                Slot::Pending(_) => None,
            })
            .collect()
    }

    pub fn ref_count(&self, name: &str) -> Option<u32> {
        self.entries.borrow().get(name).map(|entry| entry.ref_count)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
