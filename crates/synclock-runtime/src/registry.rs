#![forbid(unsafe_code)]

//! Identity-keyed subscription registry.
//!
//! Subscriptions are grouped into buckets keyed by the *allocation* of their
//! callback `Rc`: registering the same `Rc` twice lands in the same bucket,
//! while two separately allocated closures never collide (every `Rc`
//! allocation carries its own reference counts, so even zero-sized closures
//! get distinct addresses). A bucket owns a clone of its callback, which keeps
//! the address pinned for as long as the key is in use.
//!
//! # Invariants
//!
//! 1. Buckets iterate in the order their callback was first registered.
//! 2. Entries within a bucket are sorted ascending by cadence; the first entry
//!    is the bucket's fastest. Removal preserves the order without re-sorting.
//! 3. A bucket exists iff it has at least one entry.
//! 4. `owners` maps every live entry id to its bucket key.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use synclock_core::{Cadence, TimeValue};

/// Subscriber callback. Identity is the `Rc` allocation.
pub type UpdateCallback = Rc<dyn Fn(&Rc<TimeValue>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CallbackKey(*const ());

impl CallbackKey {
    pub(crate) fn of(callback: &UpdateCallback) -> Self {
        Self(Rc::as_ptr(callback).cast::<()>())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct EntryId(pub(crate) u64);

/// One registration: a cadence request plus its shared cancelled flag.
#[derive(Debug)]
pub(crate) struct CadenceEntry {
    pub(crate) id: EntryId,
    pub(crate) cadence: Cadence,
    pub(crate) cancelled: Rc<Cell<bool>>,
}

struct CallbackBucket {
    callback: UpdateCallback,
    entries: Vec<CadenceEntry>,
}

/// What a dispatch round must re-check before each invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReceiverSlot {
    /// Deduplicated: live while the callback has any registration.
    Callback(CallbackKey),
    /// Per registration: live while this entry is registered.
    Entry(EntryId),
}

pub(crate) struct Receiver {
    pub(crate) slot: ReceiverSlot,
    pub(crate) callback: UpdateCallback,
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    buckets: IndexMap<CallbackKey, CallbackBucket>,
    owners: HashMap<EntryId, CallbackKey>,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("callbacks", &self.buckets.len())
            .field("entries", &self.owners.len())
            .field("fastest", &self.fastest())
            .finish()
    }
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, callback: &UpdateCallback, entry: CadenceEntry) {
        let key = CallbackKey::of(callback);
        self.owners.insert(entry.id, key);
        let bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| CallbackBucket {
                callback: Rc::clone(callback),
                entries: Vec::new(),
            });
        let pos = bucket
            .entries
            .partition_point(|existing| existing.cadence <= entry.cadence);
        bucket.entries.insert(pos, entry);
    }

    /// Remove one registration. When it was the callback's last, the bucket
    /// goes too and its callback is handed back: dropping a callback can run
    /// arbitrary destructors, so the caller decides when that happens.
    pub(crate) fn remove(&mut self, id: EntryId) -> Option<(CadenceEntry, Option<UpdateCallback>)> {
        let key = self.owners.remove(&id)?;
        let bucket = self.buckets.get_mut(&key)?;
        let pos = bucket.entries.iter().position(|e| e.id == id)?;
        let entry = bucket.entries.remove(pos);
        let released = if bucket.entries.is_empty() {
            self.buckets.shift_remove(&key).map(|bucket| bucket.callback)
        } else {
            None
        };
        Some((entry, released))
    }

    /// Fastest cadence across all entries, read from each bucket's head.
    pub(crate) fn fastest(&self) -> Cadence {
        Cadence::fastest(
            self.buckets
                .values()
                .filter_map(|bucket| bucket.entries.first().map(|e| e.cadence)),
        )
    }

    /// Fastest cadence by visiting every entry. Reference for [`Self::fastest`].
    pub(crate) fn scan_fastest(&self) -> Cadence {
        Cadence::fastest(
            self.buckets
                .values()
                .flat_map(|bucket| bucket.entries.iter().map(|e| e.cadence)),
        )
    }

    /// Number of registrations.
    pub(crate) fn len(&self) -> usize {
        self.owners.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Number of distinct callbacks.
    pub(crate) fn callback_count(&self) -> usize {
        self.buckets.len()
    }

    /// Receivers for one dispatch round, in registration order.
    pub(crate) fn receivers(&self, allow_duplicates: bool) -> Vec<Receiver> {
        if allow_duplicates {
            self.buckets
                .values()
                .flat_map(|bucket| {
                    bucket.entries.iter().map(|entry| Receiver {
                        slot: ReceiverSlot::Entry(entry.id),
                        callback: Rc::clone(&bucket.callback),
                    })
                })
                .collect()
        } else {
            self.buckets
                .iter()
                .map(|(key, bucket)| Receiver {
                    slot: ReceiverSlot::Callback(*key),
                    callback: Rc::clone(&bucket.callback),
                })
                .collect()
        }
    }

    pub(crate) fn is_live(&self, slot: ReceiverSlot) -> bool {
        match slot {
            ReceiverSlot::Callback(key) => self.buckets.contains_key(&key),
            ReceiverSlot::Entry(id) => self.owners.contains_key(&id),
        }
    }

    /// Remove everything, returning the entries and the released callbacks.
    pub(crate) fn drain(&mut self) -> (Vec<CadenceEntry>, Vec<UpdateCallback>) {
        let mut entries = Vec::with_capacity(self.owners.len());
        self.owners.clear();
        let mut callbacks = Vec::with_capacity(self.buckets.len());
        for (_, bucket) in self.buckets.drain(..) {
            entries.extend(bucket.entries);
            callbacks.push(bucket.callback);
        }
        (entries, callbacks)
    }
}
