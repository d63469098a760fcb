//! Group state store.
//!
//! Groups live in a map guarded by a [`RwLock`]; each group sits behind
//! its own [`Mutex`]. The map lock is held only long enough to look up or
//! insert an entry, so operations on different groups never wait on each
//! other, while every operation on one group runs to completion before the
//! next begins.
//!
//! Lock order is map, then entry. Code holding an entry lock never touches
//! the map.
//!
//! Poisoned locks are recovered rather than propagated: a transition only
//! swaps in its new [`Group`] after it has fully succeeded, so a panic while
//! the lock is held cannot leave a half-updated record behind.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use zeroize::Zeroizing;

use crate::group::{Group, GroupId};
use crate::{MlsError, Result, KEY_SIZE};

/// A superseded epoch secret kept for late decryption.
struct RetainedSecret {
    epoch: u64,
    epoch_secret: Zeroizing<[u8; KEY_SIZE]>,
}

/// One stored group plus the superseded secrets retained for it.
pub struct GroupEntry {
    group: Group,
    retained: VecDeque<RetainedSecret>,
}

impl GroupEntry {
    fn new(group: Group) -> Self {
        Self {
            group,
            retained: VecDeque::new(),
        }
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Swap in the next record, keeping at most `retention` superseded
    /// epoch secrets. The replaced group's secrets are wiped on drop.
    pub fn replace(&mut self, next: Group, retention: usize) {
        let previous = std::mem::replace(&mut self.group, next);
        if retention > 0 && previous.epoch != self.group.epoch {
            self.retained.push_back(RetainedSecret {
                epoch: previous.epoch,
                epoch_secret: Zeroizing::new(*previous.secrets.epoch_secret()),
            });
        }
        while self.retained.len() > retention {
            self.retained.pop_front();
        }
    }

    /// Epoch secret for `epoch`: the current one or a retained one.
    pub fn epoch_secret(&self, epoch: u64) -> Option<&[u8; KEY_SIZE]> {
        if epoch == self.group.epoch {
            return Some(self.group.secrets.epoch_secret());
        }
        self.retained
            .iter()
            .find(|r| r.epoch == epoch)
            .map(|r| &*r.epoch_secret)
    }

    /// Epochs whose secrets are currently retained, oldest first.
    pub fn retained_epochs(&self) -> Vec<u64> {
        self.retained.iter().map(|r| r.epoch).collect()
    }
}

/// Keyed collection of groups with one lock per group.
#[derive(Default)]
pub struct GroupStore {
    groups: RwLock<HashMap<GroupId, Arc<Mutex<GroupEntry>>>>,
}

fn lock(entry: &Mutex<GroupEntry>) -> MutexGuard<'_, GroupEntry> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `group`, replacing any group already stored under its id.
    ///
    /// A replaced group is swapped under its own lock, so an operation in
    /// flight on the old record finishes first. The map lock is released
    /// before that wait.
    pub fn insert(&self, group: Group) {
        let existing = {
            let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
            match groups.get(group.group_id.as_bytes()) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let id = group.group_id.clone();
                    groups.insert(id, Arc::new(Mutex::new(GroupEntry::new(group))));
                    return;
                }
            }
        };
        *lock(&existing) = GroupEntry::new(group);
    }

    fn entry(&self, id: &[u8]) -> Result<Arc<Mutex<GroupEntry>>> {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        groups
            .get(id)
            .cloned()
            .ok_or_else(|| MlsError::GroupNotFound(hex::encode(id)))
    }

    /// Run `f` with exclusive access to the group's entry.
    pub fn with_entry<R>(&self, id: &[u8], f: impl FnOnce(&mut GroupEntry) -> Result<R>) -> Result<R> {
        let entry = self.entry(id)?;
        let mut guard = lock(&entry);
        f(&mut guard)
    }

    /// Run `f` against the current group record.
    pub fn read<R>(&self, id: &[u8], f: impl FnOnce(&Group) -> R) -> Result<R> {
        let entry = self.entry(id)?;
        let guard = lock(&entry);
        Ok(f(&guard.group))
    }

    pub fn contains(&self, id: &[u8]) -> bool {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Stored identifiers, sorted.
    pub fn ids(&self) -> Vec<GroupId> {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<GroupId> = groups.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.groups.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
