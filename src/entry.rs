//! Idle-queue entries and the arena that links them

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Stable handle to an arena slot.
///
/// The generation changes every time the slot is vacated, so a handle held by
/// an eviction task never resolves to an entry that reused the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryKey {
    index: usize,
    generation: u64,
}

/// Removal state shared between an entry and its eviction task
#[derive(Debug)]
pub(crate) struct EntryState {
    claimed: AtomicBool,
    cancel: CancellationToken,
}

impl EntryState {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            cancel,
        }
    }

    /// Attempt to become the single remover of this entry.
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[cfg(test)]
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    pub fn cancel_eviction(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

pub(crate) struct Entry<T> {
    pub value: T,
    pub state: Arc<EntryState>,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Slot<T> {
    generation: u64,
    entry: Option<Entry<T>>,
}

/// Doubly-linked chain of idle entries stored in an index arena.
///
/// All access happens behind the queue's structural lock.
pub(crate) struct Chain<T> {
    slots: Vec<Slot<T>>,
    vacant: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Chain<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Link a new entry after the current tail.
    pub fn push_back(&mut self, value: T, state: Arc<EntryState>) -> EntryKey {
        let entry = Entry {
            value,
            state,
            prev: self.tail,
            next: None,
        };

        let index = match self.vacant.pop() {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(prev) = self.entry_mut(tail) {
                    prev.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        EntryKey {
            index,
            generation: self.slots[index].generation,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Entry<T>> {
        self.slots.get(index)?.entry.as_ref()
    }

    pub fn next_of(&self, index: usize) -> Option<usize> {
        self.get(index)?.next
    }

    /// Resolve a key to its slot index if the entry it names is still linked.
    pub fn resolve(&self, key: EntryKey) -> Option<usize> {
        let slot = self.slots.get(key.index)?;
        (slot.generation == key.generation && slot.entry.is_some()).then_some(key.index)
    }

    /// Detach the entry at `index` from wherever it sits in the chain.
    pub fn unlink(&mut self, index: usize) -> Option<Entry<T>> {
        let entry = self.slots.get_mut(index)?.entry.take()?;

        match entry.prev {
            Some(prev) => {
                if let Some(prev) = self.entry_mut(prev) {
                    prev.next = entry.next;
                }
            }
            None => self.head = entry.next,
        }
        match entry.next {
            Some(next) => {
                if let Some(next) = self.entry_mut(next) {
                    next.prev = entry.prev;
                }
            }
            None => self.tail = entry.prev,
        }

        self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
        self.vacant.push(index);
        self.len -= 1;

        Some(entry)
    }

    /// Unlink every entry, head first.
    pub fn drain(&mut self) -> Vec<Entry<T>> {
        let mut drained = Vec::with_capacity(self.len);
        while let Some(head) = self.head {
            match self.unlink(head) {
                Some(entry) => drained.push(entry),
                None => break,
            }
        }
        drained
    }

    fn entry_mut(&mut self, index: usize) -> Option<&mut Entry<T>> {
        self.slots.get_mut(index)?.entry.as_mut()
    }

    /// Walk the chain both ways and check it agrees with `len`.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        assert_eq!(self.head.is_none(), self.tail.is_none());
        assert_eq!(self.head.is_none(), self.len == 0);

        let mut forward = 0;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let entry = self.get(index).expect("linked slot is vacant");
            assert_eq!(entry.prev, prev, "broken back link at {index}");
            forward += 1;
            assert!(forward <= self.len, "cycle in chain");
            prev = Some(index);
            cursor = entry.next;
        }
        assert_eq!(prev, self.tail);
        assert_eq!(forward, self.len);
    }

    #[cfg(test)]
    pub fn key_of(&self, index: usize) -> Option<EntryKey> {
        let slot = self.slots.get(index)?;
        slot.entry.as_ref()?;
        Some(EntryKey {
            index,
            generation: slot.generation,
        })
    }

    #[cfg(test)]
    pub fn values(&self) -> Vec<&T> {
        let mut values = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let entry = self.get(index).expect("linked slot is vacant");
            values.push(&entry.value);
            cursor = entry.next;
        }
        values
    }
}
