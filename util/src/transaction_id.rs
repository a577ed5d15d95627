//! Bounded ring of recent STUN transaction IDs, used to match a response to the
//! request that issued it even across retries.

const DEFAULT_CAPACITY: usize = 20;
const MAX_CAPACITY: usize = 100;

pub type TransactionId = [u8; 12];

/// Fixed-capacity ring buffer of transaction IDs. `insert` overwrites the oldest
/// entry once the ring is full; `has` does a linear scan (the ring is small by
/// construction, so this stays cheap).
#[derive(Debug, Clone)]
pub struct TransactionIdStore {
    ids: Vec<TransactionId>,
    capacity: usize,
    next: usize,
}

impl TransactionIdStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CAPACITY);
        Self {
            ids: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    pub fn insert(&mut self, id: TransactionId) {
        if self.ids.len() < self.capacity {
            self.ids.push(id);
        } else {
            self.ids[self.next] = id;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn has(&self, id: &TransactionId) -> bool {
        self.ids.iter().any(|stored| stored == id)
    }

    pub fn reset(&mut self) {
        self.ids.clear();
        self.next = 0;
    }
}

impl Default for TransactionIdStore {
    fn default() -> Self {
        Self::new()
    }
}
