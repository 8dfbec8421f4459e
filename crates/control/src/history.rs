//! Fixed-capacity FIFO of recent control errors

/// Number of errors retained by the controller
pub const ERROR_HISTORY_CAPACITY: usize = 200;

/// Ring buffer holding the most recent `N` errors in chronological order.
///
/// Pushing beyond capacity overwrites the oldest entry in place, so eviction is O(1).
/// `N` must be non-zero.
#[derive(Debug, Clone)]
pub struct ErrorHistory<const N: usize = ERROR_HISTORY_CAPACITY> {
    buffer: [f64; N],
    // index of the oldest entry
    head: usize,
    len: usize,
}

impl<const N: usize> Default for ErrorHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ErrorHistory<N> {
    pub fn new() -> Self {
        Self {
            buffer: [0.0; N],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Append an error, evicting the oldest one when full
    pub fn push(&mut self, error: f64) {
        if N == 0 {
            return;
        }
        if self.len < N {
            self.buffer[(self.head + self.len) % N] = error;
            self.len += 1;
        } else {
            self.buffer[self.head] = error;
            self.head = (self.head + 1) % N;
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Entry `index` counted from the oldest
    pub fn get(&self, index: usize) -> Option<f64> {
        (index < self.len).then(|| self.buffer[(self.head + index) % N])
    }

    /// Entry `n` counted back from the newest (`0` is the newest)
    pub fn nth_back(&self, n: usize) -> Option<f64> {
        if n < self.len {
            self.get(self.len - 1 - n)
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<f64> {
        self.nth_back(0)
    }

    /// The newest `min(n, len)` errors, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = f64> + '_ {
        let start = self.len - n.min(self.len);
        (start..self.len).map(move |i| self.buffer[(self.head + i) % N])
    }

    /// All retained errors, oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.recent(self.len)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}
