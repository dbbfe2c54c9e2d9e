//! Octet strings with a logical length.
//!
//! Every buffer in the pipeline (scan lines, bit planes, codec output) is an
//! [`OctetString`]: storage allocated once, plus a logical length that may be
//! shorter. Shortening never frees or clears storage.

/// Owned byte storage plus a logical length.
///
/// Invariant: `len() <= capacity()`. A zero length means "all white" and may
/// coexist with non-empty storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OctetString {
    storage: Vec<u8>,
    length: usize,
}

impl OctetString {
    /// Allocate `capacity` zeroed octets with a logical length of zero.
    pub fn with_capacity(capacity: usize) -> Self {
        OctetString {
            storage: vec![0; capacity],
            length: 0,
        }
    }

    /// Build a string whose storage and length both equal `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        OctetString {
            storage: bytes.to_vec(),
            length: bytes.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The logical content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage[..self.length]
    }

    /// The whole storage area, including octets past the logical length.
    pub fn storage(&self) -> &[u8] {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Set the logical length.
    ///
    /// # Panics
    ///
    /// Panics if `length` exceeds the capacity.
    pub fn set_len(&mut self, length: usize) {
        assert!(
            length <= self.storage.len(),
            "length {} exceeds capacity {}",
            length,
            self.storage.len()
        );
        self.length = length;
    }

    /// Logical length zero. Storage is kept as is.
    pub fn clear(&mut self) {
        self.length = 0;
    }

    /// Replace the content with `bytes`, zero-filling the rest of the storage.
    ///
    /// Octets beyond the capacity are dropped. The logical length becomes
    /// the number of octets copied.
    pub fn load(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.storage.len());
        self.storage[..n].copy_from_slice(&bytes[..n]);
        for octet in &mut self.storage[n..] {
            *octet = 0;
        }
        self.length = n;
    }

    /// Reduce the logical length so that it excludes trailing zero octets.
    ///
    /// Returns the new length. An all-zero string ends up with length 0.
    pub fn trim_trailing_zeros(&mut self) -> usize {
        self.length = trimmed_len(&self.storage[..self.length]);
        self.length
    }
}

/// Length of `bytes` without its trailing zero octets.
pub fn trimmed_len(bytes: &[u8]) -> usize {
    bytes.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1)
}
