//! Snapshot fingerprints using xxhash.

use xxhash_rust::xxh3::Xxh3;

/// Streaming 128-bit fingerprint used to derive snapshot identifiers.
///
/// Every field is length-prefixed so that adjacent fields cannot alias each other.
pub struct Fingerprint {
    hasher: Xxh3,
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fingerprint").finish_non_exhaustive()
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}

impl Fingerprint {
    /// Starts an empty fingerprint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: Xxh3::new(),
        }
    }

    /// Mixes a byte string.
    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    /// Mixes an integer.
    pub fn usize(&mut self, value: usize) -> &mut Self {
        self.hasher.update(&(value as u64).to_le_bytes());
        self
    }

    /// Mixes a vector by its exact bit pattern.
    pub fn vector(&mut self, vector: &[f32]) -> &mut Self {
        self.usize(vector.len());
        for value in vector {
            self.hasher.update(&value.to_bits().to_le_bytes());
        }
        self
    }

    /// Returns the fingerprint as 32 lowercase hex digits.
    #[must_use]
    pub fn hex(&self) -> String {
        format!("{:032x}", self.hasher.digest128())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_sized() {
        let mut a = Fingerprint::new();
        a.bytes(b"hash:8").usize(400).vector(&[0.5, -0.5]);
        let mut b = Fingerprint::new();
        b.bytes(b"hash:8").usize(400).vector(&[0.5, -0.5]);

        assert_eq!(a.hex(), b.hex());
        assert_eq!(a.hex().len(), 32);
    }

    #[test]
    fn length_prefix_separates_fields() {
        let mut a = Fingerprint::new();
        a.bytes(b"ab").bytes(b"c");
        let mut b = Fingerprint::new();
        b.bytes(b"a").bytes(b"bc");
        assert_ne!(a.hex(), b.hex());
    }
}
