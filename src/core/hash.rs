//! State Hashing
//!
//! SHA-256 fingerprint of a match state. Used to check that a replayed or
//! replicated match ended where the authoritative one did, and to tag
//! match results in the logs.
//!
//! Anything that takes part in the fingerprint implements
//! [`StateDigest`]; the field order inside each impl is part of the
//! format.

use sha2::{Sha256, Digest};

use super::grid::GridPos;

/// 32-byte state fingerprint
pub type StateHash = [u8; 32];

/// Domain tag prefixed to every state fingerprint.
const STATE_DOMAIN: &[u8] = b"ARCANE_SIEGE_STATE_V1";

/// A value with a canonical byte encoding for fingerprinting.
pub trait StateDigest {
    /// Feed this value into `hasher`.
    fn digest_into(&self, hasher: &mut StateHasher);
}

/// Accumulates [`StateDigest`] values in order.
pub struct StateHasher {
    inner: Sha256,
}

impl StateHasher {
    /// Hasher seeded with `domain`, so fingerprints of different kinds
    /// never collide.
    pub fn with_domain(domain: &[u8]) -> Self {
        let mut inner = Sha256::new();
        inner.update(domain);
        Self { inner }
    }

    /// Feed a value. Chainable.
    pub fn put<T: StateDigest + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.digest_into(self);
        self
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Finish and return the fingerprint.
    pub fn finish(self) -> StateHash {
        self.inner.finalize().into()
    }
}

impl StateDigest for u8 {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.raw(&[*self]);
    }
}

impl StateDigest for u32 {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.raw(&self.to_le_bytes());
    }
}

impl StateDigest for i32 {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.raw(&self.to_le_bytes());
    }
}

impl StateDigest for bool {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.put(&u8::from(*self));
    }
}

// Length-prefixed, so "ab"+"c" and "a"+"bc" differ.
impl StateDigest for str {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.put(&(self.len() as u32));
        hasher.raw(self.as_bytes());
    }
}

impl StateDigest for GridPos {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.put(&self.x).put(&self.z);
    }
}

impl<T: StateDigest> StateDigest for Option<T> {
    fn digest_into(&self, hasher: &mut StateHasher) {
        match self {
            Some(value) => hasher.put(&true).put(value),
            None => hasher.put(&false),
        };
    }
}

impl<T: StateDigest> StateDigest for [T] {
    fn digest_into(&self, hasher: &mut StateHasher) {
        hasher.put(&(self.len() as u32));
        for item in self {
            hasher.put(item);
        }
    }
}

/// Fingerprint a whole state value.
pub fn compute_state_hash<T: StateDigest + ?Sized>(state: &T) -> StateHash {
    let mut hasher = StateHasher::with_domain(STATE_DOMAIN);
    hasher.put(state);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(build: impl FnOnce(&mut StateHasher)) -> StateHash {
        let mut hasher = StateHasher::with_domain(b"test");
        build(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_same_input_same_hash() {
        let build = |h: &mut StateHasher| {
            h.put(&100u32).put(&GridPos::new(4, 7)).put("p_core").put(&true);
        };
        assert_eq!(fingerprint(build), fingerprint(build));
    }

    #[test]
    fn test_order_matters() {
        let a = fingerprint(|h| { h.put(&1u32).put(&2u32); });
        let b = fingerprint(|h| { h.put(&2u32).put(&1u32); });
        assert_ne!(a, b);
    }

    #[test]
    fn test_strings_are_length_prefixed() {
        let a = fingerprint(|h| { h.put("ab").put("c"); });
        let b = fingerprint(|h| { h.put("a").put("bc"); });
        assert_ne!(a, b);
    }

    #[test]
    fn test_option_and_slice_framing() {
        let none = fingerprint(|h| { h.put(&None::<u8>); });
        let zero = fingerprint(|h| { h.put(&Some(0u8)); });
        assert_ne!(none, zero);

        let split = fingerprint(|h| { h.put(&[1u8][..]).put(&[2u8][..]); });
        let joined = fingerprint(|h| { h.put(&[1u8, 2][..]); });
        assert_ne!(split, joined);
    }

    #[test]
    fn test_domain_separates() {
        let cell = GridPos::new(1, 1);
        assert_ne!(compute_state_hash(&cell), fingerprint(|h| { h.put(&cell); }));
    }
}
