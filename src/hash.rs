//! Hashing seam for the trie.
//!
//! The trie never hashes keys itself. It asks a [`HashFunction`] for a `u64`
//! and for the number of significant bits in it, and sizes its depth to that
//! width: one level per 5-bit slice, with hash-exhausted collisions falling
//! through to a list node.
//!
//! Three kinds of hash function are supported out of the box:
//!
//! - any `Fn(&K) -> u64 + Send + Sync` closure (64 significant bits),
//! - [`BuildHasherFn`], adapting a std [`BuildHasher`] for `K: Hash`,
//! - [`Truncated`], narrowing another hash function to its low `bits`.

use std::hash::{BuildHasher, Hash, RandomState};

/// Width of the hash in bits when a function does not say otherwise.
pub const HASH_BITS: u32 = u64::BITS;

/// A total, deterministic hash over the key domain.
///
/// Two keys that compare equal must hash identically. The trie does not
/// rehash, so the function must also be stable for the trie's lifetime.
pub trait HashFunction<K: ?Sized>: Send + Sync {
    /// Hash `key`. Only the low [`bits`](Self::bits) bits are significant.
    fn hash(&self, key: &K) -> u64;

    /// Number of significant low bits produced by [`hash`](Self::hash).
    #[inline]
    fn bits(&self) -> u32 {
        HASH_BITS
    }
}

impl<K, F> HashFunction<K> for F
where
    K: ?Sized,
    F: Fn(&K) -> u64 + Send + Sync,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self(key)
    }
}

/// Adapts a std [`BuildHasher`] into a [`HashFunction`] for every `Hash` key.
///
/// This is the default hash function of [`Ctrie`](crate::Ctrie). With the
/// default `RandomState` the seed is picked once per trie, so hashing stays
/// deterministic for that trie's lifetime.
#[derive(Debug, Clone, Default)]
pub struct BuildHasherFn<S = RandomState> {
    build: S,
}

impl<S> BuildHasherFn<S> {
    /// Wrap a hash builder.
    #[must_use]
    pub const fn new(build: S) -> Self {
        Self { build }
    }

    /// The wrapped hash builder.
    #[must_use]
    pub const fn build_hasher(&self) -> &S {
        &self.build
    }
}

impl<Q, S> HashFunction<Q> for BuildHasherFn<S>
where
    Q: Hash + ?Sized,
    S: BuildHasher + Send + Sync,
{
    #[inline]
    fn hash(&self, key: &Q) -> u64 {
        self.build.hash_one(key)
    }
}

/// Narrows another hash function to its low `bits` bits.
///
/// Useful for hash functions that are natively narrower than 64 bits (a
/// 32-bit hash should report 32, so collisions past its last slice go
/// straight to a list node) and for forcing deep collision chains in tests.
#[derive(Debug, Clone, Copy)]
pub struct Truncated<F> {
    inner: F,
    bits: u32,
}

impl<F> Truncated<F> {
    /// Keep the low `bits` bits of `inner`'s hash. `bits` is clamped to `1..=64`.
    #[must_use]
    pub fn new(inner: F, bits: u32) -> Self {
        Self {
            inner,
            bits: bits.clamp(1, HASH_BITS),
        }
    }

    /// Mask for the significant bits.
    #[inline(always)]
    const fn mask(&self) -> u64 {
        if self.bits >= HASH_BITS {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }
}

impl<K, F> HashFunction<K> for Truncated<F>
where
    K: ?Sized,
    F: HashFunction<K>,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.inner.hash(key) & self.mask()
    }

    #[inline]
    fn bits(&self) -> u32 {
        self.bits.min(self.inner.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_reports_full_width() {
        let f = |k: &u64| k.wrapping_mul(31);

        assert_eq!(HashFunction::<u64>::hash(&f, &2), 62);
        assert_eq!(HashFunction::<u64>::bits(&f), 64);
    }

    #[test]
    fn test_build_hasher_is_deterministic() {
        let h: BuildHasherFn = BuildHasherFn::default();

        assert_eq!(h.hash("foo"), h.hash("foo"));
        assert_eq!(h.hash(&String::from("foo")), h.hash("foo"));
    }

    #[test]
    fn test_truncated_masks_and_reports_width() {
        let t = Truncated::new(|k: &u64| *k, 8);

        assert_eq!(t.hash(&0x1234), 0x34);
        assert_eq!(t.bits(), 8);
    }

    #[test]
    fn test_truncated_clamps_width() {
        let zero = Truncated::new(|k: &u64| *k, 0);
        let wide = Truncated::new(|k: &u64| *k, 100);

        assert_eq!(zero.bits(), 1);
        assert_eq!(zero.hash(&3), 1);
        assert_eq!(wide.bits(), 64);
        assert_eq!(wide.hash(&u64::MAX), u64::MAX);
    }

    #[test]
    fn test_truncated_never_widens_inner() {
        let inner = Truncated::new(|k: &u64| *k, 4);
        let outer = Truncated::new(inner, 32);

        assert_eq!(outer.bits(), 4);
        assert_eq!(outer.hash(&0xff), 0xf);
    }
}
