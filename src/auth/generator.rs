//! Random opaque token generation.

use std::sync::Mutex;

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces random opaque strings of a requested length.
///
/// Generation cannot fail, so there is no error return. Implementations must
/// be safe to call from many request-handling tasks at once.
pub trait TokenGenerator: Send + Sync {
    /// Generate exactly `len` alphanumeric characters. Returns an empty
    /// string for `len == 0`.
    fn generate(&self, len: usize) -> String;
}

/// [`TokenGenerator`] backed by a mutex-guarded [`StdRng`].
///
/// The lock guarantees that concurrent calls never interleave byte draws
/// from the same source.
pub struct RandomTokenSource {
    rng: Mutex<StdRng>,
}

impl RandomTokenSource {
    /// Create a generator seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Create a deterministically seeded generator. Only useful in tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator for RandomTokenSource {
    fn generate(&self, len: usize) -> String {
        let mut rng = self.rng.lock().unwrap();
        (0..len).map(|_| rng.sample(Alphanumeric) as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_length() {
        let src = RandomTokenSource::new();
        for len in [0, 1, 16, 128] {
            assert_eq!(src.generate(len).len(), len);
        }
    }

    #[test]
    fn test_generate_alphanumeric() {
        let src = RandomTokenSource::new();
        let token = src.generate(256);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = RandomTokenSource::from_seed(42);
        let b = RandomTokenSource::from_seed(42);
        assert_eq!(a.generate(32), b.generate(32));
    }

    #[test]
    fn test_concurrent_generation() {
        use std::sync::Arc;

        let src = Arc::new(RandomTokenSource::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let src = src.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(src.generate(16).len(), 16);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
