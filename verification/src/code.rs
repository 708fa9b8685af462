//! Challenge codes and their per-validator fragments.

use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;

use crate::VerificationError;

/// Digits each validator contributes to the full code.
pub const FRAGMENT_LEN: usize = 2;

/// Source of the two-digit challenge a validator sends.
#[derive(Debug)]
pub enum CodeGenerator {
    /// A uniformly random two-digit code per challenge.
    Random,
    /// A code derived from a seed (the validator index), for modes where the
    /// full code is known in advance.
    Fixed(AtomicU32),
}

impl CodeGenerator {
    pub fn fixed(seed: u32) -> Self {
        Self::Fixed(AtomicU32::new(seed))
    }

    pub fn next_code(&self) -> String {
        let value = match self {
            Self::Random => rand::thread_rng().gen_range(0..100),
            Self::Fixed(seed) => seed.load(Ordering::Relaxed) % 100,
        };
        format!("{value:02}")
    }

    /// Replace the seed of a `Fixed` generator; `Random` ignores it.
    pub fn reseed(&self, seed: u32) {
        if let Self::Fixed(current) = self {
            current.store(seed, Ordering::Relaxed);
        }
    }
}

/// The fragment of `code` that belongs to validator `index`.
pub fn code_fragment(code: &str, index: u32) -> Result<&str, VerificationError> {
    let start = index as usize * FRAGMENT_LEN;
    let too_short = || VerificationError::CodeTooShort {
        len: code.len(),
        index,
    };
    let end = start.checked_add(FRAGMENT_LEN).ok_or_else(too_short)?;
    code.get(start..end).ok_or_else(too_short)
}
