//! Explicit random number generators.
//!
//! Every fit and sample routine takes `&mut SynthRng` (or any [`rand::Rng`]);
//! nothing in the crate reads a process-global generator.

use std::ops::{Deref, DerefMut};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Generator used throughout the crate.
pub type SynthRng = ChaCha8Rng;

/// A generator seeded with `seed`.
pub fn seeded(seed: u64) -> SynthRng {
    SynthRng::seed_from_u64(seed)
}

/// A generator seeded from operating system entropy.
pub fn from_entropy() -> SynthRng {
    SynthRng::from_entropy()
}

/// Independent stream `stream` of the generator seeded with `seed`.
pub(crate) fn stream(seed: u64, stream: u64) -> SynthRng {
    let mut rng = seeded(seed);
    rng.set_stream(stream);
    rng
}

/// Reseeds a borrowed generator for the guard's lifetime and restores the
/// previous state when dropped, including on early return or unwind.
pub struct SeedScope<'a> {
    rng: &'a mut SynthRng,
    saved: SynthRng,
}

impl<'a> SeedScope<'a> {
    pub fn new(rng: &'a mut SynthRng, seed: u64) -> Self {
        let saved = std::mem::replace(rng, seeded(seed));
        Self { rng, saved }
    }
}

impl Deref for SeedScope<'_> {
    type Target = SynthRng;

    fn deref(&self) -> &SynthRng {
        &*self.rng
    }
}

impl DerefMut for SeedScope<'_> {
    fn deref_mut(&mut self) -> &mut SynthRng {
        &mut *self.rng
    }
}

impl Drop for SeedScope<'_> {
    fn drop(&mut self) {
        std::mem::swap(self.rng, &mut self.saved);
    }
}
