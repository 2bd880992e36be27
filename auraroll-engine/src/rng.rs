//! Small-state `sfc32` generator used for every trial draw.
//!
//! Four 32-bit words of state; each step is add/rotate/xor only. Seeds come
//! from the OS entropy source when it is available and from the wall clock
//! otherwise. Reproducible runs derive their words from a user seed.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{SEED_DOMAIN_TAG, SFC32_WARMUP_ROUNDS};

const TWO_POW_32: f64 = 4_294_967_296.0;
const TWO_POW_53: f64 = 9_007_199_254_740_992.0;

/// Simple fast counter generator, 32-bit variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sfc32 {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
    draws: u64,
}

impl Sfc32 {
    /// Build a generator from four seed words and run the warm-up rounds.
    #[must_use]
    pub fn from_words(words: [u32; 4]) -> Self {
        let [a, b, c, d] = words;
        let mut rng = Self {
            a,
            b,
            c,
            d,
            draws: 0,
        };
        for _ in 0..SFC32_WARMUP_ROUNDS {
            rng.step();
        }
        rng.draws = 0;
        rng
    }

    /// Deterministic generator for a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self::from_words(derive_seed_words(seed, SEED_DOMAIN_TAG))
    }

    /// Seed from the OS entropy source, falling back to the wall clock.
    #[must_use]
    pub fn from_os_entropy() -> Self {
        let mut bytes = [0u8; 16];
        match OsRng.try_fill_bytes(&mut bytes) {
            Ok(()) => Self::from_seed(bytes),
            Err(err) => {
                log::warn!("OS entropy unavailable ({err}); seeding from the clock");
                Self::from_words(derive_seed_words(clock_entropy(), b"auraroll.clock"))
            }
        }
    }

    #[inline]
    fn step(&mut self) -> u32 {
        let t = self.a.wrapping_add(self.b).wrapping_add(self.d);
        self.d = self.d.wrapping_add(1);
        self.a = self.b ^ (self.b >> 9);
        self.b = self.c.wrapping_add(self.c << 3);
        self.c = self.c.rotate_left(21).wrapping_add(t);
        t
    }

    /// Uniform float in `[0, 1)` with 32 bits of resolution.
    #[inline]
    pub fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u32()) / TWO_POW_32
    }

    /// Uniform float in `[0, 1)` with 53 bits of resolution.
    ///
    /// Two outputs per call; needed so odds around 1 in 10^10 are still
    /// representable as distinct sample points.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        let hi = u64::from(self.next_u32() >> 5);
        let lo = u64::from(self.next_u32() >> 6);
        let bits = (hi << 26) | lo;
        // 53-bit integers are exact in f64.
        #[allow(clippy::cast_precision_loss)]
        let value = bits as f64;
        value / TWO_POW_53
    }

    /// Number of 32-bit outputs produced since seeding.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl RngCore for Sfc32 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Sfc32 {
    type Seed = [u8; 16];

    fn from_seed(seed: Self::Seed) -> Self {
        let mut words = [0u32; 4];
        for (word, chunk) in words.iter_mut().zip(seed.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self::from_words(words)
    }
}

fn derive_seed_words(user_seed: u64, domain_tag: &[u8]) -> [u32; 4] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

#[allow(clippy::cast_possible_truncation)]
fn clock_entropy() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let folded = (nanos >> 64) as u64 ^ (nanos as u64);
    folded ^ u64::from(std::process::id()).rotate_left(32)
}
