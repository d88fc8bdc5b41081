//! Deterministic RNG wrapper, seed-derivation helpers and the per-worker
//! generator table.

use std::hash::Hasher;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use siphasher::sip::SipHasher13;

/// Deterministic RNG handle exposed to SSUR consumers.
///
/// The handle is a thin wrapper around `StdRng`. Substreams are derived by
/// hashing `(master_seed, substream_id)` with SipHash-1-3 configured with
/// fixed zero keys, which is stable across platforms.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns a mutable reference to the underlying RNG for advanced usage.
    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Draws a uniform variate in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Draws `ln U` for a uniform `U`, the quantity compared against log
    /// Metropolis–Hastings ratios.
    pub fn log_uniform(&mut self) -> f64 {
        // gen::<f64>() can return exactly 0.0
        (1.0 - self.uniform()).ln()
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// High-resolution wall-clock seed used when no explicit seed is configured.
pub fn time_seed() -> u64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .map(|nanos| nanos as u64)
        .unwrap_or_else(|| now.timestamp_micros() as u64)
}

/// One independently seeded generator per worker slot.
///
/// Slots are guarded by a mutex so that callers mapping more tasks than slots
/// onto the table stay sound; when every task owns its slot the locks are
/// uncontended.
#[derive(Debug)]
pub struct RngPool {
    engines: Vec<Mutex<RngHandle>>,
}

impl RngPool {
    /// Seeds `workers` generators from a master seed.
    ///
    /// Worker `i` starts from `master + i * stride` (wrapping) before the
    /// SipHash substream derivation, so large problems can spread the raw
    /// seeds apart.
    pub fn seeded(master_seed: u64, workers: usize, stride: u64) -> Self {
        let engines = (0..workers.max(1))
            .map(|worker| {
                let offset = (worker as u64).wrapping_mul(stride);
                let seed = derive_substream_seed(master_seed.wrapping_add(offset), worker as u64);
                Mutex::new(RngHandle::from_seed(seed))
            })
            .collect();
        Self { engines }
    }

    /// Number of generator slots.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Returns true when the pool holds no generators (never after `seeded`).
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Runs `f` with exclusive access to the generator of `slot` (taken
    /// modulo the pool size).
    pub fn with_slot<R>(&self, slot: usize, f: impl FnOnce(&mut RngHandle) -> R) -> R {
        let engine = &self.engines[slot % self.engines.len()];
        let mut guard = engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}
