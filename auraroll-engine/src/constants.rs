//! Centralized tuning constants for the roll engine.
//!
//! These values define the deterministic math of a simulation run. Keeping
//! them together means odds and pacing only change through reviewed code,
//! never through catalog data.

// Logging ------------------------------------------------------------------
pub(crate) const DEBUG_ENV_VAR: &str = "AURAROLL_DEBUG_LOGS";

// Random source ------------------------------------------------------------
/// Rounds discarded after seeding so weak seeds diffuse through the state.
pub(crate) const SFC32_WARMUP_ROUNDS: usize = 12;
pub(crate) const SEED_DOMAIN_TAG: &[u8] = b"auraroll.sfc32";

// Trial engine -------------------------------------------------------------
pub const DEFAULT_BATCH_MAX_TRIALS: u64 = 250_000;
pub const DEFAULT_SLICE_MS: u64 = 16;
pub const DEFAULT_CLOCK_CHECK_INTERVAL: u64 = 4_096;
/// Upper bound for a single time slice; longer slices stall the host.
pub const MAX_SLICE_MS: u64 = 1_000;

// Results ------------------------------------------------------------------
/// Lower bounds (inclusive) of each rarity tier, by base chance.
pub(crate) const TIER_EPIC_MIN: u64 = 1_000;
pub(crate) const TIER_UNIQUE_MIN: u64 = 10_000;
pub(crate) const TIER_LEGENDARY_MIN: u64 = 100_000;
pub(crate) const TIER_MYTHIC_MIN: u64 = 1_000_000;
pub(crate) const TIER_EXALTED_MIN: u64 = 10_000_000;
pub(crate) const TIER_GLORIOUS_MIN: u64 = 100_000_000;
pub(crate) const TIER_TRANSCENDENT_MIN: u64 = 1_000_000_000;

/// Trial-count milestones reported after a completed run.
pub(crate) const TRIAL_MILESTONES: [u64; 7] = [
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];
