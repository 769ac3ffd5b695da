//! Time-ordered identifier generation
//!
//! The generator keeps the last millisecond and the last identifier it handed
//! out. A call in a new millisecond draws a fresh random identifier; a call in
//! the same millisecond bumps the leading counter and re-draws the tail, so
//! identifiers from one millisecond sort in call order.

use super::{FragmentId, UuidBytes};
use crate::error::{FragmentError, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::OnceLock;

/// Millisecond time source
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock (milliseconds since the Unix epoch)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

impl<F> Clock for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn now_ms(&self) -> u64 {
        self()
    }
}

struct GeneratorState {
    /// Millisecond of the previous call, `None` before the first call
    prev_ms: Option<u64>,
    /// Identifier returned by the previous call
    prev: UuidBytes,
    rng: StdRng,
}

/// Thread-safe fragment id generator
pub struct UuidGenerator<C: Clock = SystemClock> {
    clock: C,
    state: Mutex<GeneratorState>,
}

impl UuidGenerator<SystemClock> {
    /// Generator on the wall clock, seeded from OS entropy
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for UuidGenerator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> UuidGenerator<C> {
    /// Generator on a custom clock, seeded from OS entropy
    pub fn with_clock(clock: C) -> Self {
        Self::with_rng(clock, StdRng::from_entropy())
    }

    /// Generator with a fixed random seed (reproducible output for a given clock)
    pub fn with_seed(clock: C, seed: u64) -> Self {
        Self::with_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(clock: C, rng: StdRng) -> Self {
        UuidGenerator {
            clock,
            state: Mutex::new(GeneratorState {
                prev_ms: None,
                prev: UuidBytes::default(),
                rng,
            }),
        }
    }

    /// Mint the next identifier
    ///
    /// # Errors
    ///
    /// `GenerationExhausted` if more than the counter space of identifiers is
    /// requested within one millisecond. The generator state is left as it was.
    pub fn generate(&self) -> Result<FragmentId> {
        let mut state = self.state.lock();
        let now = self.clock.now_ms();

        // `!=` rather than `>`: a clock that steps backwards also gets a fresh value
        if state.prev_ms != Some(now) {
            let fresh = UuidBytes::random(&mut state.rng);
            state.prev = fresh;
            state.prev_ms = Some(now);
            return Ok(fresh.into());
        }

        let mut next = state.prev;
        if !next.increment_counter() {
            return Err(FragmentError::GenerationExhausted);
        }
        next.randomize_tail(&mut state.rng);
        state.prev = next;

        Ok(next.into())
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

static GLOBAL: OnceLock<UuidGenerator> = OnceLock::new();

/// Process-wide generator, created on first use
pub fn global() -> &'static UuidGenerator {
    GLOBAL.get_or_init(UuidGenerator::new)
}

/// Mint a fragment id from the process-wide generator
pub fn generate_fragment_id() -> Result<FragmentId> {
    global().generate()
}
