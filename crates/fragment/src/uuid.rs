//! Time-ordered fragment identifier generation.
//!
//! Fragments are named by 128-bit identifiers rendered as 32 lowercase hex
//! characters. Identifiers generated within the same clock millisecond are
//! strictly increasing in string order, which keeps directory listings of
//! fragments in write order without embedding a timestamp.
//!
//! # Ordering scheme
//!
//! ```text
//! byte:   0        3 4    5 6      7 8      9 10          15
//!        ┌──────────┬──────┬────────┬────────┬─────────────┐
//!        │ counter  │ rand │ 0x4_   │ 01__   │    rand     │
//!        │ (BE)     │      │ rand   │ rand   │             │
//!        └──────────┴──────┴────────┴────────┴─────────────┘
//! ```
//!
//! On the first call in a millisecond all 16 bytes are freshly random (with
//! the UUIDv4 version and variant tags, and the top bit of byte 0 cleared).
//! Subsequent calls in the same millisecond increment bytes 0-3 as a
//! big-endian counter and redraw bytes 4-15, so same-millisecond identifiers
//! sort in generation order while giving up no more entropy than the fact
//! that they share a millisecond.
//!
//! The generator is an explicit instance rather than a process global: share
//! one via `Arc` wherever process-wide uniqueness is needed.

use crate::error::{FragmentError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of raw bytes in a fragment identifier.
pub const UUID_LEN: usize = 16;

/// Number of characters in the hex rendering of an identifier.
pub const UUID_HEX_LEN: usize = 32;

/// A millisecond-resolution clock readable by the generator.
///
/// The generator only needs a monotonically-readable millisecond reading,
/// not wall-clock correctness. Tests inject a manual clock to simulate
/// same-millisecond bursts.
pub trait Clock {
    /// Returns the current time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// The default clock, backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // A clock before the epoch reads as 0; generation still works, the
        // millisecond just never advances until the clock does.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A 128-bit fragment identifier.
///
/// Renders as exactly 32 lowercase hexadecimal characters, no separators.
/// Lexicographic order of the rendering equals byte order of the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentUuid([u8; UUID_LEN]);

impl FragmentUuid {
    /// Returns the raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; UUID_LEN] {
        &self.0
    }

    /// Returns the 32-character lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for FragmentUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Generator state guarded by the mutex: the last identifier produced and
/// the millisecond it was produced in (`None` before the first call).
#[derive(Debug)]
struct GeneratorState {
    prev_bytes: [u8; UUID_LEN],
    prev_time_ms: Option<u64>,
}

/// Process-wide unique, approximately time-ordered identifier generator.
///
/// One mutex linearizes all calls into a single total generation order;
/// identifiers produced within the same millisecond strictly increase
/// lexicographically. No I/O happens inside the critical section.
#[derive(Debug)]
pub struct UuidGenerator<C: Clock = SystemClock> {
    state: Mutex<GeneratorState>,
    clock: C,
}

impl UuidGenerator<SystemClock> {
    /// Creates a generator backed by the system clock.
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
    /// Creates a generator backed by the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Mutex::new(GeneratorState {
                prev_bytes: [0u8; UUID_LEN],
                prev_time_ms: None,
            }),
            clock,
        }
    }

    /// Generates the next fragment identifier.
    ///
    /// # Errors
    ///
    /// Returns `FragmentError::RandomSource` if the entropy source fails,
    /// or `FragmentError::GenerationExhausted` if the same-millisecond
    /// counter overflows (roughly 2^31 identifiers in one millisecond).
    /// Both are fatal for this call only; a caller may retry
    /// `GenerationExhausted` once the millisecond elapses.
    pub fn generate(&self) -> Result<FragmentUuid> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = self.clock.now_ms();

        // `!=` rather than `>` so a rewound clock still takes the fresh
        // path instead of incrementing a counter from another millisecond.
        if state.prev_time_ms != Some(now) {
            let mut bytes = [0u8; UUID_LEN];
            fill_random_bytes(&mut bytes)?;

            // Set the top four bits of byte 6 to 0x4 for the version tag.
            bytes[6] = 0x40 | (0x0F & bytes[6]);
            // Set the top two bits of byte 8 to 01 for the variant tag.
            bytes[8] = 0x40 | (0x3F & bytes[8]);
            // Clear the top bit of byte 0 so the same-millisecond counter
            // below has at least 2^31 values before exhaustion.
            bytes[0] &= 0x7F;

            state.prev_bytes = bytes;
            state.prev_time_ms = Some(now);
            return Ok(FragmentUuid(bytes));
        }

        // Burst within one millisecond: bytes 0-3 are a big-endian counter.
        // Increment with carry from byte 3 toward byte 0; a carry required
        // out of byte 0 is the terminal overflow case.
        let mut idx = 3;
        loop {
            if state.prev_bytes[idx] < 0xFF {
                state.prev_bytes[idx] += 1;
                break;
            }
            if idx == 0 {
                return Err(FragmentError::GenerationExhausted);
            }
            state.prev_bytes[idx] = 0;
            idx -= 1;
        }

        // Redraw the trailing 12 bytes so only the shared millisecond leaks,
        // not a predictable sequence.
        let mut fresh = [0u8; UUID_LEN];
        fill_random_bytes(&mut fresh)?;
        state.prev_bytes[4..].copy_from_slice(&fresh[4..]);

        Ok(FragmentUuid(state.prev_bytes))
    }
}

/// Fills a buffer from the OS cryptographic random source.
fn fill_random_bytes(buf: &mut [u8; UUID_LEN]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| FragmentError::RandomSource(e.to_string()))
}
