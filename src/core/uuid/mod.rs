//! Fragment identifiers
//!
//! Every fragment is named by a 128-bit identifier laid out like a UUIDv4,
//! with one twist: the first four bytes double as a big-endian counter for
//! identifiers minted within the same millisecond, so that those identifiers
//! sort in generation order.
//!
//! **Layout**:
//! ```text
//! byte 0       top bit 0 on a new millisecond (ordering guard)
//! bytes 0..4   same-millisecond counter (big-endian)
//! byte 6       high nibble 0x4 (version), new millisecond only
//! byte 8       top two bits 01 (variant), new millisecond only
//! bytes 4..16  entropy, re-drawn on every call
//! ```
//!
//! The version, variant and guard bits are stamped when a millisecond starts.
//! Later identifiers in the same millisecond re-draw bytes 4..16 whole, so
//! only the counter is carried over.
//!
//! The canonical text form is 32 lowercase hex characters without hyphens.

pub mod generator;

pub use generator::{generate_fragment_id, Clock, SystemClock, UuidGenerator};

use crate::error::{FragmentError, Result};
use crate::validation::validate_fragment_id;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// Size of an identifier in bytes
pub const UUID_LEN: usize = 16;

/// Number of leading bytes used as the same-millisecond counter
pub const COUNTER_LEN: usize = 4;

/// Length of the canonical text form
pub const UUID_HEX_LEN: usize = UUID_LEN * 2;

const VERSION_BYTE: usize = 6;
const VARIANT_BYTE: usize = 8;
const GUARD_BYTE: usize = 0;

/// Raw identifier bytes with named helpers for the encoded bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UuidBytes([u8; UUID_LEN]);

impl UuidBytes {
    pub const fn from_array(bytes: [u8; UUID_LEN]) -> Self {
        UuidBytes(bytes)
    }

    /// Fresh identifier for a new millisecond: all random, then stamped
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; UUID_LEN];
        rng.fill_bytes(&mut bytes);
        let mut uuid = UuidBytes(bytes);
        uuid.set_version();
        uuid.set_variant();
        uuid.clear_ordering_guard();
        uuid
    }

    /// Set the top four bits of byte 6 to the v4 version marker
    pub fn set_version(&mut self) {
        self.0[VERSION_BYTE] = 0x40 | (self.0[VERSION_BYTE] & 0x0F);
    }

    /// Set the top two bits of byte 8 to `01`
    pub fn set_variant(&mut self) {
        self.0[VARIANT_BYTE] = 0x40 | (self.0[VARIANT_BYTE] & 0x3F);
    }

    /// Clear the top bit of byte 0 so the counter has room to grow
    pub fn clear_ordering_guard(&mut self) {
        self.0[GUARD_BYTE] &= 0x7F;
    }

    pub fn version(&self) -> u8 {
        self.0[VERSION_BYTE] >> 4
    }

    pub fn variant(&self) -> u8 {
        self.0[VARIANT_BYTE] >> 6
    }

    /// The leading counter as a big-endian integer
    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Add one to the leading counter, carrying leftward.
    ///
    /// Returns `false` without modifying anything when the full 4-byte counter
    /// would carry out of byte 0.
    pub fn increment_counter(&mut self) -> bool {
        match self.counter().checked_add(1) {
            Some(next) => {
                self.0[..COUNTER_LEN].copy_from_slice(&next.to_be_bytes());
                true
            }
            None => false,
        }
    }

    /// Re-draw every byte after the counter
    pub fn randomize_tail<R: RngCore + ?Sized>(&mut self, rng: &mut R) {
        rng.fill_bytes(&mut self.0[COUNTER_LEN..]);
    }

    pub fn as_bytes(&self) -> &[u8; UUID_LEN] {
        &self.0
    }
}

/// Identifier naming one fragment
///
/// Ordering is byte-wise, which is also the ordering of the hex text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentId([u8; UUID_LEN]);

impl FragmentId {
    pub const fn from_bytes(bytes: [u8; UUID_LEN]) -> Self {
        FragmentId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; UUID_LEN] {
        &self.0
    }

    /// Canonical 32-character lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The same-millisecond counter carried in the leading bytes
    pub fn counter(&self) -> u32 {
        UuidBytes(self.0).counter()
    }
}

impl From<UuidBytes> for FragmentId {
    fn from(bytes: UuidBytes) -> Self {
        FragmentId(bytes.0)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for FragmentId {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self> {
        validate_fragment_id(s)?;

        let mut bytes = [0u8; UUID_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| FragmentError::InvalidFragmentName(format!("{}: {}", s, e)))?;
        Ok(FragmentId(bytes))
    }
}
