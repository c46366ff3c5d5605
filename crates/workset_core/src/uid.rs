//! Object fingerprint generation.
//!
//! Fingerprints only need to be unique within a process lifetime, but they
//! end up in logs and store journals, so collisions across restarts
//! should stay improbable. The generator mixes wall-clock millis, a
//! monotonic counter and random bits.

use crate::types::ObjectUid;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns a fresh, collision-resistant object fingerprint.
///
/// Never returns the zero fingerprint.
pub(crate) fn next_uid() -> ObjectUid {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let random: u64 = rand::random();
    let mixed = (millis << 20)
        .wrapping_add(counter)
        .wrapping_add(random)
        .max(1);
    ObjectUid::new(mixed)
}
