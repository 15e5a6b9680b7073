//! Pool slot selection.

use crate::error::{ClientError, Result};

/// Pick the session slot a client binds to.
///
/// Priority: an explicit index passed at construction, then the configured
/// `session_index`, then a uniformly random slot when `pool_size > 1`, else 0.
///
/// # Errors
///
/// Returns [`ClientError::Configuration`] if the chosen index is outside
/// `0..pool_size`.
pub fn select_slot(
    explicit: Option<usize>,
    configured: Option<usize>,
    pool_size: usize,
    rng: &mut fastrand::Rng,
) -> Result<usize> {
    let pool_size = pool_size.max(1);
    let slot = match explicit.or(configured) {
        Some(index) => index,
        None if pool_size > 1 => rng.usize(0..pool_size),
        None => 0,
    };

    if slot >= pool_size {
        return Err(ClientError::configuration(format!(
            "session index {slot} is out of range for pool_size {pool_size}"
        )));
    }
    Ok(slot)
}
