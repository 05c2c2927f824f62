//! # Error Taxonomy
//!
//! Four families, handled differently by callers:
//!
//! - contract violations ([`EffectsError::NotAuthorized`],
//!   [`EffectsError::TornDown`]): programmer errors; panic in debug builds,
//!   reported in release,
//! - validation failures (unknown mode, out-of-range value, missing grading
//!   reference): synchronous, state left unchanged,
//! - transient SDK failures: non-fatal, logged, effects degrade to
//!   pass-through,
//! - authorization failures: reported through the async completion; retry
//!   belongs to the caller.
//!
//! Nothing here is auto-retried internally.

use thiserror::Error;

use crate::sdk::SdkError;

/// Result code of a color-filter configuration attempt. Success is `Ok(())`.
///
/// Transient: never stored, only returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ColorFilterError {
    /// Mode name outside the supported set.
    #[error("unknown color filter mode")]
    UnknownMode,
    /// Grading mode requested before any reference frame was set.
    #[error("color grading requires a reference frame")]
    NoGradingReference,
    /// The SDK failed to initialize the filter.
    #[error("color filter initialization failed")]
    InitializationFailed,
}

/// Errors surfaced by the effects core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectsError {
    /// Pipeline construction requested before authorization completed.
    #[error("sdk is not authorized")]
    NotAuthorized,
    /// A second `authorize` call while one attempt is in flight.
    #[error("authorization already in progress")]
    AuthorizationPending,
    /// The vendor rejected the credential.
    #[error("authorization failed: {status}")]
    AuthorizationFailed { status: &'static str },
    /// Pipeline-mode name outside the supported set.
    #[error("unknown pipeline mode: {0:?}")]
    UnknownMode(String),
    /// Numeric parameter outside its documented range.
    #[error("{name} out of range: {value} (valid: {min}..={max})")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// Color-filter configuration failed.
    #[error(transparent)]
    ColorFilter(#[from] ColorFilterError),
    /// Pipeline wrapper used after teardown.
    #[error("pipeline wrapper used after teardown")]
    TornDown,
    /// Opaque vendor failure.
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

impl EffectsError {
    /// Range-check helper: `value` within `min..=max` or an
    /// [`EffectsError::OutOfRange`] naming the offending parameter.
    pub fn check_range(name: &'static str, value: f32, min: f32, max: f32) -> Result<(), Self> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(EffectsError::OutOfRange {
                name,
                value,
                min,
                max,
            })
        }
    }
}
