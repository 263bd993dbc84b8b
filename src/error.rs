//! Registration error types.

use thiserror::Error;

/// Failure modes of [`FontRegistry::register`](crate::registry::FontRegistry::register).
///
/// Both variants leave the registry untouched: no partial entry is ever
/// inserted, and any native identity created along the way has been
/// destroyed by the time the error reaches the caller. Partial or
/// unmappable *query* results (missing glyphs, absent tables) are not
/// errors; they are reported in-band by the accessors.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The native subsystem refused the attribute descriptor.
    #[error("backend rejected font descriptor for '{face}': {reason}")]
    CreationFailure {
        /// Requested face name, for diagnostics.
        face: String,
        /// Backend's reason for the refusal.
        reason: anyhow::Error,
    },

    /// The font was created, but the subsystem could not produce outline
    /// metrics for it (typically a bitmap-only face).
    #[error("no outline metrics available for '{face}'")]
    MetricsUnavailable {
        /// Requested face name, for diagnostics.
        face: String,
    },
}
