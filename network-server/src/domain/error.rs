//! Domain error types.
//!
//! These errors represent validation failures and data inconsistencies
//! in the domain layer. They are distinct from store/IO errors.

use super::LinkKey;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// A link key string is not of the form `A-B-F`
    #[error("invalid link key {input:?}: {reason}")]
    InvalidLinkKey { input: String, reason: &'static str },

    /// An itinerary references a link that is not in the network
    #[error("link {0} is not in the network")]
    UnknownLink(LinkKey),

    /// A route has no length to apportion measures over
    #[error("route {0} has zero total length")]
    ZeroLengthRoute(String),

    /// A travel-time estimate was asked for at a speed that is not positive
    #[error("speed must be positive and finite, got {0}")]
    InvalidSpeed(f64),
}
