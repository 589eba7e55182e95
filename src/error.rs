//! Error type for the fallible map operations.
//!
//! Every boolean-returning operation of [`OrderedMultiMap`] has a `try_`
//! counterpart that reports the reason for a failure with [`MultiMapError`].
//! None of these failures leave the map modified.
//!
//! [`OrderedMultiMap`]: crate::ordered_multi_map::OrderedMultiMap

use crate::ordered_multi_map::Position;

/// Why an operation on an [`OrderedMultiMap`] did not take effect.
///
/// [`OrderedMultiMap`]: crate::ordered_multi_map::OrderedMultiMap
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MultiMapError {
    /// The key is already present. Keys are never overwritten and never
    /// belong to two groups at once.
    #[error("key is already present in the map at {existing:?}")]
    DuplicateKey {
        /// Where the key currently lives.
        existing: Position,
    },

    /// The key is not present in the map.
    #[error("key not found in the map")]
    NotFound,

    /// There is no group on the requested side of the position: a key can
    /// not be attached to the left of the first pair or to the right of the
    /// end position.
    #[error("no group to attach to at this position")]
    InvalidPosition,
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            MultiMapError::DuplicateKey {
                existing: Position::end()
            }
            .to_string(),
            "key is already present in the map at Position(end)"
        );
        assert_eq!(MultiMapError::NotFound.to_string(), "key not found in the map");
        assert_eq!(
            MultiMapError::InvalidPosition.to_string(),
            "no group to attach to at this position"
        );
    }
}
