//! Error types for configuration, chain coordination, and the wire format.

use std::fmt;

use crate::chain::MAX_PRIME_BITS;

/// Error type for chain configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Polynomial degree is not a power of two of at least 8.
    #[error("poly_degree {0} must be a power of two of at least 8")]
    BadPolyDegree(usize),
    /// The coefficient modulus needs at least a base and a special prime.
    #[error("modulus chain needs at least 2 primes, got {0}")]
    ChainTooShort(usize),
    /// A prime bit size is outside the supported range.
    #[error("prime bit size {0} is out of range 1..={MAX_PRIME_BITS}")]
    BadPrimeBits(u32),
    /// The initial scale is not a positive finite number.
    #[error("initial scale {0} is not a positive finite number")]
    BadScale(f64),
}

/// Kind of evaluation key an operation required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Key consumed by relinearization after a multiplication.
    Relinearization,
    /// Rotation key for a specific step count.
    Rotation(i64),
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Relinearization => write!(f, "relinearization"),
            KeyKind::Rotation(steps) => write!(f, "rotation (step {steps})"),
        }
    }
}

/// Opaque failure reported by the external cryptographic engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    /// Wrap an engine-side failure description.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error type for coordinator operations.
///
/// The coordinator never continues a chain past a failed alignment step;
/// every variant here terminates the current operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    /// The requested alignment or rescale needs a prime the chain no longer
    /// has. Terminal for the current chain.
    #[error("modulus chain exhausted: operation at level {level} needs another prime (depth {depth})")]
    ExhaustedChain {
        /// Level the operation was attempted at.
        level: usize,
        /// Total rescale steps the chain supports.
        depth: usize,
    },
    /// Operand scales cannot be reconciled by the available primes.
    #[error("operand scales 2^{:.4} and 2^{:.4} cannot be reconciled", .lhs.log2(), .rhs.log2())]
    ScaleMismatch {
        /// Scale of the left operand.
        lhs: f64,
        /// Scale of the right operand.
        rhs: f64,
    },
    /// A required evaluation key was not supplied at setup.
    #[error("required {kind} key was not supplied at setup")]
    MissingKey {
        /// Which key was missing.
        kind: KeyKind,
    },
    /// An operand carries a parameter set from a different chain.
    #[error("operand belongs to a different modulus chain")]
    ForeignValue,
    /// Failure propagated verbatim from the external engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Error type for peeking version from serialized data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeekError {
    /// Data is too short to contain a valid header.
    #[error("data too short to contain valid header")]
    TooShort,
    /// Magic bytes do not match expected value.
    #[error("invalid magic bytes")]
    InvalidMagic,
    /// Version field is corrupt or unreadable.
    #[error("version field is corrupt or unreadable")]
    InvalidVersion,
}

/// Error type for deserialization operations.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    /// Error peeking the version header.
    #[error("header validation failed: {0}")]
    Peek(#[from] PeekError),
    /// Version is not supported.
    #[error("unsupported version {got}, expected {expected}")]
    UnsupportedVersion {
        /// Version found in the header.
        got: u32,
        /// Version this build understands.
        expected: u32,
    },
    /// Error deserializing the payload.
    #[error("payload deserialization failed")]
    Payload(#[source] rmp_serde::decode::Error),
}

/// Error type for serialization operations.
#[derive(Debug, thiserror::Error)]
#[error("payload serialization failed")]
pub struct SerializeError(#[source] pub(crate) rmp_serde::encode::Error);
