//! Scale/level metadata and the tracked-value wrapper.

use serde::{Deserialize, Serialize};

/// Opaque identifier of the exact modulus set a value currently lives in.
///
/// Two values must carry the same `ParamsId` before they can be combined.
/// Identifiers are derived from the chain description, so values created
/// under different chain configurations never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamsId(pub(crate) u64);

/// Bookkeeping metadata attached to every tracked value.
///
/// `level` indexes a descending modulus chain: 0 is a fresh encryption,
/// each rescale or modulus switch moves strictly forward. Along any
/// derivation chain the level never decreases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelState {
    /// Fixed-point exponent baked into the value's representation.
    pub scale: f64,
    /// Position in the modulus chain (0 = top).
    pub level: usize,
    /// Modulus set in use at `level`.
    pub params_id: ParamsId,
}

impl LevelState {
    /// Base-2 logarithm of the scale, the unit used in diagnostics.
    pub fn log2_scale(&self) -> f64 {
        self.scale.log2()
    }
}

/// An engine-managed payload together with its bookkeeping state.
///
/// A `TrackedValue` uniquely owns its payload. Pure coordinator operations
/// leave their sources untouched and return a fresh value; in-place variants
/// mutate the target and document their failure behavior.
#[derive(Debug, Clone)]
pub struct TrackedValue<C> {
    pub(crate) payload: C,
    pub(crate) state: LevelState,
}

impl<C> TrackedValue<C> {
    pub(crate) fn new(payload: C, state: LevelState) -> Self {
        Self { payload, state }
    }

    /// Current scale/level metadata.
    pub fn state(&self) -> &LevelState {
        &self.state
    }

    /// Borrow the engine payload.
    pub fn payload(&self) -> &C {
        &self.payload
    }

    /// Give up the wrapper and return the raw engine payload.
    pub fn into_payload(self) -> C {
        self.payload
    }
}
