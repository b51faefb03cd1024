//! Capability surface of the external cryptographic engine.
//!
//! The coordinator only ever talks to the engine through [`HeEngine`]; the
//! engine's metadata is the source of truth for every tracked value's
//! [`LevelState`]. Decryption is deliberately a separate capability
//! ([`DecryptOracle`]) so production chains can be built without any
//! secret-key material in reach.

use crate::error::EngineError;
use crate::state::{LevelState, ParamsId};

/// Homomorphic operations the coordinator delegates to.
pub trait HeEngine {
    /// Engine-managed encrypted value.
    type Ciphertext: Clone;
    /// Engine-managed encoded value.
    type Plaintext: Clone;

    /// Slots packed into a single encoded value.
    fn slot_count(&self) -> usize;

    /// Encode a slot vector at the given scale under the given parameter set.
    fn encode(
        &self,
        values: &[f64],
        scale: f64,
        params_id: ParamsId,
    ) -> Result<Self::Plaintext, EngineError>;

    /// Encrypt an encoded value.
    fn encrypt(&self, plain: &Self::Plaintext) -> Result<Self::Ciphertext, EngineError>;

    /// Elementwise sum of two ciphertexts at matching parameters and scale.
    fn add(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, EngineError>;

    /// Elementwise difference of two ciphertexts.
    fn sub(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, EngineError>;

    /// Ciphertext plus encoded constant.
    fn add_plain(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Plaintext,
    ) -> Result<Self::Ciphertext, EngineError>;

    /// Ciphertext minus encoded constant.
    fn sub_plain(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Plaintext,
    ) -> Result<Self::Ciphertext, EngineError>;

    /// Elementwise product; scales multiply, ciphertext size grows.
    fn multiply(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, EngineError>;

    /// Ciphertext times encoded constant; size does not grow.
    fn multiply_plain(
        &self,
        lhs: &Self::Ciphertext,
        rhs: &Self::Plaintext,
    ) -> Result<Self::Ciphertext, EngineError>;

    /// Elementwise square.
    fn square(&self, ct: &Self::Ciphertext) -> Result<Self::Ciphertext, EngineError>;

    /// Restore the compact two-polynomial representation.
    fn relinearize(&self, ct: &Self::Ciphertext) -> Result<Self::Ciphertext, EngineError>;

    /// Drop one chain level, dividing the scale by the dropped prime.
    fn rescale_to_next(&self, ct: &Self::Ciphertext) -> Result<Self::Ciphertext, EngineError>;

    /// Switch to a deeper parameter set without changing magnitude.
    fn mod_switch_to(
        &self,
        ct: &Self::Ciphertext,
        target: ParamsId,
    ) -> Result<Self::Ciphertext, EngineError>;

    /// Cyclically rotate slots: positive steps left, negative right.
    fn rotate(&self, ct: &Self::Ciphertext, steps: i64) -> Result<Self::Ciphertext, EngineError>;

    /// Assign the bookkept scale directly. Callers guarantee the new value is
    /// within tolerance of the actual scale.
    fn set_scale(&self, ct: &mut Self::Ciphertext, scale: f64);

    /// Metadata the engine attaches to a ciphertext.
    fn meta(&self, ct: &Self::Ciphertext) -> LevelState;

    /// Whether a relinearization key was supplied at setup.
    fn has_relin_key(&self) -> bool;

    /// Whether a rotation key for `steps` was supplied at setup.
    fn supports_rotation(&self, steps: i64) -> bool;
}

/// Secret-key capability: decrypt and decode back to slot values.
///
/// Kept separate from [`HeEngine`] so the coordinator and shadow wrapper can
/// be constructed with no way to reach plaintext data; callers pass an oracle
/// explicitly and only where diagnostics need it.
pub trait DecryptOracle<C> {
    /// Decrypt a ciphertext and decode it to its slot vector.
    fn decrypt_slots(&self, ct: &C) -> Result<Vec<f64>, EngineError>;
}
