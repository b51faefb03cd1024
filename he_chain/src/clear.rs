//! Reference engine evaluating on clear slot vectors.
//!
//! `ClearEngine` reproduces the bookkeeping of a leveled scheme — scales
//! multiply, rescales drop exact power-of-two primes, modulus switching is
//! forward-only, ciphertext size grows until relinearized — while the
//! payload stays a plain `f64` vector. Encoding and rescaling quantize slots
//! to multiples of `1/scale`, so results carry realistic fixed-point error.
//! Ring noise is not modeled; real cryptographic engines live elsewhere.

use std::collections::BTreeSet;

use crate::chain::ModulusChain;
use crate::engine::{DecryptOracle, HeEngine};
use crate::error::EngineError;
use crate::state::{LevelState, ParamsId};

/// Fresh ciphertexts hold two polynomials; each multiply adds the extra
/// parts of its operands until a relinearization compacts them again.
const FRESH_SIZE: usize = 2;

/// Encoded slot vector with its metadata.
#[derive(Debug, Clone)]
pub struct ClearPlaintext {
    slots: Vec<f64>,
    state: LevelState,
}

/// Simulated ciphertext: slot vector, metadata, and polynomial count.
#[derive(Debug, Clone)]
pub struct ClearCiphertext {
    slots: Vec<f64>,
    state: LevelState,
    size: usize,
}

impl ClearCiphertext {
    /// Polynomial count a real ciphertext of this history would have.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Clear-value implementation of [`HeEngine`] and [`DecryptOracle`].
#[derive(Debug, Clone)]
pub struct ClearEngine {
    chain: ModulusChain,
    relin_key: bool,
    rotation_steps: BTreeSet<i64>,
}

impl ClearEngine {
    /// Engine with no evaluation keys.
    pub fn new(chain: ModulusChain) -> Self {
        Self { chain, relin_key: false, rotation_steps: BTreeSet::new() }
    }

    /// Supply the relinearization key.
    pub fn with_relin_key(mut self) -> Self {
        self.relin_key = true;
        self
    }

    /// Supply rotation keys for the given step counts.
    pub fn with_rotation_steps(mut self, steps: &[i64]) -> Self {
        self.rotation_steps.extend(steps.iter().copied());
        self
    }

    fn quantize(values: &[f64], scale: f64) -> Vec<f64> {
        values.iter().map(|v| (v * scale).round() / scale).collect()
    }

    fn level_of(&self, id: ParamsId) -> Result<usize, EngineError> {
        self.chain
            .level_of(id)
            .ok_or_else(|| EngineError::new("ciphertext parameters are not in this chain"))
    }

    fn check_aligned(&self, lhs: &ClearCiphertext, rhs_state: &LevelState) -> Result<(), EngineError> {
        if lhs.state.params_id != rhs_state.params_id {
            return Err(EngineError::new("operands use different encryption parameters"));
        }
        Ok(())
    }

    fn check_scales(&self, lhs: f64, rhs: f64) -> Result<(), EngineError> {
        if !crate::policy::scales_close(lhs, rhs) {
            return Err(EngineError::new("operands do not have matching scales"));
        }
        Ok(())
    }

    fn zip(
        &self,
        lhs: &ClearCiphertext,
        rhs: &[f64],
        f: impl Fn(f64, f64) -> f64,
    ) -> Vec<f64> {
        lhs.slots.iter().zip(rhs).map(|(&a, &b)| f(a, b)).collect()
    }
}

impl HeEngine for ClearEngine {
    type Ciphertext = ClearCiphertext;
    type Plaintext = ClearPlaintext;

    fn slot_count(&self) -> usize {
        self.chain.slot_count()
    }

    fn encode(
        &self,
        values: &[f64],
        scale: f64,
        params_id: ParamsId,
    ) -> Result<ClearPlaintext, EngineError> {
        if values.len() > self.slot_count() {
            return Err(EngineError::new("more values than slots"));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EngineError::new("encoding scale must be positive"));
        }
        let level = self.level_of(params_id)?;
        let mut slots = Self::quantize(values, scale);
        slots.resize(self.slot_count(), 0.0);
        Ok(ClearPlaintext { slots, state: LevelState { scale, level, params_id } })
    }

    fn encrypt(&self, plain: &ClearPlaintext) -> Result<ClearCiphertext, EngineError> {
        Ok(ClearCiphertext { slots: plain.slots.clone(), state: plain.state, size: FRESH_SIZE })
    }

    fn add(
        &self,
        lhs: &ClearCiphertext,
        rhs: &ClearCiphertext,
    ) -> Result<ClearCiphertext, EngineError> {
        self.check_aligned(lhs, &rhs.state)?;
        self.check_scales(lhs.state.scale, rhs.state.scale)?;
        Ok(ClearCiphertext {
            slots: self.zip(lhs, &rhs.slots, |a, b| a + b),
            state: lhs.state,
            size: lhs.size.max(rhs.size),
        })
    }

    fn sub(
        &self,
        lhs: &ClearCiphertext,
        rhs: &ClearCiphertext,
    ) -> Result<ClearCiphertext, EngineError> {
        self.check_aligned(lhs, &rhs.state)?;
        self.check_scales(lhs.state.scale, rhs.state.scale)?;
        Ok(ClearCiphertext {
            slots: self.zip(lhs, &rhs.slots, |a, b| a - b),
            state: lhs.state,
            size: lhs.size.max(rhs.size),
        })
    }

    fn add_plain(
        &self,
        lhs: &ClearCiphertext,
        rhs: &ClearPlaintext,
    ) -> Result<ClearCiphertext, EngineError> {
        self.check_aligned(lhs, &rhs.state)?;
        self.check_scales(lhs.state.scale, rhs.state.scale)?;
        Ok(ClearCiphertext {
            slots: self.zip(lhs, &rhs.slots, |a, b| a + b),
            state: lhs.state,
            size: lhs.size,
        })
    }

    fn sub_plain(
        &self,
        lhs: &ClearCiphertext,
        rhs: &ClearPlaintext,
    ) -> Result<ClearCiphertext, EngineError> {
        self.check_aligned(lhs, &rhs.state)?;
        self.check_scales(lhs.state.scale, rhs.state.scale)?;
        Ok(ClearCiphertext {
            slots: self.zip(lhs, &rhs.slots, |a, b| a - b),
            state: lhs.state,
            size: lhs.size,
        })
    }

    fn multiply(
        &self,
        lhs: &ClearCiphertext,
        rhs: &ClearCiphertext,
    ) -> Result<ClearCiphertext, EngineError> {
        self.check_aligned(lhs, &rhs.state)?;
        let mut state = lhs.state;
        state.scale = lhs.state.scale * rhs.state.scale;
        Ok(ClearCiphertext {
            slots: self.zip(lhs, &rhs.slots, |a, b| a * b),
            state,
            size: lhs.size + rhs.size - 1,
        })
    }

    fn multiply_plain(
        &self,
        lhs: &ClearCiphertext,
        rhs: &ClearPlaintext,
    ) -> Result<ClearCiphertext, EngineError> {
        self.check_aligned(lhs, &rhs.state)?;
        let mut state = lhs.state;
        state.scale = lhs.state.scale * rhs.state.scale;
        Ok(ClearCiphertext {
            slots: self.zip(lhs, &rhs.slots, |a, b| a * b),
            state,
            size: lhs.size,
        })
    }

    fn square(&self, ct: &ClearCiphertext) -> Result<ClearCiphertext, EngineError> {
        let mut state = ct.state;
        state.scale = ct.state.scale * ct.state.scale;
        Ok(ClearCiphertext {
            slots: ct.slots.iter().map(|&v| v * v).collect(),
            state,
            size: ct.size * 2 - 1,
        })
    }

    fn relinearize(&self, ct: &ClearCiphertext) -> Result<ClearCiphertext, EngineError> {
        if !self.relin_key {
            return Err(EngineError::new("relinearization key not available"));
        }
        let mut out = ct.clone();
        out.size = FRESH_SIZE;
        Ok(out)
    }

    fn rescale_to_next(&self, ct: &ClearCiphertext) -> Result<ClearCiphertext, EngineError> {
        let level = self.level_of(ct.state.params_id)?;
        let drop = self
            .chain
            .drop_size(level)
            .ok_or_else(|| EngineError::new("no modulus left to drop"))?;
        let scale = ct.state.scale / drop;
        let params_id = self
            .chain
            .params_id(level + 1)
            .ok_or_else(|| EngineError::new("no modulus left to drop"))?;
        Ok(ClearCiphertext {
            // Rescaling rounds in the smaller modulus, so re-quantize.
            slots: Self::quantize(&ct.slots, scale),
            state: LevelState { scale, level: level + 1, params_id },
            size: ct.size,
        })
    }

    fn mod_switch_to(
        &self,
        ct: &ClearCiphertext,
        target: ParamsId,
    ) -> Result<ClearCiphertext, EngineError> {
        let current = self.level_of(ct.state.params_id)?;
        let level = self.level_of(target)?;
        if level < current {
            return Err(EngineError::new("modulus switch cannot move up the chain"));
        }
        let mut out = ct.clone();
        out.state.level = level;
        out.state.params_id = target;
        Ok(out)
    }

    fn rotate(&self, ct: &ClearCiphertext, steps: i64) -> Result<ClearCiphertext, EngineError> {
        if !self.supports_rotation(steps) {
            return Err(EngineError::new("rotation key not available for this step"));
        }
        let mut out = ct.clone();
        let len = out.slots.len() as i64;
        out.slots.rotate_left(steps.rem_euclid(len) as usize);
        Ok(out)
    }

    fn set_scale(&self, ct: &mut ClearCiphertext, scale: f64) {
        ct.state.scale = scale;
    }

    fn meta(&self, ct: &ClearCiphertext) -> LevelState {
        ct.state
    }

    fn has_relin_key(&self) -> bool {
        self.relin_key
    }

    fn supports_rotation(&self, steps: i64) -> bool {
        steps == 0 || self.rotation_steps.contains(&steps)
    }
}

impl DecryptOracle<ClearCiphertext> for ClearEngine {
    fn decrypt_slots(&self, ct: &ClearCiphertext) -> Result<Vec<f64>, EngineError> {
        Ok(ct.slots.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainConfig, ScalingMode};

    fn engine() -> ClearEngine {
        let chain = ChainConfig {
            poly_degree: 16,
            modulus_bits: vec![60, 40, 40, 60],
            initial_scale: (2.0f64).powi(40),
            mode: ScalingMode::Automatic,
        }
        .build()
        .unwrap();
        ClearEngine::new(chain).with_relin_key().with_rotation_steps(&[2])
    }

    fn fresh(engine: &ClearEngine, values: &[f64]) -> ClearCiphertext {
        let top = engine.chain.top_state();
        let pt = engine.encode(values, top.scale, top.params_id).unwrap();
        engine.encrypt(&pt).unwrap()
    }

    #[test]
    fn encode_quantizes_to_the_scale_grid() {
        let engine = engine();
        let ct = fresh(&engine, &[0.1, 0.2, 0.3]);
        for (slot, want) in ct.slots.iter().zip([0.1, 0.2, 0.3]) {
            assert!((slot - want).abs() < 1e-10);
            assert_ne!(*slot, want); // 0.1 is not representable on the grid
        }
    }

    #[test]
    fn multiply_grows_size_and_scale() {
        let engine = engine();
        let a = fresh(&engine, &[1.5, 2.0]);
        let b = fresh(&engine, &[2.0, 3.0]);
        let prod = engine.multiply(&a, &b).unwrap();
        assert_eq!(prod.size(), 3);
        assert_eq!(prod.state.scale, (2.0f64).powi(80));
        let relin = engine.relinearize(&prod).unwrap();
        assert_eq!(relin.size(), 2);
        let rescaled = engine.rescale_to_next(&relin).unwrap();
        assert_eq!(rescaled.state.level, 1);
        assert_eq!(rescaled.state.scale, (2.0f64).powi(40));
        assert!((rescaled.slots[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn mod_switch_is_forward_only() {
        let engine = engine();
        let ct = fresh(&engine, &[1.0]);
        let deeper = engine
            .mod_switch_to(&ct, engine.chain.params_id(2).unwrap())
            .unwrap();
        assert_eq!(deeper.state.level, 2);
        let err = engine
            .mod_switch_to(&deeper, engine.chain.params_id(0).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("cannot move up"));
    }

    #[test]
    fn rotation_needs_a_registered_step() {
        let engine = engine();
        let ct = fresh(&engine, &[1.0, 2.0, 3.0, 4.0]);
        let rotated = engine.rotate(&ct, 2).unwrap();
        assert_eq!(&rotated.slots[..3], &[3.0, 4.0, 0.0]);
        assert!(engine.rotate(&ct, 3).is_err());
    }
}
