//! Modulus chain description, validation, and parameter-set identifiers.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::state::{LevelState, ParamsId};

/// Largest supported prime bit size.
pub const MAX_PRIME_BITS: u32 = 60;

/// Rescaling behavior after multiplications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMode {
    /// Rescale immediately after every multiplication.
    Automatic,
    /// Leave the product scale untouched; the caller rescales explicitly.
    Manual,
}

/// Caller-facing chain construction parameters.
///
/// `modulus_bits` follows the usual coefficient-modulus convention: the
/// first prime is the base, the last is the special prime, and the primes
/// in between are consumed one per rescale, from the tail inward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Polynomial modulus degree; slot count is half of it.
    pub poly_degree: usize,
    /// Bit sizes of the coefficient modulus primes.
    pub modulus_bits: Vec<u32>,
    /// Scale fresh encryptions are encoded at.
    pub initial_scale: f64,
    /// Automatic or manual rescaling.
    pub mode: ScalingMode,
}

impl ChainConfig {
    /// Validate the configuration and derive the modulus chain.
    pub fn build(&self) -> Result<ModulusChain, ConfigError> {
        if self.poly_degree < 8 || !self.poly_degree.is_power_of_two() {
            return Err(ConfigError::BadPolyDegree(self.poly_degree));
        }
        if self.modulus_bits.len() < 2 {
            return Err(ConfigError::ChainTooShort(self.modulus_bits.len()));
        }
        if let Some(&bits) = self
            .modulus_bits
            .iter()
            .find(|&&bits| bits == 0 || bits > MAX_PRIME_BITS)
        {
            return Err(ConfigError::BadPrimeBits(bits));
        }
        if !self.initial_scale.is_finite() || self.initial_scale <= 0.0 {
            return Err(ConfigError::BadScale(self.initial_scale));
        }

        let depth = self.modulus_bits.len() - 2;
        let ids = (0..=depth)
            .map(|level| derive_params_id(self.poly_degree, &self.modulus_bits, level))
            .collect();
        Ok(ModulusChain {
            poly_degree: self.poly_degree,
            modulus_bits: self.modulus_bits.clone(),
            initial_scale: self.initial_scale,
            ids,
        })
    }
}

fn derive_params_id(poly_degree: usize, modulus_bits: &[u32], level: usize) -> ParamsId {
    let mut hasher = DefaultHasher::new();
    poly_degree.hash(&mut hasher);
    modulus_bits.hash(&mut hasher);
    level.hash(&mut hasher);
    ParamsId(hasher.finish())
}

/// A validated descending modulus chain.
///
/// Levels run from 0 (fresh, all primes present) to `depth()` (only the
/// base and special primes left, no further rescale possible).
#[derive(Debug, Clone)]
pub struct ModulusChain {
    poly_degree: usize,
    modulus_bits: Vec<u32>,
    initial_scale: f64,
    ids: Vec<ParamsId>,
}

impl ModulusChain {
    /// Number of rescale steps available from a fresh encryption.
    pub fn depth(&self) -> usize {
        self.modulus_bits.len() - 2
    }

    /// Slots per encoded value.
    pub fn slot_count(&self) -> usize {
        self.poly_degree / 2
    }

    /// Polynomial modulus degree.
    pub fn poly_degree(&self) -> usize {
        self.poly_degree
    }

    /// Scale fresh encryptions carry.
    pub fn initial_scale(&self) -> f64 {
        self.initial_scale
    }

    /// Parameter-set identifier for `level`, if it exists in this chain.
    pub fn params_id(&self, level: usize) -> Option<ParamsId> {
        self.ids.get(level).copied()
    }

    /// Level a parameter-set identifier belongs to in this chain.
    pub fn level_of(&self, id: ParamsId) -> Option<usize> {
        self.ids.iter().position(|&known| known == id)
    }

    /// Bit size of the prime a rescale taken at `level` drops.
    ///
    /// `None` once the chain is exhausted (`level == depth()`).
    pub fn drop_bits(&self, level: usize) -> Option<u32> {
        if level < self.depth() {
            Some(self.modulus_bits[self.modulus_bits.len() - 2 - level])
        } else {
            None
        }
    }

    /// Size of the prime dropped by a rescale at `level`, as a float.
    pub fn drop_size(&self, level: usize) -> Option<f64> {
        self.drop_bits(level).map(|bits| f64::from(bits).exp2())
    }

    /// Metadata of a fresh encryption.
    pub fn top_state(&self) -> LevelState {
        LevelState {
            scale: self.initial_scale,
            level: 0,
            params_id: self.ids[0],
        }
    }
}
