//! Shadow verification: replay every operation on an exact clear vector.
//!
//! A [`ShadowValue`] pairs a tracked ciphertext with the mathematically
//! exact slot values it should decrypt to. The [`ShadowDriver`] fans each
//! operation out to the coordinator and to plain `f64` arithmetic; when a
//! [`DecryptOracle`] is supplied, it also measures the decrypted-vs-expected
//! delta and reports it through the coordinator's trace sink. The delta is
//! a diagnostic and never influences bookkeeping.

use crate::coordinator::Coordinator;
use crate::engine::{DecryptOracle, HeEngine};
use crate::error::ChainError;
use crate::policy::OpKind;
use crate::state::{LevelState, TrackedValue};

/// A tracked ciphertext plus its noiseless expected slot values.
#[derive(Debug, Clone)]
pub struct ShadowValue<C> {
    inner: TrackedValue<C>,
    expected: Vec<f64>,
}

impl<C> ShadowValue<C> {
    /// Scale/level metadata of the encrypted side.
    pub fn state(&self) -> &LevelState {
        self.inner.state()
    }

    /// The exact values this ciphertext should decrypt to.
    pub fn expected(&self) -> &[f64] {
        &self.expected
    }

    /// The encrypted side.
    pub fn inner(&self) -> &TrackedValue<C> {
        &self.inner
    }

    /// Drop the shadow and keep the encrypted side.
    pub fn into_inner(self) -> TrackedValue<C> {
        self.inner
    }
}

/// Mirrors coordinator operations onto shadow values.
///
/// Constructed per computation chain; holds no secret material itself. The
/// optional oracle is the only path to plaintext and is borrowed, not
/// stored beyond the driver's lifetime.
pub struct ShadowDriver<'a, E: HeEngine> {
    coord: &'a mut Coordinator<E>,
    oracle: Option<&'a dyn DecryptOracle<E::Ciphertext>>,
}

impl<'a, E: HeEngine> ShadowDriver<'a, E> {
    /// Driver that mirrors operations without decrypt diagnostics.
    pub fn new(coord: &'a mut Coordinator<E>) -> Self {
        Self { coord, oracle: None }
    }

    /// Driver that additionally decrypts after each operation and reports
    /// the maximum elementwise absolute error.
    pub fn with_oracle(
        coord: &'a mut Coordinator<E>,
        oracle: &'a dyn DecryptOracle<E::Ciphertext>,
    ) -> Self {
        Self { coord, oracle: Some(oracle) }
    }

    /// The coordinator driven by this shadow session.
    pub fn coordinator(&mut self) -> &mut Coordinator<E> {
        self.coord
    }

    /// Encrypt `values` and start shadowing them.
    pub fn encrypt(&mut self, values: &[f64]) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.encrypt(values)?;
        let mut expected = values.to_vec();
        expected.resize(self.coord.engine().slot_count(), 0.0);
        Ok(ShadowValue { inner, expected })
    }

    /// Mirrored addition.
    pub fn add(
        &mut self,
        a: &ShadowValue<E::Ciphertext>,
        b: &ShadowValue<E::Ciphertext>,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.add(&a.inner, &b.inner)?;
        let expected = zip(&a.expected, &b.expected, |x, y| x + y);
        self.finish(OpKind::Add, inner, expected)
    }

    /// Mirrored subtraction.
    pub fn sub(
        &mut self,
        a: &ShadowValue<E::Ciphertext>,
        b: &ShadowValue<E::Ciphertext>,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.sub(&a.inner, &b.inner)?;
        let expected = zip(&a.expected, &b.expected, |x, y| x - y);
        self.finish(OpKind::Sub, inner, expected)
    }

    /// Mirrored multiplication.
    pub fn multiply(
        &mut self,
        a: &ShadowValue<E::Ciphertext>,
        b: &ShadowValue<E::Ciphertext>,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.multiply(&a.inner, &b.inner)?;
        let expected = zip(&a.expected, &b.expected, |x, y| x * y);
        self.finish(OpKind::Multiply, inner, expected)
    }

    /// Mirrored constant addition.
    pub fn add_plain(
        &mut self,
        a: &ShadowValue<E::Ciphertext>,
        constant: f64,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.add_plain(&a.inner, constant)?;
        let expected = a.expected.iter().map(|x| x + constant).collect();
        self.finish(OpKind::AddPlain, inner, expected)
    }

    /// Mirrored constant subtraction.
    pub fn sub_plain(
        &mut self,
        a: &ShadowValue<E::Ciphertext>,
        constant: f64,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.sub_plain(&a.inner, constant)?;
        let expected = a.expected.iter().map(|x| x - constant).collect();
        self.finish(OpKind::SubPlain, inner, expected)
    }

    /// Mirrored constant multiplication.
    pub fn multiply_plain(
        &mut self,
        a: &ShadowValue<E::Ciphertext>,
        constant: f64,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.multiply_plain(&a.inner, constant)?;
        let expected = a.expected.iter().map(|x| x * constant).collect();
        self.finish(OpKind::MultiplyPlain, inner, expected)
    }

    /// Mirrored squaring.
    pub fn square(
        &mut self,
        a: &ShadowValue<E::Ciphertext>,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.square(&a.inner)?;
        let expected = a.expected.iter().map(|x| x * x).collect();
        self.finish(OpKind::Square, inner, expected)
    }

    /// Mirrored rotation: an exact cyclic permutation on the shadow side.
    pub fn rotate(
        &mut self,
        a: &ShadowValue<E::Ciphertext>,
        steps: i64,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let inner = self.coord.rotate(&a.inner, steps)?;
        let mut expected = a.expected.clone();
        let len = expected.len() as i64;
        expected.rotate_left(steps.rem_euclid(len) as usize);
        self.finish(OpKind::Rotate, inner, expected)
    }

    /// Mirrored explicit rescale. The expected values are untouched:
    /// rescaling changes representation, not meaning.
    pub fn rescale(&mut self, a: &mut ShadowValue<E::Ciphertext>) -> Result<(), ChainError> {
        self.coord.rescale(&mut a.inner)?;
        self.observe(OpKind::Rescale, a)
    }

    /// Mirrored explicit modulus switch.
    pub fn mod_switch_to(
        &mut self,
        a: &mut ShadowValue<E::Ciphertext>,
        target_level: usize,
    ) -> Result<(), ChainError> {
        self.coord.mod_switch_to(&mut a.inner, target_level)?;
        self.observe(OpKind::ModSwitch(target_level), a)
    }

    fn finish(
        &mut self,
        op: OpKind,
        inner: TrackedValue<E::Ciphertext>,
        expected: Vec<f64>,
    ) -> Result<ShadowValue<E::Ciphertext>, ChainError> {
        let value = ShadowValue { inner, expected };
        self.observe(op, &value)?;
        Ok(value)
    }

    fn observe(&mut self, op: OpKind, value: &ShadowValue<E::Ciphertext>) -> Result<(), ChainError> {
        let Some(oracle) = self.oracle else {
            return Ok(());
        };
        let decrypted = oracle.decrypt_slots(value.inner.payload())?;
        let max_abs_error = decrypted
            .iter()
            .zip(&value.expected)
            .map(|(got, want)| (got - want).abs())
            .fold(0.0f64, f64::max);
        self.coord.trace_shadow(op, max_abs_error);
        Ok(())
    }
}

fn zip(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
}
