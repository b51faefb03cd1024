//! Orchestration of aligned homomorphic operations.

use crate::chain::{ModulusChain, ScalingMode};
use crate::engine::HeEngine;
use crate::error::{ChainError, KeyKind};
use crate::policy::{self, AlignmentPlan, OpKind, Step, scales_close};
use crate::state::TrackedValue;
use crate::trace::{NoopSink, OpTrace, TraceSink};

/// Drives a chain of homomorphic operations, keeping every value's
/// scale/level metadata consistent so callers never do the bookkeeping
/// themselves.
///
/// Each operation asks the planner for corrective steps, applies them via
/// the engine, runs the numeric operation, applies post-operation
/// maintenance, and records the transition through the configured
/// [`TraceSink`]. On failure, pure operations leave their operands
/// untouched.
pub struct Coordinator<E: HeEngine> {
    engine: E,
    chain: ModulusChain,
    mode: ScalingMode,
    sink: Box<dyn TraceSink>,
}

impl<E: HeEngine> Coordinator<E> {
    /// Coordinator with automatic rescaling and no tracing.
    pub fn new(engine: E, chain: ModulusChain) -> Self {
        Self { engine, chain, mode: ScalingMode::Automatic, sink: Box::new(NoopSink) }
    }

    /// Select automatic or manual rescaling.
    pub fn with_mode(mut self, mode: ScalingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Install a trace sink.
    pub fn with_trace(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The engine this coordinator delegates to.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The chain this coordinator coordinates over.
    pub fn chain(&self) -> &ModulusChain {
        &self.chain
    }

    /// Current rescaling mode.
    pub fn mode(&self) -> ScalingMode {
        self.mode
    }

    /// Encode `values` at the initial scale and encrypt them at the top of
    /// the chain.
    pub fn encrypt(&mut self, values: &[f64]) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        let top = self.chain.top_state();
        let plain = self.engine.encode(values, top.scale, top.params_id)?;
        let ct = self.engine.encrypt(&plain)?;
        let state = self.engine.meta(&ct);
        Ok(TrackedValue::new(ct, state))
    }

    /// Aligned ciphertext addition.
    pub fn add(
        &mut self,
        a: &TrackedValue<E::Ciphertext>,
        b: &TrackedValue<E::Ciphertext>,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.binary(OpKind::Add, a, b)
    }

    /// Aligned ciphertext subtraction.
    pub fn sub(
        &mut self,
        a: &TrackedValue<E::Ciphertext>,
        b: &TrackedValue<E::Ciphertext>,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.binary(OpKind::Sub, a, b)
    }

    /// Ciphertext multiplication with relinearization and, in automatic
    /// mode, an immediate rescale.
    pub fn multiply(
        &mut self,
        a: &TrackedValue<E::Ciphertext>,
        b: &TrackedValue<E::Ciphertext>,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.binary(OpKind::Multiply, a, b)
    }

    /// Add a constant, encoded on demand at the operand's scale and level.
    pub fn add_plain(
        &mut self,
        a: &TrackedValue<E::Ciphertext>,
        constant: f64,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.with_constant(OpKind::AddPlain, a, constant)
    }

    /// Subtract a constant.
    pub fn sub_plain(
        &mut self,
        a: &TrackedValue<E::Ciphertext>,
        constant: f64,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.with_constant(OpKind::SubPlain, a, constant)
    }

    /// Multiply by a constant. No relinearization is needed; automatic mode
    /// still rescales.
    pub fn multiply_plain(
        &mut self,
        a: &TrackedValue<E::Ciphertext>,
        constant: f64,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.with_constant(OpKind::MultiplyPlain, a, constant)
    }

    /// Square, relinearize, and (in automatic mode) rescale.
    pub fn square(
        &mut self,
        a: &TrackedValue<E::Ciphertext>,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.check_keys(OpKind::Square, 0)?;
        let plan = policy::plan(&self.chain, self.mode, a.state(), None, OpKind::Square)?;
        let lhs = self.aligned(a, &plan.pre_a)?;
        let raw = self.engine.square(&lhs)?;
        self.finish(OpKind::Square, vec![*a.state()], raw, &plan)
    }

    /// Cyclic slot rotation; scale and level are unchanged.
    pub fn rotate(
        &mut self,
        a: &TrackedValue<E::Ciphertext>,
        steps: i64,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.check_keys(OpKind::Rotate, steps)?;
        let plan = policy::plan(&self.chain, self.mode, a.state(), None, OpKind::Rotate)?;
        let raw = self.engine.rotate(a.payload(), steps)?;
        self.finish(OpKind::Rotate, vec![*a.state()], raw, &plan)
    }

    /// In-place aligned addition.
    ///
    /// On failure the target may be left in the post-alignment,
    /// pre-operation state: partially applied, reusable only after
    /// inspecting its state.
    pub fn add_inplace(
        &mut self,
        a: &mut TrackedValue<E::Ciphertext>,
        b: &TrackedValue<E::Ciphertext>,
    ) -> Result<(), ChainError> {
        self.binary_inplace(OpKind::Add, a, b)
    }

    /// In-place multiplication. Same failure caveat as [`add_inplace`].
    ///
    /// [`add_inplace`]: Coordinator::add_inplace
    pub fn multiply_inplace(
        &mut self,
        a: &mut TrackedValue<E::Ciphertext>,
        b: &TrackedValue<E::Ciphertext>,
    ) -> Result<(), ChainError> {
        self.binary_inplace(OpKind::Multiply, a, b)
    }

    /// Explicit rescale, for manual mode.
    pub fn rescale(&mut self, a: &mut TrackedValue<E::Ciphertext>) -> Result<(), ChainError> {
        self.maintenance(OpKind::Rescale, a)
    }

    /// Explicit modulus switch down to `target_level`, for manual mode.
    pub fn mod_switch_to(
        &mut self,
        a: &mut TrackedValue<E::Ciphertext>,
        target_level: usize,
    ) -> Result<(), ChainError> {
        self.maintenance(OpKind::ModSwitch(target_level), a)
    }

    pub(crate) fn trace_shadow(&mut self, op: OpKind, max_abs_error: f64) {
        self.sink.on_shadow(op, max_abs_error);
    }

    fn check_keys(&self, op: OpKind, steps: i64) -> Result<(), ChainError> {
        match op {
            OpKind::Multiply | OpKind::Square if !self.engine.has_relin_key() => {
                Err(ChainError::MissingKey { kind: KeyKind::Relinearization })
            }
            OpKind::Rotate if !self.engine.supports_rotation(steps) => {
                Err(ChainError::MissingKey { kind: KeyKind::Rotation(steps) })
            }
            _ => Ok(()),
        }
    }

    fn binary(
        &mut self,
        op: OpKind,
        a: &TrackedValue<E::Ciphertext>,
        b: &TrackedValue<E::Ciphertext>,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.check_keys(op, 0)?;
        let plan = policy::plan(&self.chain, self.mode, a.state(), Some(b.state()), op)?;
        let lhs = self.aligned(a, &plan.pre_a)?;
        let rhs = self.aligned(b, &plan.pre_b)?;
        let raw = match op {
            OpKind::Add => self.engine.add(&lhs, &rhs)?,
            OpKind::Sub => self.engine.sub(&lhs, &rhs)?,
            OpKind::Multiply => self.engine.multiply(&lhs, &rhs)?,
            _ => unreachable!("binary dispatch"),
        };
        self.finish(op, vec![*a.state(), *b.state()], raw, &plan)
    }

    fn binary_inplace(
        &mut self,
        op: OpKind,
        a: &mut TrackedValue<E::Ciphertext>,
        b: &TrackedValue<E::Ciphertext>,
    ) -> Result<(), ChainError> {
        self.check_keys(op, 0)?;
        let plan = policy::plan(&self.chain, self.mode, a.state(), Some(b.state()), op)?;
        let before = vec![*a.state(), *b.state()];
        let outcome = self.try_binary_inplace(op, a, b, &plan);
        // Whatever happened, the state must describe the payload.
        a.state = self.engine.meta(&a.payload);
        outcome?;
        self.sink.on_op(&OpTrace { op, before, after: a.state });
        Ok(())
    }

    fn try_binary_inplace(
        &self,
        op: OpKind,
        a: &mut TrackedValue<E::Ciphertext>,
        b: &TrackedValue<E::Ciphertext>,
        plan: &AlignmentPlan,
    ) -> Result<(), ChainError> {
        self.apply_steps(&mut a.payload, &plan.pre_a)?;
        let rhs = self.aligned(b, &plan.pre_b)?;
        a.payload = match op {
            OpKind::Add => self.engine.add(&a.payload, &rhs)?,
            OpKind::Multiply => self.engine.multiply(&a.payload, &rhs)?,
            _ => unreachable!("in-place dispatch"),
        };
        self.apply_steps(&mut a.payload, &plan.post)
    }

    fn with_constant(
        &mut self,
        op: OpKind,
        a: &TrackedValue<E::Ciphertext>,
        constant: f64,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        let plan = policy::plan(&self.chain, self.mode, a.state(), None, op)?;
        let lhs = self.aligned(a, &plan.pre_a)?;
        let values = vec![constant; self.engine.slot_count()];
        let plain = self.engine.encode(&values, a.state().scale, a.state().params_id)?;
        let raw = match op {
            OpKind::AddPlain => self.engine.add_plain(&lhs, &plain)?,
            OpKind::SubPlain => self.engine.sub_plain(&lhs, &plain)?,
            OpKind::MultiplyPlain => self.engine.multiply_plain(&lhs, &plain)?,
            _ => unreachable!("constant dispatch"),
        };
        self.finish(op, vec![*a.state()], raw, &plan)
    }

    fn maintenance(
        &mut self,
        op: OpKind,
        a: &mut TrackedValue<E::Ciphertext>,
    ) -> Result<(), ChainError> {
        let plan = policy::plan(&self.chain, self.mode, a.state(), None, op)?;
        let before = vec![*a.state()];
        let outcome = self.apply_steps(&mut a.payload, &plan.pre_a);
        a.state = self.engine.meta(&a.payload);
        outcome?;
        debug_assert!(self.consistent(a.state(), &plan));
        self.sink.on_op(&OpTrace { op, before, after: a.state });
        Ok(())
    }

    fn aligned(
        &self,
        value: &TrackedValue<E::Ciphertext>,
        steps: &[Step],
    ) -> Result<E::Ciphertext, ChainError> {
        let mut ct = value.payload().clone();
        self.apply_steps(&mut ct, steps)?;
        Ok(ct)
    }

    fn apply_steps(&self, ct: &mut E::Ciphertext, steps: &[Step]) -> Result<(), ChainError> {
        for step in steps {
            match *step {
                Step::Rescale => *ct = self.engine.rescale_to_next(ct)?,
                Step::ModSwitchTo(id) => *ct = self.engine.mod_switch_to(ct, id)?,
                Step::SetScale(scale) => self.engine.set_scale(ct, scale),
                Step::Relinearize => {
                    if !self.engine.has_relin_key() {
                        return Err(ChainError::MissingKey { kind: KeyKind::Relinearization });
                    }
                    *ct = self.engine.relinearize(ct)?;
                }
            }
        }
        Ok(())
    }

    fn finish(
        &mut self,
        op: OpKind,
        before: Vec<crate::state::LevelState>,
        mut raw: E::Ciphertext,
        plan: &AlignmentPlan,
    ) -> Result<TrackedValue<E::Ciphertext>, ChainError> {
        self.apply_steps(&mut raw, &plan.post)?;
        // Engine metadata is the source of truth; the plan predicted it.
        let state = self.engine.meta(&raw);
        debug_assert!(self.consistent(&state, plan));
        self.sink.on_op(&OpTrace { op, before, after: state });
        Ok(TrackedValue::new(raw, state))
    }

    fn consistent(&self, state: &crate::state::LevelState, plan: &AlignmentPlan) -> bool {
        state.level == plan.result.level
            && state.params_id == plan.result.params_id
            && scales_close(state.scale, plan.result.scale)
    }
}
