//! Pure alignment planning over scale/level metadata.
//!
//! The planner never touches an engine: it maps the metadata of one or two
//! operands to the corrective steps that make the requested operation legal,
//! plus the state the result must end in. This keeps the bookkeeping rules
//! unit-testable with no cryptographic backend present.

use crate::chain::{ModulusChain, ScalingMode};
use crate::error::ChainError;
use crate::state::{LevelState, ParamsId};

/// Relative tolerance under which two scales count as the same exponent.
///
/// Independently rescaled branches end up at nearly-but-not-exactly equal
/// scales; anything inside this bound is renormalized, anything outside is a
/// hard [`ChainError::ScaleMismatch`]. Widening this bound silently is not
/// safe; the test suite pins it.
pub const SCALE_REL_TOLERANCE: f64 = 9.5367431640625e-7; // 2^-20

/// Operation kinds the planner distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Ciphertext + ciphertext.
    Add,
    /// Ciphertext - ciphertext.
    Sub,
    /// Ciphertext + encoded constant.
    AddPlain,
    /// Ciphertext - encoded constant.
    SubPlain,
    /// Ciphertext * ciphertext.
    Multiply,
    /// Ciphertext * encoded constant.
    MultiplyPlain,
    /// Ciphertext squared.
    Square,
    /// Cyclic slot rotation.
    Rotate,
    /// Explicit rescale (manual mode maintenance).
    Rescale,
    /// Explicit modulus switch to a deeper level.
    ModSwitch(usize),
}

/// One corrective step the coordinator delegates to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Drop one chain level, dividing the scale by the dropped prime.
    Rescale,
    /// Switch to the given parameter set without changing magnitude.
    ModSwitchTo(ParamsId),
    /// Force the bookkept scale to a canonical value. Only ever emitted when
    /// the actual scale is within [`SCALE_REL_TOLERANCE`] of the target.
    SetScale(f64),
    /// Restore the compact ciphertext representation after a multiply.
    Relinearize,
}

/// Corrective steps around an operation, and the state its result must have.
///
/// `pre_a`/`pre_b` are applied to the operands before the numeric operation,
/// `post` to its raw result. Applying a plan always leaves the operands at a
/// matching `params_id` and scale.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentPlan {
    /// Steps for the left (or only) operand.
    pub pre_a: Vec<Step>,
    /// Steps for the right operand.
    pub pre_b: Vec<Step>,
    /// Maintenance applied to the raw result.
    pub post: Vec<Step>,
    /// State the result ends in once the plan has run.
    pub result: LevelState,
}

impl AlignmentPlan {
    fn passthrough(state: LevelState) -> Self {
        Self {
            pre_a: Vec::new(),
            pre_b: Vec::new(),
            post: Vec::new(),
            result: state,
        }
    }
}

/// Whether two scales agree within [`SCALE_REL_TOLERANCE`].
pub fn scales_close(a: f64, b: f64) -> bool {
    let reference = a.abs().max(b.abs());
    reference > 0.0 && (a - b).abs() <= reference * SCALE_REL_TOLERANCE
}

/// Compute the alignment plan for `op` over operands `a` and (optionally) `b`.
///
/// `b` is `None` for unary operations and for operations against a plaintext
/// constant, which is encoded on demand at `a`'s current scale and level.
pub fn plan(
    chain: &ModulusChain,
    mode: ScalingMode,
    a: &LevelState,
    b: Option<&LevelState>,
    op: OpKind,
) -> Result<AlignmentPlan, ChainError> {
    let level_a = chain.level_of(a.params_id).ok_or(ChainError::ForeignValue)?;
    let level_b = match b {
        Some(b) => Some(chain.level_of(b.params_id).ok_or(ChainError::ForeignValue)?),
        None => None,
    };

    match op {
        OpKind::Add | OpKind::Sub | OpKind::AddPlain | OpKind::SubPlain => match b {
            Some(b) => plan_additive(chain, a, level_a, b, level_b.unwrap_or(level_a)),
            // The constant is encoded at `a`'s scale and parameters, so the
            // operands are aligned by construction.
            None => Ok(AlignmentPlan::passthrough(*a)),
        },
        OpKind::Multiply | OpKind::Square | OpKind::MultiplyPlain => {
            plan_multiplicative(chain, mode, a, level_a, b, level_b, op)
        }
        OpKind::Rotate => Ok(AlignmentPlan::passthrough(*a)),
        OpKind::Rescale => plan_rescale(chain, a, level_a),
        OpKind::ModSwitch(target) => plan_mod_switch(chain, a, level_a, target),
    }
}

fn plan_additive(
    chain: &ModulusChain,
    a: &LevelState,
    level_a: usize,
    b: &LevelState,
    level_b: usize,
) -> Result<AlignmentPlan, ChainError> {
    let target = level_a.max(level_b);
    // Levels are validated by `level_of`, so the target id always exists.
    let target_id = chain
        .params_id(target)
        .ok_or(ChainError::ExhaustedChain { level: target, depth: chain.depth() })?;

    let mut pre_a = Vec::new();
    let mut pre_b = Vec::new();
    if level_a < target {
        pre_a.push(Step::ModSwitchTo(target_id));
    }
    if level_b < target {
        pre_b.push(Step::ModSwitchTo(target_id));
    }

    let scale = if scales_close(a.scale, b.scale) {
        a.scale
    } else {
        // Independently rescaled branches: both scales must sit next to the
        // same power of two, which becomes the canonical target.
        let exp_a = a.scale.log2().round();
        let exp_b = b.scale.log2().round();
        let canonical = exp_a.exp2();
        if exp_a != exp_b
            || !scales_close(a.scale, canonical)
            || !scales_close(b.scale, canonical)
        {
            return Err(ChainError::ScaleMismatch { lhs: a.scale, rhs: b.scale });
        }
        if a.scale != canonical {
            pre_a.push(Step::SetScale(canonical));
        }
        if b.scale != canonical {
            pre_b.push(Step::SetScale(canonical));
        }
        canonical
    };

    Ok(AlignmentPlan {
        pre_a,
        pre_b,
        post: Vec::new(),
        result: LevelState { scale, level: target, params_id: target_id },
    })
}

fn plan_multiplicative(
    chain: &ModulusChain,
    mode: ScalingMode,
    a: &LevelState,
    level_a: usize,
    b: Option<&LevelState>,
    level_b: Option<usize>,
    op: OpKind,
) -> Result<AlignmentPlan, ChainError> {
    let depth = chain.depth();
    let target = level_a.max(level_b.unwrap_or(level_a));
    if target == depth {
        // No prime left for the rescale this multiplication requires.
        return Err(ChainError::ExhaustedChain { level: target, depth });
    }
    let target_id = chain
        .params_id(target)
        .ok_or(ChainError::ExhaustedChain { level: target, depth })?;

    let mut pre_a = Vec::new();
    let mut pre_b = Vec::new();
    if level_a < target {
        pre_a.push(Step::ModSwitchTo(target_id));
    }
    if level_b.is_some_and(|level| level < target) {
        pre_b.push(Step::ModSwitchTo(target_id));
    }

    // The scheme multiplies scales; the square and plain variants square
    // against `a`'s own scale because the constant is encoded at it.
    let other_scale = b.map_or(a.scale, |b| b.scale);
    let mut scale = a.scale * other_scale;
    let mut level = target;

    let mut post = Vec::new();
    if matches!(op, OpKind::Multiply | OpKind::Square) {
        post.push(Step::Relinearize);
    }
    if mode == ScalingMode::Automatic {
        post.push(Step::Rescale);
        // `target < depth` was checked above, so a prime is available.
        scale /= chain
            .drop_size(target)
            .ok_or(ChainError::ExhaustedChain { level: target, depth })?;
        level += 1;
    }

    let params_id = chain
        .params_id(level)
        .ok_or(ChainError::ExhaustedChain { level, depth })?;
    Ok(AlignmentPlan {
        pre_a,
        pre_b,
        post,
        result: LevelState { scale, level, params_id },
    })
}

fn plan_rescale(
    chain: &ModulusChain,
    a: &LevelState,
    level: usize,
) -> Result<AlignmentPlan, ChainError> {
    let drop = chain
        .drop_size(level)
        .ok_or(ChainError::ExhaustedChain { level, depth: chain.depth() })?;
    let params_id = chain
        .params_id(level + 1)
        .ok_or(ChainError::ExhaustedChain { level, depth: chain.depth() })?;
    Ok(AlignmentPlan {
        pre_a: vec![Step::Rescale],
        pre_b: Vec::new(),
        post: Vec::new(),
        result: LevelState { scale: a.scale / drop, level: level + 1, params_id },
    })
}

fn plan_mod_switch(
    chain: &ModulusChain,
    a: &LevelState,
    level: usize,
    target: usize,
) -> Result<AlignmentPlan, ChainError> {
    // Modulus switching only moves forward along the chain.
    if target < level || target > chain.depth() {
        return Err(ChainError::ExhaustedChain { level: target, depth: chain.depth() });
    }
    let params_id = chain
        .params_id(target)
        .ok_or(ChainError::ExhaustedChain { level: target, depth: chain.depth() })?;
    let pre_a = if target == level {
        Vec::new()
    } else {
        vec![Step::ModSwitchTo(params_id)]
    };
    Ok(AlignmentPlan {
        pre_a,
        pre_b: Vec::new(),
        post: Vec::new(),
        result: LevelState { scale: a.scale, level: target, params_id },
    })
}
