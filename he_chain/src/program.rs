//! Serializable description of a leveled computation and its result report.
//!
//! A [`ChainProgram`] carries everything a runner needs: the chain
//! configuration, one encrypted input vector, the rotation steps keys must
//! exist for, a straight-line register program, and which registers to
//! report. The runner answers with an [`OutputReport`].

use serde::{Deserialize, Serialize};

use crate::chain::ChainConfig;

/// One straight-line instruction over numbered registers.
///
/// Register 0 holds the encrypted input; every other register must be
/// written before it is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProgramOp {
    /// `dst = lhs + rhs`
    Add { lhs: usize, rhs: usize, dst: usize },
    /// `dst = lhs - rhs`
    Sub { lhs: usize, rhs: usize, dst: usize },
    /// `dst = lhs * rhs`
    Multiply { lhs: usize, rhs: usize, dst: usize },
    /// `dst = src + value` broadcast over all slots
    AddPlain { src: usize, value: f64, dst: usize },
    /// `dst = src - value`
    SubPlain { src: usize, value: f64, dst: usize },
    /// `dst = src * value`
    MultiplyPlain { src: usize, value: f64, dst: usize },
    /// `dst = src * src`
    Square { src: usize, dst: usize },
    /// `dst = src` rotated cyclically by `steps` (positive = left)
    Rotate { src: usize, steps: i64, dst: usize },
    /// Explicitly rescale `reg` in place (manual scaling mode).
    Rescale { reg: usize },
    /// Explicitly switch `reg` to chain level `level` in place.
    ModSwitchTo { reg: usize, level: usize },
}

/// A complete leveled computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainProgram {
    /// Encryption context to build.
    pub config: ChainConfig,
    /// Slot values encrypted into register 0 before the first op.
    pub input: Vec<f64>,
    /// Rotation steps to generate keys for.
    pub rotations: Vec<i64>,
    /// Instructions, executed in order.
    pub ops: Vec<ProgramOp>,
    /// Registers decrypted and reported after the last op.
    pub outputs: Vec<usize>,
}

/// Decrypted result of one output register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterReport {
    /// Register index this report covers.
    pub register: usize,
    /// Decrypted slot values.
    pub slots: Vec<f64>,
    /// Exact values the shadow computed.
    pub expected: Vec<f64>,
    /// Largest elementwise difference between the two.
    pub max_abs_error: f64,
}

/// Everything a runner reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputReport {
    /// One report per requested output register, in request order.
    pub reports: Vec<RegisterReport>,
}
