//! Observational reporting of chain transitions.
//!
//! A [`TraceSink`] is a capability the caller supplies; the coordinator and
//! the shadow wrapper never hard-code an output destination, and nothing a
//! sink observes may feed back into bookkeeping decisions.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;

use crate::policy::OpKind;
use crate::state::LevelState;

/// Before/after snapshot of one coordinator operation.
#[derive(Debug, Clone)]
pub struct OpTrace {
    /// Operation that ran.
    pub op: OpKind,
    /// Operand states before alignment.
    pub before: Vec<LevelState>,
    /// State of the result.
    pub after: LevelState,
}

/// Hook invoked after each operation.
pub trait TraceSink {
    /// A coordinator operation completed.
    fn on_op(&mut self, trace: &OpTrace);

    /// Shadow verification measured the decrypted-vs-expected delta for an
    /// operation. Diagnostics only; default implementation drops it.
    fn on_shadow(&mut self, op: OpKind, max_abs_error: f64) {
        let _ = (op, max_abs_error);
    }
}

/// Sink that ignores everything.
#[derive(Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn on_op(&mut self, _trace: &OpTrace) {}
}

/// Sink routing transitions through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn on_op(&mut self, trace: &OpTrace) {
        let from = trace
            .before
            .first()
            .map_or_else(|| "-".to_string(), |s| format!("{}/2^{:.2}", s.level, s.log2_scale()));
        info!(
            "{:?} moves level/scale {} -> {}/2^{:.2}",
            trace.op,
            from,
            trace.after.level,
            trace.after.log2_scale()
        );
    }

    fn on_shadow(&mut self, op: OpKind, max_abs_error: f64) {
        info!("{op:?} decrypted vs expected max abs error {max_abs_error:.3e}");
    }
}

/// Sink collecting every event, for test assertions.
#[derive(Debug, Default)]
pub struct CollectSink {
    /// Every completed operation, in order.
    pub ops: Vec<OpTrace>,
    /// Every shadow measurement, in order.
    pub shadow: Vec<(OpKind, f64)>,
}

impl TraceSink for CollectSink {
    fn on_op(&mut self, trace: &OpTrace) {
        self.ops.push(trace.clone());
    }

    fn on_shadow(&mut self, op: OpKind, max_abs_error: f64) {
        self.shadow.push((op, max_abs_error));
    }
}

// Shared sinks let a caller keep reading a sink it handed to a coordinator.
impl<T: TraceSink> TraceSink for Rc<RefCell<T>> {
    fn on_op(&mut self, trace: &OpTrace) {
        self.borrow_mut().on_op(trace);
    }

    fn on_shadow(&mut self, op: OpKind, max_abs_error: f64) {
        self.borrow_mut().on_shadow(op, max_abs_error);
    }
}
