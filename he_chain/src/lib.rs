//! Scale and level bookkeeping for leveled homomorphic arithmetic.
//!
//! Every ciphertext in a leveled scheme carries three pieces of metadata: a
//! scale (the fixed-point factor encoded values were multiplied by), a level
//! (how far down the modulus chain it sits), and a parameter-set identity.
//! Binary operations only succeed when operands agree on all three, so the
//! [`Coordinator`] plans and applies the alignment steps (rescale, modulus
//! switch, scale renormalization, relinearization) before and after every
//! delegated engine call. The [`ShadowDriver`] additionally mirrors each
//! operation on exact `f64` vectors so results can be checked end to end.
//!
//! # Wire Format
//!
//! Programs and output reports use a versioned binary format:
//!
//! ```text
//! [MAGIC: 4 bytes][VERSION: 4 bytes big-endian u32][PAYLOAD: msgpack bytes]
//! ```
//!
//! - **MAGIC**: File type identifier ("LHCP" for programs, "LHCO" for outputs)
//! - **VERSION**: Protocol version as big-endian u32 (fixed 4 bytes)
//! - **PAYLOAD**: MessagePack-serialized data
//!
//! # Versioning Policy
//!
//! This implementation uses strict version matching: the deserializer only
//! accepts data with an exact version match. This ensures:
//!
//! - Predictable behavior across producer/runner versions
//! - Early failure on incompatible data rather than silent corruption
//! - Clear upgrade path when protocol changes
//!
//! When protocol changes are needed:
//! 1. Increment the version constant
//! 2. Update serialization/deserialization logic
//! 3. Producers must upgrade to match runner version

mod chain;
mod clear;
mod coordinator;
mod engine;
mod error;
mod policy;
mod program;
mod shadow;
mod state;
mod trace;
mod wire;

pub use chain::{ChainConfig, MAX_PRIME_BITS, ModulusChain, ScalingMode};
pub use clear::{ClearCiphertext, ClearEngine, ClearPlaintext};
pub use coordinator::Coordinator;
pub use engine::{DecryptOracle, HeEngine};
pub use error::{
    ChainError, ConfigError, DeserializeError, EngineError, KeyKind, PeekError, SerializeError,
};
pub use policy::{AlignmentPlan, OpKind, SCALE_REL_TOLERANCE, Step, plan, scales_close};
pub use program::{ChainProgram, OutputReport, ProgramOp, RegisterReport};
pub use shadow::{ShadowDriver, ShadowValue};
pub use state::{LevelState, ParamsId, TrackedValue};
pub use trace::{CollectSink, LogSink, NoopSink, OpTrace, TraceSink};
pub use wire::{
    deserialize_output, deserialize_program, deserialize_program_payload, peek_output_version,
    peek_program_version, serialize_output, serialize_program,
};

/// Current protocol version for programs.
pub const PROGRAM_VERSION: u32 = 1;

/// Current protocol version for output reports.
pub const OUTPUT_VERSION: u32 = 1;

/// Magic bytes identifying program files: "LHCP" in ASCII.
pub const PROGRAM_MAGIC: [u8; 4] = *b"LHCP";

/// Magic bytes identifying output report files: "LHCO" in ASCII.
pub const OUTPUT_MAGIC: [u8; 4] = *b"LHCO";

/// Header size: 4 bytes magic + 4 bytes version.
pub const HEADER_SIZE: usize = 8;
