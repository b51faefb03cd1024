//! Serialization and deserialization for programs and output reports.

use serde::Serialize;

use crate::error::{DeserializeError, PeekError, SerializeError};
use crate::program::{ChainProgram, OutputReport};
use crate::{HEADER_SIZE, OUTPUT_MAGIC, OUTPUT_VERSION, PROGRAM_MAGIC, PROGRAM_VERSION};

/// Peek the version number from program bytes without full deserialization.
///
/// This reads only the header (magic bytes + version) to allow fast-fail
/// for unsupported versions without deserializing the entire payload.
pub fn peek_program_version(bytes: &[u8]) -> Result<u32, PeekError> {
    peek_version(bytes, &PROGRAM_MAGIC)
}

/// Peek the version number from output bytes without full deserialization.
pub fn peek_output_version(bytes: &[u8]) -> Result<u32, PeekError> {
    peek_version(bytes, &OUTPUT_MAGIC)
}

fn peek_version(bytes: &[u8], expected_magic: &[u8; 4]) -> Result<u32, PeekError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PeekError::TooShort);
    }
    if &bytes[0..4] != expected_magic {
        return Err(PeekError::InvalidMagic);
    }
    let version_bytes: [u8; 4] = bytes[4..8]
        .try_into()
        .map_err(|_| PeekError::InvalidVersion)?;
    Ok(u32::from_be_bytes(version_bytes))
}

/// Serialize a program with magic bytes and version header.
pub fn serialize_program(program: &ChainProgram) -> Result<Vec<u8>, SerializeError> {
    serialize_with_header(&PROGRAM_MAGIC, PROGRAM_VERSION, program)
}

/// Serialize an output report with magic bytes and version header.
pub fn serialize_output(output: &OutputReport) -> Result<Vec<u8>, SerializeError> {
    serialize_with_header(&OUTPUT_MAGIC, OUTPUT_VERSION, output)
}

fn serialize_with_header<T: Serialize + ?Sized>(
    magic: &[u8; 4],
    version: u32,
    payload: &T,
) -> Result<Vec<u8>, SerializeError> {
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(magic);
    buf.extend_from_slice(&version.to_be_bytes());
    let payload_bytes = rmp_serde::to_vec(payload).map_err(SerializeError)?;
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Deserialize a program payload, assuming the header was already validated.
///
/// The caller must have validated the header via `peek_program_version` and
/// pass the returned version. This function validates the version matches the
/// expected `PROGRAM_VERSION` and deserializes the msgpack payload.
pub fn deserialize_program_payload(
    bytes: &[u8],
    version: u32,
) -> Result<ChainProgram, DeserializeError> {
    if version != PROGRAM_VERSION {
        return Err(DeserializeError::UnsupportedVersion {
            got: version,
            expected: PROGRAM_VERSION,
        });
    }
    rmp_serde::from_slice(&bytes[HEADER_SIZE..]).map_err(DeserializeError::Payload)
}

/// Deserialize a program, validating magic bytes and version.
pub fn deserialize_program(bytes: &[u8]) -> Result<ChainProgram, DeserializeError> {
    let version = peek_program_version(bytes)?;
    deserialize_program_payload(bytes, version)
}

/// Deserialize an output report, validating magic bytes and version.
pub fn deserialize_output(bytes: &[u8]) -> Result<OutputReport, DeserializeError> {
    let version = peek_output_version(bytes)?;
    if version != OUTPUT_VERSION {
        return Err(DeserializeError::UnsupportedVersion {
            got: version,
            expected: OUTPUT_VERSION,
        });
    }
    rmp_serde::from_slice(&bytes[HEADER_SIZE..]).map_err(DeserializeError::Payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainConfig, ScalingMode};
    use crate::program::ProgramOp;

    fn sample_program() -> ChainProgram {
        ChainProgram {
            config: ChainConfig {
                poly_degree: 32,
                modulus_bits: vec![30, 20, 30],
                initial_scale: (1u64 << 20) as f64,
                mode: ScalingMode::Automatic,
            },
            input: vec![1.0, 2.0, 3.0],
            rotations: vec![1, -1],
            ops: vec![
                ProgramOp::Square { src: 0, dst: 1 },
                ProgramOp::AddPlain { src: 1, value: 0.5, dst: 2 },
            ],
            outputs: vec![2],
        }
    }

    #[test]
    fn program_round_trips() {
        let program = sample_program();
        let bytes = serialize_program(&program).unwrap();

        assert_eq!(&bytes[0..4], &PROGRAM_MAGIC);
        assert_eq!(peek_program_version(&bytes).unwrap(), PROGRAM_VERSION);

        let back = deserialize_program(&bytes).unwrap();
        assert_eq!(back.input, program.input);
        assert_eq!(back.rotations, program.rotations);
        assert_eq!(back.ops.len(), program.ops.len());
        assert_eq!(back.outputs, program.outputs);
        assert_eq!(back.config.poly_degree, program.config.poly_degree);
    }

    #[test]
    fn output_round_trips() {
        let output = OutputReport {
            reports: vec![crate::program::RegisterReport {
                register: 2,
                slots: vec![1.5, 4.5],
                expected: vec![1.5, 4.5],
                max_abs_error: 0.0,
            }],
        };
        let bytes = serialize_output(&output).unwrap();
        assert_eq!(&bytes[0..4], &OUTPUT_MAGIC);

        let back = deserialize_output(&bytes).unwrap();
        assert_eq!(back.reports.len(), 1);
        assert_eq!(back.reports[0].register, 2);
        assert_eq!(back.reports[0].slots, vec![1.5, 4.5]);
    }

    #[test]
    fn peek_rejects_short_data() {
        assert_eq!(peek_program_version(&[0u8; 4]), Err(PeekError::TooShort));
    }

    #[test]
    fn peek_rejects_wrong_magic() {
        let mut bytes = serialize_program(&sample_program()).unwrap();
        bytes[0] = b'X';
        assert_eq!(peek_program_version(&bytes), Err(PeekError::InvalidMagic));
    }

    #[test]
    fn deserialize_rejects_unsupported_version() {
        let mut bytes = serialize_program(&sample_program()).unwrap();
        bytes[4..8].copy_from_slice(&999u32.to_be_bytes());
        match deserialize_program(&bytes) {
            Err(DeserializeError::UnsupportedVersion { got: 999, expected }) => {
                assert_eq!(expected, PROGRAM_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }
}
