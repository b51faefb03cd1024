//! Program execution over the clear reference engine.

use anyhow::{Result, anyhow};
use log::info;

use he_chain::{
    ChainProgram, ClearCiphertext, ClearEngine, Coordinator, DecryptOracle, LogSink, OutputReport,
    ProgramOp, RegisterReport, ShadowDriver, ShadowValue,
};

/// Register file: slot 0 is the encrypted input, everything else must be
/// written before it is read.
struct Registers(Vec<Option<ShadowValue<ClearCiphertext>>>);

impl Registers {
    fn get(&self, index: usize) -> Result<&ShadowValue<ClearCiphertext>> {
        self.0
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| anyhow!("register {index} read before it was written"))
    }

    fn take(&mut self, index: usize) -> Result<ShadowValue<ClearCiphertext>> {
        self.0
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| anyhow!("register {index} read before it was written"))
    }

    fn set(&mut self, index: usize, value: ShadowValue<ClearCiphertext>) {
        if index >= self.0.len() {
            self.0.resize_with(index + 1, || None);
        }
        self.0[index] = Some(value);
    }
}

/// Run every instruction of `program` and decrypt the requested outputs.
///
/// With `verify` set, each operation is decrypted and compared against the
/// shadow mirror as it completes; the comparison is reported through the
/// log and never changes the computed result.
pub(crate) fn execute(program: &ChainProgram, verify: bool) -> Result<OutputReport> {
    let chain = program.config.build()?;
    info!(
        "chain ready: depth {}, {} slots, initial scale 2^{:.0}",
        chain.depth(),
        chain.slot_count(),
        program.config.initial_scale.log2()
    );

    let engine = ClearEngine::new(chain.clone())
        .with_relin_key()
        .with_rotation_steps(&program.rotations);
    let oracle = engine.clone();
    let mut coord = Coordinator::new(engine, chain)
        .with_mode(program.config.mode)
        .with_trace(Box::new(LogSink));
    let mut driver = if verify {
        ShadowDriver::with_oracle(&mut coord, &oracle)
    } else {
        ShadowDriver::new(&mut coord)
    };

    let mut registers = Registers(Vec::new());
    registers.set(0, driver.encrypt(&program.input)?);

    for (index, op) in program.ops.iter().enumerate() {
        let result = match *op {
            ProgramOp::Add { lhs, rhs, dst } => {
                let out = driver.add(registers.get(lhs)?, registers.get(rhs)?)?;
                Some((dst, out))
            }
            ProgramOp::Sub { lhs, rhs, dst } => {
                let out = driver.sub(registers.get(lhs)?, registers.get(rhs)?)?;
                Some((dst, out))
            }
            ProgramOp::Multiply { lhs, rhs, dst } => {
                let out = driver.multiply(registers.get(lhs)?, registers.get(rhs)?)?;
                Some((dst, out))
            }
            ProgramOp::AddPlain { src, value, dst } => {
                Some((dst, driver.add_plain(registers.get(src)?, value)?))
            }
            ProgramOp::SubPlain { src, value, dst } => {
                Some((dst, driver.sub_plain(registers.get(src)?, value)?))
            }
            ProgramOp::MultiplyPlain { src, value, dst } => {
                Some((dst, driver.multiply_plain(registers.get(src)?, value)?))
            }
            ProgramOp::Square { src, dst } => {
                Some((dst, driver.square(registers.get(src)?)?))
            }
            ProgramOp::Rotate { src, steps, dst } => {
                Some((dst, driver.rotate(registers.get(src)?, steps)?))
            }
            ProgramOp::Rescale { reg } => {
                let mut value = registers.take(reg)?;
                driver.rescale(&mut value)?;
                registers.set(reg, value);
                None
            }
            ProgramOp::ModSwitchTo { reg, level } => {
                let mut value = registers.take(reg)?;
                driver.mod_switch_to(&mut value, level)?;
                registers.set(reg, value);
                None
            }
        };
        if let Some((dst, value)) = result {
            registers.set(dst, value);
        }
        info!("op {index} done: {op:?}");
    }

    let mut reports = Vec::with_capacity(program.outputs.len());
    for &register in &program.outputs {
        let value = registers.get(register)?;
        let slots = oracle.decrypt_slots(value.inner().payload())?;
        let max_abs_error = slots
            .iter()
            .zip(value.expected())
            .map(|(got, want)| (got - want).abs())
            .fold(0.0f64, f64::max);
        info!("output register {register}: max abs error {max_abs_error:.3e}");
        reports.push(RegisterReport {
            register,
            slots,
            expected: value.expected().to_vec(),
            max_abs_error,
        });
    }
    Ok(OutputReport { reports })
}

#[cfg(test)]
mod tests {
    use super::*;
    use he_chain::{ChainConfig, ScalingMode};

    fn program(ops: Vec<ProgramOp>, outputs: Vec<usize>) -> ChainProgram {
        ChainProgram {
            config: ChainConfig {
                poly_degree: 32,
                modulus_bits: vec![60, 40, 40, 60],
                initial_scale: (2.0f64).powi(40),
                mode: ScalingMode::Automatic,
            },
            input: vec![1.0, 2.0, 3.0],
            rotations: vec![],
            ops,
            outputs,
        }
    }

    #[test]
    fn squares_the_input() {
        let program = program(vec![ProgramOp::Square { src: 0, dst: 1 }], vec![1]);
        let output = execute(&program, true).unwrap();
        assert_eq!(output.reports.len(), 1);
        let report = &output.reports[0];
        assert_eq!(&report.expected[..3], &[1.0, 4.0, 9.0]);
        assert!(report.max_abs_error < 1e-6);
    }

    #[test]
    fn rejects_uninitialized_registers() {
        let program = program(vec![ProgramOp::Add { lhs: 0, rhs: 5, dst: 1 }], vec![1]);
        let err = execute(&program, false).unwrap_err();
        assert!(err.to_string().contains("register 5"));
    }
}
