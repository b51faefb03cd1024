use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;

use he_chain::{deserialize_program_payload, serialize_output};

mod cli;
mod exec;
mod io;

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    let (program_bytes, source, version) = io::read_program(args.program.as_deref())?;
    let program = deserialize_program_payload(&program_bytes, version)
        .map_err(|e| anyhow!("failed to deserialize program from '{source}': {e}"))?;
    info!(
        "loaded program from '{source}': {} ops, {} outputs",
        program.ops.len(),
        program.outputs.len()
    );

    let output = exec::execute(&program, !args.no_verify)?;

    let output_bytes =
        serialize_output(&output).map_err(|e| anyhow!("failed to serialize output: {e}"))?;
    io::write_output(args.output.as_deref(), &output_bytes)?;

    Ok(())
}
