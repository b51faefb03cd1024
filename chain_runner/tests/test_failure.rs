use std::{fs::write, process::Command};

use he_chain::{ProgramOp, serialize_program};


#[test]
fn test_program_file_not_present() {
    let setup = setup::setup();
    let not_present_program = setup.test_dir.path().join("no.such.program");

    let output = Command::new(env!("CARGO_BIN_EXE_chain_runner"))
        .arg("--program")
        .arg(&not_present_program)
        .arg("--output")
        .arg(&setup.output_path)
        .output()
        .unwrap();

    assert!(!output.status.success());

    let err_msg = String::from_utf8_lossy(&output.stderr);
    assert!(
        err_msg.contains("failed to open program file")
            && err_msg.contains(not_present_program.to_str().unwrap())
    );
}

#[test]
fn test_program_file_not_valid() {
    let setup = setup::setup();
    write(&setup.program_path, "NOT_A_VALID_PROGRAM_FILE").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_chain_runner"))
        .arg("--program")
        .arg(&setup.program_path)
        .arg("--output")
        .arg(&setup.output_path)
        .output()
        .unwrap();

    assert!(!output.status.success());

    let err_msg = String::from_utf8_lossy(&output.stderr);
    assert!(
        err_msg.contains("invalid program header in")
            && err_msg.contains(setup.program_path.to_str().unwrap())
    );
}

#[test]
fn test_program_file_truncated() {
    let setup = setup::setup();
    write(&setup.program_path, b"LHCP").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_chain_runner"))
        .arg("--program")
        .arg(&setup.program_path)
        .arg("--output")
        .arg(&setup.output_path)
        .output()
        .unwrap();

    assert!(!output.status.success());

    let err_msg = String::from_utf8_lossy(&output.stderr);
    assert!(err_msg.contains("failed to read header from program file"));
}

#[test]
fn test_program_version_mismatch() {
    let setup = setup::setup();

    let mut bytes = serialize_program(&setup.program).unwrap();
    bytes[4..8].copy_from_slice(&999u32.to_be_bytes());
    write(&setup.program_path, &bytes).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_chain_runner"))
        .arg("--program")
        .arg(&setup.program_path)
        .arg("--output")
        .arg(&setup.output_path)
        .output()
        .unwrap();

    assert!(!output.status.success());

    let err_msg = String::from_utf8_lossy(&output.stderr);
    assert!(
        err_msg.contains("unsupported version 999"),
        "Expected version mismatch error, got: {err_msg}"
    );
}

#[test]
fn test_program_exceeding_chain_depth() {
    let setup = setup::setup();

    // Three squarings need three rescales; the depth-2 chain has two.
    let mut program = setup.program.clone();
    program.ops = vec![
        ProgramOp::Square { src: 0, dst: 1 },
        ProgramOp::Square { src: 1, dst: 2 },
        ProgramOp::Square { src: 2, dst: 3 },
    ];
    program.outputs = vec![3];
    write(&setup.program_path, serialize_program(&program).unwrap()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_chain_runner"))
        .arg("--program")
        .arg(&setup.program_path)
        .arg("--output")
        .arg(&setup.output_path)
        .output()
        .unwrap();

    assert!(!output.status.success());

    let err_msg = String::from_utf8_lossy(&output.stderr);
    assert!(
        err_msg.contains("modulus chain exhausted"),
        "Expected chain exhaustion error, got: {err_msg}"
    );
}

#[test]
fn test_program_reading_unwritten_register() {
    let setup = setup::setup();

    let mut program = setup.program.clone();
    program.ops = vec![ProgramOp::Add { lhs: 0, rhs: 9, dst: 1 }];
    program.outputs = vec![1];
    write(&setup.program_path, serialize_program(&program).unwrap()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_chain_runner"))
        .arg("--program")
        .arg(&setup.program_path)
        .arg("--output")
        .arg(&setup.output_path)
        .output()
        .unwrap();

    assert!(!output.status.success());

    let err_msg = String::from_utf8_lossy(&output.stderr);
    assert!(err_msg.contains("register 9 read before it was written"));
}
