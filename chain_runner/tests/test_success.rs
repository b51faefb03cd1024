use std::{fs::read, process::Command};

use he_chain::deserialize_output;


#[test]
fn test_polynomial_program_runs_end_to_end() {
    let setup = setup::setup();

    let output = Command::new(env!("CARGO_BIN_EXE_chain_runner"))
        .arg("--program")
        .arg(&setup.program_path)
        .arg("--output")
        .arg(&setup.output_path)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "runner failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = deserialize_output(&read(&setup.output_path).unwrap()).unwrap();
    assert_eq!(report.reports.len(), 1);
    let result = &report.reports[0];
    assert_eq!(result.register, 6);
    assert!(result.max_abs_error < 1e-4);

    for (slot, x) in result.slots.iter().zip(&setup.xs) {
        let want = std::f64::consts::PI * x * x * x + 0.4 * x + 1.0;
        assert!((slot - want).abs() < 1e-4, "x={x}: got {slot}, want {want}");
    }
}

#[test]
fn test_no_verify_produces_the_same_report() {
    let setup = setup::setup();

    let output = Command::new(env!("CARGO_BIN_EXE_chain_runner"))
        .arg("--program")
        .arg(&setup.program_path)
        .arg("--output")
        .arg(&setup.output_path)
        .arg("--no-verify")
        .output()
        .unwrap();

    assert!(output.status.success());

    let report = deserialize_output(&read(&setup.output_path).unwrap()).unwrap();
    assert_eq!(report.reports.len(), 1);
    assert!(report.reports[0].max_abs_error < 1e-4);
}
