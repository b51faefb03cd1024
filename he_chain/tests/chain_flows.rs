//! End-to-end coordinator flows over the clear reference engine.

use std::cell::RefCell;
use std::rc::Rc;

use he_chain::{
    ChainConfig, ChainError, ClearEngine, CollectSink, Coordinator, DecryptOracle, HeEngine,
    ScalingMode,
};

fn config(modulus_bits: Vec<u32>, mode: ScalingMode) -> ChainConfig {
    ChainConfig {
        poly_degree: 8192,
        modulus_bits,
        initial_scale: (2.0f64).powi(40),
        mode,
    }
}

fn coordinator(
    config: &ChainConfig,
) -> (Coordinator<ClearEngine>, ClearEngine, Rc<RefCell<CollectSink>>) {
    let chain = config.build().unwrap();
    let engine = ClearEngine::new(chain.clone()).with_relin_key();
    let oracle = engine.clone();
    let sink = Rc::new(RefCell::new(CollectSink::default()));
    let coord = Coordinator::new(engine, chain)
        .with_mode(config.mode)
        .with_trace(Box::new(Rc::clone(&sink)));
    (coord, oracle, sink)
}

/// Evaluates pi * x^3 + 0.4 * x + 1 over a depth-2 chain, the classic
/// three-branch computation where every branch lands at a different level.
#[test]
fn polynomial_over_unit_interval() {
    let config = config(vec![60, 40, 40, 60], ScalingMode::Automatic);
    let (mut coord, oracle, _sink) = coordinator(&config);

    let n = coord.engine().slot_count();
    let xs: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();

    let x = coord.encrypt(&xs).unwrap();
    let x_sq = coord.square(&x).unwrap();
    let pi_x = coord.multiply_plain(&x, std::f64::consts::PI).unwrap();
    let pi_x_cubed = coord.multiply(&x_sq, &pi_x).unwrap();
    let point_four_x = coord.multiply_plain(&x, 0.4).unwrap();

    // The branches sit at levels 2 and 1; the coordinator aligns them.
    assert_eq!(pi_x_cubed.state().level, 2);
    assert_eq!(point_four_x.state().level, 1);
    let sum = coord.add(&pi_x_cubed, &point_four_x).unwrap();
    let result = coord.add_plain(&sum, 1.0).unwrap();

    assert_eq!(result.state().level, 2);
    let slots = oracle.decrypt_slots(result.payload()).unwrap();
    for (slot, x) in slots.iter().zip(&xs) {
        let want = std::f64::consts::PI * x * x * x + 0.4 * x + 1.0;
        assert!((slot - want).abs() < 1e-4, "x={x}: got {slot}, want {want}");
    }
}

#[test]
fn levels_never_move_back_up_the_chain() {
    let config = config(vec![60, 40, 40, 40, 60], ScalingMode::Automatic);
    let (mut coord, _oracle, sink) = coordinator(&config);

    let x = coord.encrypt(&[0.5, 0.25]).unwrap();
    let a = coord.square(&x).unwrap();
    let b = coord.multiply(&a, &x).unwrap();
    let c = coord.add(&b, &x).unwrap();
    let _ = coord.multiply_plain(&c, 2.0).unwrap();

    let sink = sink.borrow();
    assert_eq!(sink.ops.len(), 5);
    for trace in &sink.ops {
        let deepest = trace.before.iter().map(|s| s.level).max().unwrap_or(0);
        assert!(
            trace.after.level >= deepest,
            "{:?} moved level {deepest} -> {}",
            trace.op,
            trace.after.level
        );
    }
}

#[test]
fn automatic_mode_holds_the_working_scale() {
    let config = config(vec![60, 40, 40, 60], ScalingMode::Automatic);
    let (mut coord, _oracle, _sink) = coordinator(&config);
    let scale = (2.0f64).powi(40);

    let x = coord.encrypt(&[2.0]).unwrap();
    let y = coord.square(&x).unwrap();
    let z = coord.multiply(&y, &y).unwrap();
    for value in [&x, &y, &z] {
        assert_eq!(value.state().scale, scale);
    }
}

#[test]
fn manual_mode_requires_an_explicit_rescale() {
    let config = config(vec![60, 40, 40, 60], ScalingMode::Manual);
    let (mut coord, oracle, _sink) = coordinator(&config);
    let scale = (2.0f64).powi(40);

    let x = coord.encrypt(&[3.0]).unwrap();
    let mut sq = coord.square(&x).unwrap();
    assert_eq!(sq.state().level, 0);
    assert_eq!(sq.state().scale, scale * scale);

    // 2^80 against 2^40 is not reconcilable without a rescale.
    let err = coord.add(&sq, &x).unwrap_err();
    assert!(matches!(err, ChainError::ScaleMismatch { .. }));

    coord.rescale(&mut sq).unwrap();
    assert_eq!(sq.state().level, 1);
    assert_eq!(sq.state().scale, scale);

    let sum = coord.add(&sq, &x).unwrap();
    let slots = oracle.decrypt_slots(sum.payload()).unwrap();
    assert!((slots[0] - 12.0).abs() < 1e-9);
}

#[test]
fn manual_mod_switch_is_forward_only() {
    let config = config(vec![60, 40, 40, 60], ScalingMode::Manual);
    let (mut coord, _oracle, _sink) = coordinator(&config);

    let mut x = coord.encrypt(&[1.0]).unwrap();
    coord.mod_switch_to(&mut x, 2).unwrap();
    assert_eq!(x.state().level, 2);

    let err = coord.mod_switch_to(&mut x, 0).unwrap_err();
    assert!(matches!(err, ChainError::ExhaustedChain { .. }));
    assert_eq!(x.state().level, 2);
}

#[test]
fn chain_depth_bounds_the_number_of_multiplications() {
    // Depth 3: exactly three squarings fit, the fourth has no prime left.
    let config = config(vec![60, 40, 40, 40, 60], ScalingMode::Automatic);
    let (mut coord, _oracle, _sink) = coordinator(&config);

    let mut value = coord.encrypt(&[1.1]).unwrap();
    for expected_level in 1..=3 {
        value = coord.square(&value).unwrap();
        assert_eq!(value.state().level, expected_level);
    }
    let err = coord.square(&value).unwrap_err();
    assert!(matches!(err, ChainError::ExhaustedChain { level: 3, depth: 3 }));

    // Additive work at the bottom level is still legal.
    assert!(coord.add(&value, &value).is_ok());
    assert!(coord.add_plain(&value, 1.0).is_ok());
}

#[test]
fn inplace_variants_track_state() {
    let config = config(vec![60, 40, 40, 60], ScalingMode::Automatic);
    let (mut coord, oracle, _sink) = coordinator(&config);

    let mut acc = coord.encrypt(&[2.0]).unwrap();
    let x = coord.encrypt(&[3.0]).unwrap();
    coord.multiply_inplace(&mut acc, &x).unwrap();
    assert_eq!(acc.state().level, 1);

    coord.add_inplace(&mut acc, &x).unwrap();
    assert_eq!(acc.state().level, 1);
    let slots = oracle.decrypt_slots(acc.payload()).unwrap();
    assert!((slots[0] - 9.0).abs() < 1e-9);
}

#[test]
fn values_from_another_chain_are_rejected() {
    let config_a = config(vec![60, 40, 40, 60], ScalingMode::Automatic);
    let config_b = config(vec![60, 40, 60], ScalingMode::Automatic);
    let (mut coord_a, _oracle_a, _sink_a) = coordinator(&config_a);
    let (mut coord_b, _oracle_b, _sink_b) = coordinator(&config_b);

    let a = coord_a.encrypt(&[1.0]).unwrap();
    let b = coord_b.encrypt(&[1.0]).unwrap();
    let err = coord_a.add(&a, &b).unwrap_err();
    assert!(matches!(err, ChainError::ForeignValue));
}
