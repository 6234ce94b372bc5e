use proptest::prelude::*;
use wf_aml::{Expr, Model};
use wf_solver::{FailureKind, NewtonConfig, SolverError, newton_solve};

/// Two coupled monotone equations with a unique root:
/// x^3 + x + 0.5 y - a = 0 and y^3 + y - x - b = 0.
fn coupled(a: f64, b: f64, x0: f64, y0: f64) -> Model {
    let mut model = Model::new();
    let x = model.declare_variable("x", x0).unwrap();
    let y = model.declare_variable("y", y0).unwrap();
    let pa = model.declare_parameter("a", a).unwrap();
    let pb = model.declare_parameter("b", b).unwrap();
    model
        .declare_constraint(
            "first",
            Expr::var(x).powf(3.0) + Expr::var(x) + 0.5 * Expr::var(y) - Expr::param(pa),
        )
        .unwrap();
    model
        .declare_constraint(
            "second",
            Expr::var(y).powf(3.0) + Expr::var(y) - Expr::var(x) - Expr::param(pb),
        )
        .unwrap();
    model.finalize_structure().unwrap();
    model
}

proptest! {
    // The Jacobian determinant is (3x²+1)(3y²+1) + 0.5 > 0 everywhere and the
    // residual is coercive, so a damped solve must reach the unique root.
    #[test]
    fn damped_solve_reaches_root_with_decreasing_residual(
        a in -5.0f64..5.0,
        b in -5.0f64..5.0,
        x0 in -3.0f64..3.0,
        y0 in -3.0f64..3.0,
    ) {
        let mut model = coupled(a, b, x0, y0);
        let config = NewtonConfig {
            min_step: 1e-8,
            ..NewtonConfig::default()
        };
        let report = newton_solve(&mut model, &config);
        prop_assert!(report.is_ok(), "solve failed: {report:?}");
        let report = report.unwrap();
        for pair in report.residual_history.windows(2) {
            prop_assert!(pair[1] < pair[0]);
        }
        let r = model.evaluate_residuals().unwrap();
        prop_assert!(r.amax() < config.tolerance);
        prop_assert_eq!(report.residual_history.len(), report.iterations + 1);
    }
}

#[test]
fn coupled_system_converges_from_origin() {
    let mut model = coupled(2.0, 0.0, 0.0, 0.0);
    let report = newton_solve(&mut model, &NewtonConfig::default()).unwrap();
    assert!(report.iterations < 20);
    let r = model.evaluate_residuals().unwrap();
    assert!(r.amax() < 1e-6);
}

#[test]
fn tighter_tolerance_takes_at_least_as_many_iterations() {
    let mut loose = coupled(3.0, 1.0, 2.0, -2.0);
    let mut tight = loose.clone();
    let loose_report = newton_solve(
        &mut loose,
        &NewtonConfig {
            tolerance: 1e-3,
            ..NewtonConfig::default()
        },
    )
    .unwrap();
    let tight_report = newton_solve(&mut tight, &NewtonConfig::default()).unwrap();
    assert!(tight_report.iterations >= loose_report.iterations);
    assert!(tight_report.max_residual < 1e-6);
}

#[test]
fn iteration_cap_is_reported() {
    let mut model = coupled(4.0, -3.0, 3.0, 3.0);
    let config = NewtonConfig {
        max_iterations: 1,
        tolerance: 1e-12,
        ..NewtonConfig::default()
    };
    match newton_solve(&mut model, &config) {
        Err(SolverError::Numeric(f)) => {
            assert_eq!(f.kind, FailureKind::MaxIterationsExceeded);
            assert_eq!(f.iterations, 1);
            assert!(f.worst_constraint.is_some());
        }
        other => panic!("expected iteration cap, got {other:?}"),
    }
}

#[test]
fn escape_valve_accepts_uphill_step() {
    // x / sqrt(1 + x^2): a full Newton step from x = 1.5 overshoots.
    // With the line search disabled (min_step = 1) the full step is rejected
    // and only the escape valve lets the solve continue.
    let build = || {
        let mut model = Model::new();
        let x = model.declare_variable("x", 1.5).unwrap();
        model
            .declare_constraint("c", Expr::var(x) / (1.0 + Expr::var(x) * Expr::var(x)).sqrt())
            .unwrap();
        model.finalize_structure().unwrap();
        model
    };
    let strict = NewtonConfig {
        min_step: 1.0,
        ..NewtonConfig::default()
    };
    let mut model = build();
    match newton_solve(&mut model, &strict) {
        Err(SolverError::Numeric(f)) => {
            assert_eq!(f.kind, FailureKind::Diverged);
            // Restored to the starting point.
            assert_eq!(model.variable_value("x").unwrap(), 1.5);
        }
        other => panic!("expected divergence, got {other:?}"),
    }

    let lenient = NewtonConfig {
        max_non_decreasing: 1,
        ..strict
    };
    // The first full step lands on x = -1.5³ and is kept; the next one is
    // uphill again with no allowance left.
    let mut model = build();
    match newton_solve(&mut model, &lenient) {
        Err(SolverError::Numeric(f)) => {
            assert_eq!(f.kind, FailureKind::Diverged);
            assert_eq!(f.iterations, 1);
            let x = model.variable_value("x").unwrap();
            assert!((x + 3.375).abs() < 1e-9, "x = {x}");
        }
        other => panic!("expected divergence after one escape, got {other:?}"),
    }
}

#[test]
fn invalid_config_is_rejected() {
    let mut model = coupled(1.0, 1.0, 0.0, 0.0);
    let bad = NewtonConfig {
        backtrack: 1.5,
        ..NewtonConfig::default()
    };
    assert!(matches!(
        newton_solve(&mut model, &bad),
        Err(SolverError::InvalidConfig { .. })
    ));
}
