use densim::gibbs::{derive, sample, validate, Bounds, DensitySpec, DiagnosticKind};
use densim::symbolic::Engine;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn spec(expression: &str, x: (f64, f64), y: (f64, f64)) -> DensitySpec {
    DensitySpec::new(expression, Bounds::new(x.0, x.1), Bounds::new(y.0, y.1))
}

fn linear() -> DensitySpec {
    spec("(2*x+3*y+2)/28", (0.0, 2.0), (0.0, 2.0))
}

fn quadratic() -> DensitySpec {
    spec("4*x*y", (0.1, 0.9), (0.1, 0.9))
}

#[test]
fn linear_density_is_valid() {
    let outcome = validate(&Engine::new(), &linear());
    assert!(outcome.is_valid);
    assert_eq!(outcome.errors, Vec::<String>::new());
    assert_eq!(
        outcome.normalized_expression.as_deref(),
        Some("x/14 + 3*y/28 + 1/14")
    );
}

#[test]
fn foreign_variable_is_rejected() {
    let engine = Engine::new();
    let density = spec("x*z", (0.0, 1.0), (0.0, 1.0));
    let outcome = validate(&engine, &density);
    assert!(!outcome.is_valid);
    assert_eq!(outcome.errors[0], "Disallowed symbols: ['z']");
    assert!(derive(&engine, &density).has(DiagnosticKind::DisallowedSymbol));
}

#[test]
fn negative_density_is_rejected() {
    let engine = Engine::new();
    let density = spec("x - 1/2", (0.0, 1.0), (0.0, 1.0));
    let outcome = validate(&engine, &density);
    assert!(!outcome.is_valid);
    assert_eq!(outcome.errors[0], "Function is negative at (0.0, 0.0): -0.5");
    assert!(derive(&engine, &density).has(DiagnosticKind::NonNegativityViolation));
}

#[test]
fn validation_is_idempotent() {
    let engine = Engine::new();
    for density in [linear(), quadratic(), spec("x*z", (0.0, 1.0), (0.0, 1.0))] {
        assert_eq!(validate(&engine, &density), validate(&engine, &density));
    }
}

#[test]
fn burn_in_is_discarded() {
    let engine = Engine::new();
    let model = derive(&engine, &linear()).model.unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let (trace, stats) = sample(&engine, &model, (1.0, 1.0), 300, 120, &mut rng).unwrap();
    assert_eq!(trace.x.len(), 300);
    assert_eq!(trace.y.len(), 300);
    assert_eq!(stats.total_samples, 300);
    assert_eq!(trace.held_steps, 0);
}

#[test]
fn samples_respect_bounds_even_from_outside_start() {
    let engine = Engine::new();
    let density = spec("4*x*(1-y)", (0.1, 0.9), (0.1, 0.9));
    let model = derive(&engine, &density).model.unwrap();
    let mut rng = StdRng::seed_from_u64(17);
    let (trace, _) = sample(&engine, &model, (5.0, -3.0), 2000, 0, &mut rng).unwrap();
    assert!(trace.x.iter().all(|x| density.x_bounds.contains(*x)));
    assert!(trace.y.iter().all(|y| density.y_bounds.contains(*y)));
}

#[test]
fn quadratic_means_converge() {
    let engine = Engine::new();
    let model = derive(&engine, &quadratic()).model.unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    let (_, stats) = sample(&engine, &model, (0.5, 0.5), 20_000, 2_000, &mut rng).unwrap();

    // E[x] = (0.9^3 - 0.1^3) / 3 / ((0.9^2 - 0.1^2) / 2)
    let expected = 0.728 / 3.0 / 0.4;
    assert!((stats.mean_x - expected).abs() < 0.05, "mean_x = {}", stats.mean_x);
    assert!((stats.mean_y - expected).abs() < 0.05, "mean_y = {}", stats.mean_y);
    assert!(stats.correlation.abs() < 0.1);
}

#[test]
fn linear_means_converge() {
    let engine = Engine::new();
    let model = derive(&engine, &linear()).model.unwrap();
    let mut rng = StdRng::seed_from_u64(99);
    let (_, stats) = sample(&engine, &model, (1.0, 1.0), 20_000, 2_000, &mut rng).unwrap();
    assert!((stats.mean_x - 23.0 / 21.0).abs() < 0.05, "mean_x = {}", stats.mean_x);
    assert!((stats.mean_y - 8.0 / 7.0).abs() < 0.05, "mean_y = {}", stats.mean_y);
}

#[test]
fn unsolvable_inverse_is_reported() {
    let engine = Engine::new();
    // F(x|y) is a quartic with a linear term, outside the solver's reach.
    let outcome = validate(&engine, &spec("x^3 + x + y", (0.0, 1.0), (0.0, 1.0)));
    assert!(!outcome.is_valid);
    assert!(outcome.errors[0].starts_with("Error in conditional distributions: "));
}

#[test]
fn reciprocal_densities_are_valid() {
    let engine = Engine::new();
    for expression in ["x/y", "1/(x*y)", "1/x"] {
        let outcome = validate(&engine, &spec(expression, (1.0, 2.0), (1.0, 2.0)));
        assert!(outcome.is_valid, "{}: {:?}", expression, outcome.errors);
    }
}

#[test]
fn reciprocal_means_converge() {
    let engine = Engine::new();
    let model = derive(&engine, &spec("x/y", (1.0, 2.0), (1.0, 2.0))).model.unwrap();
    let mut rng = StdRng::seed_from_u64(31);
    let (_, stats) = sample(&engine, &model, (1.5, 1.5), 20_000, 2_000, &mut rng).unwrap();

    // f(x) = 2x/3 and f(y) = 1/(y*ln 2) on [1, 2].
    assert!((stats.mean_x - 14.0 / 9.0).abs() < 0.02, "mean_x = {}", stats.mean_x);
    let mean_y = 1.0 / std::f64::consts::LN_2;
    assert!((stats.mean_y - mean_y).abs() < 0.02, "mean_y = {}", stats.mean_y);
    assert_eq!(stats.total_samples, 20_000);
}

#[test]
fn exponential_means_converge() {
    let engine = Engine::new();
    // Mean of the unit exponential truncated to [0, 1].
    let e = std::f64::consts::E;
    let expected = (1.0 - 2.0 / e) / (1.0 - 1.0 / e);
    for expression in ["exp(-x)*exp(-y)", "exp(-x-y)"] {
        let model = derive(&engine, &spec(expression, (0.0, 1.0), (0.0, 1.0)))
            .model
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let (trace, stats) = sample(&engine, &model, (0.5, 0.5), 20_000, 2_000, &mut rng).unwrap();
        assert_eq!(trace.held_steps, 0);
        let (mean_x, mean_y) = (stats.mean_x, stats.mean_y);
        assert!((mean_x - expected).abs() < 0.02, "{}: mean_x = {}", expression, mean_x);
        assert!((mean_y - expected).abs() < 0.02, "{}: mean_y = {}", expression, mean_y);
        assert!(stats.correlation.abs() < 0.05);
    }
}
