// Seeded from spec.md §8.3: D(sin(c), c) checked against a finite
// difference over a sweep of c, and a handful of the other §4.5 rules.

use symbolic_math::eval::evaluate;
use symbolic_math::node::Real;
use symbolic_math::Engine;

fn finite_difference(engine: &Engine, text: &str, c: &mut Real, at: Real, eps: Real) -> Real {
    *c = at;
    let f = engine.parse(text).unwrap();
    let f_c = evaluate(&f.root()).unwrap();
    *c = at + eps;
    let f_c_eps = evaluate(&f.root()).unwrap();
    (f_c_eps - f_c) / eps
}

#[test]
fn sin_derivative_matches_finite_difference_over_sweep() {
    let mut engine = Engine::new();
    let mut c: Real = 0.0;
    engine.register_provider("c", &c as *const Real);

    let f = engine.parse("sin(c)").unwrap();
    let df = f.differentiate("c").unwrap().simplify();

    let eps = 1e-8;
    let tol = 1e-5;
    let mut x = -4.0;
    while x <= 4.0 + 1e-9 {
        c = x;
        let analytic = evaluate(&df.root()).unwrap();
        let numeric = finite_difference(&engine, "sin(c)", &mut c, x, eps);
        assert!(
            (analytic - numeric).abs() < tol,
            "at c={}: analytic={} numeric={}",
            x,
            analytic,
            numeric
        );
        x += 0.1;
    }
}

#[test]
fn product_rule_on_mul_of_three() {
    let mut engine = Engine::new();
    let c: Real = 2.0;
    engine.register_provider("c", &c as *const Real);

    let f = engine.parse("c*c*c").unwrap();
    let df = f.differentiate("c").unwrap().simplify();
    // d/dc c^3 = 3c^2 = 12 at c=2.
    assert!((evaluate(&df.root()).unwrap() - 12.0).abs() < 1e-9);
}

#[test]
fn quotient_rule_on_div() {
    let mut engine = Engine::new();
    let c: Real = 2.0;
    engine.register_provider("c", &c as *const Real);

    // d/dc (c / (c+1)) = 1/(c+1)^2
    let f = engine.parse("c/(c+1)").unwrap();
    let df = f.differentiate("c").unwrap().simplify();
    let expected = 1.0 / (3.0 * 3.0);
    assert!((evaluate(&df.root()).unwrap() - expected).abs() < 1e-9);
}

#[test]
fn conditional_does_not_differentiate_its_condition() {
    let mut engine = Engine::new();
    let c: Real = 1.0;
    engine.register_provider("c", &c as *const Real);

    // condition uses c but its derivative must not appear in the result.
    let f = engine.parse("if(c>0, c*c, c)").unwrap();
    let df = f.differentiate("c").unwrap().simplify();
    // branch taken is `c*c` since c>0, so derivative is 2c = 2.
    assert!((evaluate(&df.root()).unwrap() - 2.0).abs() < 1e-9);
}

#[test]
fn nondifferentiable_function_reports_an_error() {
    let mut engine = Engine::new();
    let x: Real = 1.5;
    engine.register_provider("x", &x as *const Real);
    let f = engine.parse("ceil(x)").unwrap();
    assert!(f.differentiate("x").is_err());
}

#[test]
fn integer_power_derivative() {
    let mut engine = Engine::new();
    let c: Real = 2.0;
    engine.register_provider("c", &c as *const Real);

    let f = engine.parse("c^5").unwrap();
    let df = f.differentiate("c").unwrap().simplify();
    // d/dc c^5 = 5c^4 = 80 at c=2.
    assert!((evaluate(&df.root()).unwrap() - 80.0).abs() < 1e-9);
}
