// Seeded directly from spec.md §8.3's concrete scenarios table and §8.2's
// boundary cases.

use symbolic_math::backend;
use symbolic_math::backend::Evaluator;
use symbolic_math::node::Real;
use symbolic_math::Engine;

/// Wires `env_logger` so a run with `RUST_LOG=trace` surfaces the parser's
/// and Simplify's `log::trace!` call sites; harmless, idempotent no-op
/// otherwise. `try_init` rather than `init` since every test in this binary
/// calls it.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn eval_tree(engine: &Engine, text: &str) -> Real {
    init_logging();
    let f = engine.parse(text).unwrap();
    symbolic_math::eval::evaluate(&f.root()).unwrap()
}

#[test]
fn scenario_polynomial() {
    let mut engine = Engine::new();
    let c: Real = 2.0;
    engine.register_provider("c", &c as *const Real);
    assert!((eval_tree(&engine, "1 + c + 2*c + 3*c^3") - 31.0).abs() < 1e-9);
}

#[test]
fn scenario_atan2() {
    let mut engine = Engine::new();
    let c: Real = 1.0;
    engine.register_provider("c", &c as *const Real);
    let expected = 3.0f64.atan2(1.0);
    assert!((eval_tree(&engine, "atan2(3*c, -c+2)") - expected).abs() < 1e-9);
}

#[test]
fn scenario_nested_conditional() {
    let mut engine = Engine::new();
    let c: Real = 0.0;
    engine.register_provider("c", &c as *const Real);
    assert!((eval_tree(&engine, "if(c<-0.5, 10, if(c>0.2, 20, 30))") - 30.0).abs() < 1e-9);
}

#[test]
fn scenario_nested_pow() {
    let mut engine = Engine::new();
    let c: Real = 0.5;
    engine.register_provider("c", &c as *const Real);
    let expected = 1.5f64.powi(7);
    assert!((eval_tree(&engine, "pow(pow(c+1, 3.5), 2)") - expected).abs() < 1e-6);
}

#[test]
fn scenario_logical_or() {
    let mut engine = Engine::new();
    let c: Real = 0.1;
    engine.register_provider("c", &c as *const Real);
    assert!((eval_tree(&engine, "c<0.2 | 0.0") - 1.0).abs() < 1e-9);
}

#[test]
fn scenario_sin_plus_cos() {
    let mut engine = Engine::new();
    let c: Real = 0.7;
    engine.register_provider("c", &c as *const Real);
    let expected = 0.7f64.sin() + 0.7f64.cos();
    assert!((eval_tree(&engine, "sin(c)+cos(c)") - expected).abs() < 1e-9);
}

#[test]
fn boundary_empty_unary_function_call_is_error() {
    let engine = Engine::new();
    assert!(engine.parse("sin()").is_err());
}

#[test]
fn boundary_unary_in_operator_position_is_error() {
    let engine = Engine::new();
    assert!(engine.parse("*-x").is_err());
}

#[test]
fn boundary_deeply_nested_parens() {
    let mut engine = Engine::new();
    let c: Real = 5.0;
    engine.register_provider("c", &c as *const Real);
    assert!((eval_tree(&engine, "((((c))))") - 5.0).abs() < 1e-9);
}

#[test]
fn boundary_constant_only_expression_simplifies_to_one_number() {
    let engine = Engine::new();
    let f = engine.parse("1 + 2*3 - 4").unwrap().simplify();
    assert!(matches!(f.root().as_ref(), symbolic_math::node::NodeKind::Number(_)));
}

#[test]
fn boundary_logical_operator_with_non_bool_operand() {
    let mut engine = Engine::new();
    let c: Real = 0.1;
    engine.register_provider("c", &c as *const Real);
    assert!((eval_tree(&engine, "c<0.2 & 2.0") - 1.0).abs() < 1e-9);
}

#[test]
fn boundary_integer_power_negative_and_zero_exponent() {
    let mut engine = Engine::new();
    let c: Real = 2.0;
    engine.register_provider("c", &c as *const Real);
    assert!((eval_tree(&engine, "c^0") - 1.0).abs() < 1e-9);
    assert!((eval_tree(&engine, "c^-2") - 0.25).abs() < 1e-9);
}

#[test]
fn every_executing_back_end_agrees_with_the_tree_walker() {
    let mut engine = Engine::new();
    let c: Real = 2.0;
    engine.register_provider("c", &c as *const Real);
    let f = engine.parse("1 + c + 2*c + 3*c^3").unwrap().simplify();
    let expected = symbolic_math::eval::evaluate(&f.root()).unwrap();

    for name in ["bytecode", "jit"] {
        let mut evaluator = backend::build_compiler(name, &f.root()).unwrap();
        let got = evaluator.call();
        assert!((got - expected).abs() < 1e-9, "{} disagreed: {} vs {}", name, got, expected);
    }
}

#[test]
fn weak_parse_format_round_trip() {
    let mut engine = Engine::new();
    let c: Real = 3.0;
    engine.register_provider("c", &c as *const Real);
    let f = engine.parse("sin(c) + c^2 - 1").unwrap();
    let expected = symbolic_math::eval::evaluate(&f.root()).unwrap();

    let rendered = f.format();
    let reparsed = engine.parse(&rendered).unwrap();
    let got = symbolic_math::eval::evaluate(&reparsed.root()).unwrap();

    assert!((got - expected).abs() < 1e-9);
}
