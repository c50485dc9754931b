// C-source back-end: emits an infix C expression, shells out to the host
// C compiler to produce a shared object, loads it with `libloading`, and
// resolves the entry point. Slowest back-end to build an evaluator from (it
// pays for a process spawn and a dynamic link), but its output can be
// inspected and is a useful cross-check against the other two.

use std::io::Write as _;
use std::process::Command;

use libloading::{Library, Symbol};
use tempfile::tempdir;

use crate::catalog::{BinaryFunction, BinaryOperator, MultinaryOperator, UnaryFunction, UnaryOperator};
use crate::error::{Error, Result};
use crate::node::{Node, NodeKind, Real};

use super::Evaluator;

const PREAMBLE: &str = r#"
#include <math.h>

static double sm_faculty(double v) {
    if (v < 0.0) return NAN;
    double rounded = floor(v + 0.5);
    double result = 1.0;
    for (double i = 1.0; i <= rounded; i += 1.0) {
        result *= i;
    }
    return result;
}

static double sm_truthy(int b) { return b ? 1.0 : 0.0; }
static double sm_not(double v) { return sm_truthy(v == 0.0); }
static double sm_or(double a, double b) { return sm_truthy(a != 0.0 || b != 0.0); }
static double sm_and(double a, double b) { return sm_truthy(a != 0.0 && b != 0.0); }

static double sm_ipow(double base, int exp) {
    if (exp == 0) return 1.0;
    int negative = exp < 0;
    unsigned int n = negative ? (unsigned int)(-exp) : (unsigned int)exp;
    double result = 1.0;
    double b = base;
    while (n > 0) {
        if (n & 1u) result *= b;
        b *= b;
        n >>= 1;
    }
    return negative ? 1.0 / result : result;
}
"#;

fn emit(node: &NodeKind) -> Result<String> {
    match node {
        NodeKind::Empty => Err(Error::InvalidNode),
        NodeKind::Number(v) => Ok(format!("({:?})", v)),
        NodeKind::Reference(p) => Ok(format!("(*(const double*){})", p.addr as usize)),
        NodeKind::ArrayReference(p) => Ok(format!(
            "(((const double*){})[*(const long long*){}])",
            p.base as usize, p.index as usize
        )),
        NodeKind::Symbol(name) => Err(Error::Unsupported(format!("cannot lower free symbol `{}`", name))),
        NodeKind::Local(slot) => {
            Err(Error::Unsupported(format!("local variable `{}` is not implemented", slot.name)))
        }
        NodeKind::UnaryOp(op, a) => {
            let a = emit(a)?;
            Ok(match op {
                UnaryOperator::Plus => format!("(+{})", a),
                UnaryOperator::Minus => format!("(-{})", a),
                UnaryOperator::Faculty => format!("sm_faculty({})", a),
                UnaryOperator::Not => format!("sm_not({})", a),
            })
        }
        NodeKind::BinaryOp(op, a, b) => {
            let a = emit(a)?;
            let b = emit(b)?;
            Ok(match op {
                BinaryOperator::Sub => format!("({} - {})", a, b),
                BinaryOperator::Div => format!("({} / {})", a, b),
                BinaryOperator::Mod => format!("fmod({}, {})", a, b),
                BinaryOperator::Pow => format!("pow({}, {})", a, b),
                BinaryOperator::Or => format!("sm_or({}, {})", a, b),
                BinaryOperator::And => format!("sm_and({}, {})", a, b),
                BinaryOperator::Lt => format!("sm_truthy({} < {})", a, b),
                BinaryOperator::Gt => format!("sm_truthy({} > {})", a, b),
                BinaryOperator::Le => format!("sm_truthy({} <= {})", a, b),
                BinaryOperator::Ge => format!("sm_truthy({} >= {})", a, b),
                BinaryOperator::Eq => format!("sm_truthy({} == {})", a, b),
                BinaryOperator::Ne => format!("sm_truthy({} != {})", a, b),
                BinaryOperator::Assign => return Err(Error::Unsupported(":= is not implemented".to_string())),
                BinaryOperator::List => format!("({}, {})", a, b),
            })
        }
        NodeKind::Multinary(op, args) => emit_multinary(*op, args),
        NodeKind::UnaryFn(tag, a) => {
            if tag.is_unimplemented() {
                return Err(Error::Unsupported(format!("`{}` is not implemented", tag.spelling())));
            }
            let a = emit(a)?;
            Ok(match tag {
                UnaryFunction::Abs => format!("fabs({})", a),
                UnaryFunction::Acos => format!("acos({})", a),
                UnaryFunction::Acosh => format!("acosh({})", a),
                UnaryFunction::Asin => format!("asin({})", a),
                UnaryFunction::Asinh => format!("asinh({})", a),
                UnaryFunction::Atan => format!("atan({})", a),
                UnaryFunction::Atanh => format!("atanh({})", a),
                UnaryFunction::Cbrt => format!("cbrt({})", a),
                UnaryFunction::Ceil => format!("ceil({})", a),
                UnaryFunction::Cos => format!("cos({})", a),
                UnaryFunction::Cosh => format!("cosh({})", a),
                UnaryFunction::Cot => format!("(1.0 / tan({}))", a),
                UnaryFunction::Csc => format!("(1.0 / sin({}))", a),
                UnaryFunction::Erf => format!("erf({})", a),
                UnaryFunction::Erfc => format!("erfc({})", a),
                UnaryFunction::Exp => format!("exp({})", a),
                UnaryFunction::Exp2 => format!("exp2({})", a),
                UnaryFunction::Floor => format!("floor({})", a),
                UnaryFunction::Int => format!("trunc({})", a),
                UnaryFunction::Log => format!("log({})", a),
                UnaryFunction::Log10 => format!("log10({})", a),
                UnaryFunction::Log2 => format!("log2({})", a),
                UnaryFunction::Sec => format!("(1.0 / cos({}))", a),
                UnaryFunction::Sin => format!("sin({})", a),
                UnaryFunction::Sinh => format!("sinh({})", a),
                UnaryFunction::Sqrt => format!("sqrt({})", a),
                UnaryFunction::Tan => format!("tan({})", a),
                UnaryFunction::Tanh => format!("tanh({})", a),
                UnaryFunction::Trunc => format!("trunc({})", a),
                UnaryFunction::Arg
                | UnaryFunction::Conj
                | UnaryFunction::Imag
                | UnaryFunction::Real
                | UnaryFunction::T => unreachable!("filtered by is_unimplemented above"),
            })
        }
        NodeKind::BinaryFn(tag, a, b) => {
            if tag.is_unimplemented() {
                return Err(Error::Unsupported(format!("`{}` is not implemented", tag.spelling())));
            }
            let a = emit(a)?;
            let b = emit(b)?;
            Ok(match tag {
                BinaryFunction::Atan2 => format!("atan2({}, {})", a, b),
                BinaryFunction::Hypot => format!("hypot({}, {})", a, b),
                BinaryFunction::Min => format!("fmin({}, {})", a, b),
                BinaryFunction::Max => format!("fmax({}, {})", a, b),
                BinaryFunction::Pow => format!("pow({}, {})", a, b),
                BinaryFunction::Plog => format!(
                    "(({a}) < ({b}) ? log({b}) + (({a}) - ({b})) / ({b}) \
                     - (({a}) - ({b})) * (({a}) - ({b})) / (2.0 * ({b}) * ({b})) \
                     + (({a}) - ({b})) * (({a}) - ({b})) * (({a}) - ({b})) / (3.0 * ({b}) * ({b}) * ({b})) \
                     : log({a}))",
                    a = a,
                    b = b
                ),
                BinaryFunction::Polar => unreachable!("filtered by is_unimplemented above"),
            })
        }
        NodeKind::Conditional(c, t, e) => {
            let c = emit(c)?;
            let t = emit(t)?;
            let e = emit(e)?;
            Ok(format!("(({}) != 0.0 ? ({}) : ({}))", c, t, e))
        }
        NodeKind::IntegerPower(a, n) => {
            let a = emit(a)?;
            Ok(format!("sm_ipow({}, {})", a, n))
        }
    }
}

fn emit_multinary(op: MultinaryOperator, args: &[Node]) -> Result<String> {
    match op {
        MultinaryOperator::Component => return Err(Error::Unsupported("component is not implemented".to_string())),
        MultinaryOperator::Add | MultinaryOperator::Mul | MultinaryOperator::List => {}
    }
    if args.is_empty() {
        return Err(Error::Lowering("multinary node with no children".to_string()));
    }
    let parts: Vec<String> = args.iter().map(|a| emit(a)).collect::<Result<_>>()?;
    let joiner = match op {
        MultinaryOperator::Add => " + ",
        MultinaryOperator::Mul => " * ",
        MultinaryOperator::List => ", ",
        MultinaryOperator::Component => unreachable!(),
    };
    Ok(format!("({})", parts.join(joiner)))
}

/// Renders the full translation unit for `node`, for callers that just want
/// to inspect the generated C rather than load it.
pub fn render_source(node: &Node) -> Result<String> {
    let body = emit(node)?;
    Ok(format!("{}\ndouble sm_entry(void) {{\n    return {};\n}}\n", PREAMBLE, body))
}

pub fn build(node: &Node) -> Result<Box<dyn Evaluator>> {
    let source = render_source(node)?;

    let dir = tempdir().map_err(|e| Error::Runtime(e.to_string()))?;
    let c_path = dir.path().join("sm_expr.c");
    let so_path = dir.path().join("sm_expr.so");

    {
        let mut file = std::fs::File::create(&c_path).map_err(|e| Error::Runtime(e.to_string()))?;
        file.write_all(source.as_bytes()).map_err(|e| Error::Runtime(e.to_string()))?;
    }

    let compiler = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let status = Command::new(&compiler)
        .args(["-shared", "-fPIC", "-O2", "-o"])
        .arg(&so_path)
        .arg(&c_path)
        .arg("-lm")
        .status()
        .map_err(|e| Error::Runtime(format!("failed to invoke `{}`: {}", compiler, e)))?;
    if !status.success() {
        return Err(Error::Runtime(format!("`{}` exited with {}", compiler, status)));
    }

    let library = unsafe { Library::new(&so_path).map_err(|e| Error::Runtime(e.to_string()))? };
    let entry: unsafe extern "C" fn() -> Real = unsafe {
        let symbol: Symbol<unsafe extern "C" fn() -> Real> =
            library.get(b"sm_entry\0").map_err(|e| Error::Runtime(e.to_string()))?;
        *symbol
    };

    Ok(Box::new(CSourceEvaluator { _library: library, entry }))
}

pub struct CSourceEvaluator {
    // Keeps the mapped shared object alive; `entry` points into it.
    _library: Library,
    entry: unsafe extern "C" fn() -> Real,
}

impl Evaluator for CSourceEvaluator {
    fn call(&mut self) -> Real {
        unsafe { (self.entry)() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Engine;

    #[test]
    fn renders_provider_reads_and_arithmetic() {
        let mut engine = Engine::new();
        let c: Real = 2.0;
        engine.register_provider("c", &c as *const Real);
        let f = engine.parse("1 + c + 2*c").unwrap().simplify();
        let source = render_source(&f.root()).unwrap();
        assert!(source.contains("sm_entry"));
        assert!(source.contains("double*)"));
    }

    #[test]
    fn rejects_unimplemented_function() {
        let engine = Engine::new();
        let f = engine.parse("conj(1)").unwrap();
        assert!(render_source(&f.root()).is_err());
    }
}
