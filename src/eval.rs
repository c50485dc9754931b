// Tree-walking evaluator: the reference semantics every other back-end is
// checked against. Recursive, allocation-free beyond the call stack, reads
// provider values at the point of each load (see `DESIGN.md` for how this
// differs from the bytecode back-end's call-start snapshot).

use crate::catalog::{BinaryFunction, BinaryOperator, MultinaryOperator, UnaryFunction, UnaryOperator};
use crate::error::{Error, Result};
use crate::node::{NodeKind, Real};

pub fn evaluate(node: &NodeKind) -> Result<Real> {
    match node {
        NodeKind::Empty => Err(Error::InvalidNode),
        NodeKind::Number(v) => Ok(*v),
        NodeKind::Reference(p) => Ok(p.read()),
        NodeKind::ArrayReference(p) => Ok(p.read()),
        NodeKind::Symbol(name) => Err(Error::Unsupported(format!(
            "symbol `{}` cannot be evaluated directly",
            name
        ))),
        NodeKind::Local(slot) => Err(Error::Unsupported(format!(
            "local variable `{}` is not implemented",
            slot.name
        ))),
        NodeKind::UnaryOp(op, a) => eval_unary_op(*op, evaluate(a)?),
        NodeKind::BinaryOp(op, a, b) => eval_binary_op(*op, evaluate(a)?, evaluate(b)?),
        NodeKind::Multinary(op, args) => eval_multinary(*op, args),
        NodeKind::UnaryFn(tag, a) => eval_unary_fn(*tag, evaluate(a)?),
        NodeKind::BinaryFn(tag, a, b) => eval_binary_fn(*tag, evaluate(a)?, evaluate(b)?),
        NodeKind::Conditional(c, t, e) => {
            if evaluate(c)? != 0.0 {
                evaluate(t)
            } else {
                evaluate(e)
            }
        }
        NodeKind::IntegerPower(a, n) => Ok(integer_power(evaluate(a)?, *n)),
    }
}

/// Exponentiation by squaring for a signed integer exponent.
pub fn integer_power(base: Real, exp: i32) -> Real {
    if exp == 0 {
        return 1.0;
    }
    if exp < 0 {
        return 1.0 / integer_power(base, -exp);
    }
    let mut result = 1.0;
    let mut b = base;
    let mut n = exp as u32;
    while n > 0 {
        if n & 1 == 1 {
            result *= b;
        }
        b *= b;
        n >>= 1;
    }
    result
}

fn truthy(v: Real) -> Real {
    if v != 0.0 {
        1.0
    } else {
        0.0
    }
}

fn faculty(v: Real) -> Real {
    let n = v.round();
    if n < 0.0 {
        return Real::NAN;
    }
    let mut result = 1.0;
    let mut i = 1.0;
    while i <= n {
        result *= i;
        i += 1.0;
    }
    result
}

pub(crate) fn eval_unary_op(op: UnaryOperator, a: Real) -> Result<Real> {
    Ok(match op {
        UnaryOperator::Plus => a,
        UnaryOperator::Minus => -a,
        UnaryOperator::Faculty => faculty(a),
        UnaryOperator::Not => truthy(if a == 0.0 { 1.0 } else { 0.0 }),
    })
}

pub(crate) fn eval_binary_op(op: BinaryOperator, a: Real, b: Real) -> Result<Real> {
    Ok(match op {
        BinaryOperator::Sub => a - b,
        BinaryOperator::Div => a / b,
        BinaryOperator::Mod => a % b,
        BinaryOperator::Pow => a.powf(b),
        BinaryOperator::Or => truthy(if a != 0.0 || b != 0.0 { 1.0 } else { 0.0 }),
        BinaryOperator::And => truthy(if a != 0.0 && b != 0.0 { 1.0 } else { 0.0 }),
        BinaryOperator::Lt => truthy(if a < b { 1.0 } else { 0.0 }),
        BinaryOperator::Gt => truthy(if a > b { 1.0 } else { 0.0 }),
        BinaryOperator::Le => truthy(if a <= b { 1.0 } else { 0.0 }),
        BinaryOperator::Ge => truthy(if a >= b { 1.0 } else { 0.0 }),
        BinaryOperator::Eq => truthy(if a == b { 1.0 } else { 0.0 }),
        BinaryOperator::Ne => truthy(if a != b { 1.0 } else { 0.0 }),
        BinaryOperator::Assign => return Err(Error::Unsupported(":= is not implemented".to_string())),
        BinaryOperator::List => b,
    })
}

fn eval_multinary(op: MultinaryOperator, args: &[crate::node::Node]) -> Result<Real> {
    match op {
        MultinaryOperator::Add => {
            let mut sum = 0.0;
            for a in args {
                sum += evaluate(a)?;
            }
            Ok(sum)
        }
        MultinaryOperator::Mul => {
            let mut product = 1.0;
            for a in args {
                product *= evaluate(a)?;
            }
            Ok(product)
        }
        MultinaryOperator::Component => Err(Error::Unsupported("component is not implemented".to_string())),
        MultinaryOperator::List => {
            let mut last = 0.0;
            for a in args {
                last = evaluate(a)?;
            }
            Ok(last)
        }
    }
}

pub(crate) fn eval_unary_fn(tag: UnaryFunction, a: Real) -> Result<Real> {
    if tag.is_unimplemented() {
        return Err(Error::Unsupported(format!("`{}` is not implemented", tag.spelling())));
    }
    Ok(match tag {
        UnaryFunction::Abs => a.abs(),
        UnaryFunction::Acos => a.acos(),
        UnaryFunction::Acosh => a.acosh(),
        UnaryFunction::Asin => a.asin(),
        UnaryFunction::Asinh => a.asinh(),
        UnaryFunction::Atan => a.atan(),
        UnaryFunction::Atanh => a.atanh(),
        UnaryFunction::Cbrt => a.cbrt(),
        UnaryFunction::Ceil => a.ceil(),
        UnaryFunction::Cos => a.cos(),
        UnaryFunction::Cosh => a.cosh(),
        UnaryFunction::Cot => 1.0 / a.tan(),
        UnaryFunction::Csc => 1.0 / a.sin(),
        UnaryFunction::Erf => libm::erf(a),
        UnaryFunction::Erfc => libm::erfc(a),
        UnaryFunction::Exp => a.exp(),
        UnaryFunction::Exp2 => a.exp2(),
        UnaryFunction::Floor => a.floor(),
        UnaryFunction::Int => a.trunc(),
        UnaryFunction::Log => a.ln(),
        UnaryFunction::Log10 => a.log10(),
        UnaryFunction::Log2 => a.log2(),
        UnaryFunction::Sec => 1.0 / a.cos(),
        UnaryFunction::Sin => a.sin(),
        UnaryFunction::Sinh => a.sinh(),
        UnaryFunction::Sqrt => a.sqrt(),
        UnaryFunction::Tan => a.tan(),
        UnaryFunction::Tanh => a.tanh(),
        UnaryFunction::Trunc => a.trunc(),
        UnaryFunction::Arg
        | UnaryFunction::Conj
        | UnaryFunction::Imag
        | UnaryFunction::Real
        | UnaryFunction::T => unreachable!("filtered by is_unimplemented above"),
    })
}

pub(crate) fn eval_binary_fn(tag: BinaryFunction, a: Real, b: Real) -> Result<Real> {
    if tag.is_unimplemented() {
        return Err(Error::Unsupported(format!("`{}` is not implemented", tag.spelling())));
    }
    Ok(match tag {
        BinaryFunction::Atan2 => a.atan2(b),
        BinaryFunction::Hypot => a.hypot(b),
        BinaryFunction::Min => a.min(b),
        BinaryFunction::Max => a.max(b),
        BinaryFunction::Pow => a.powf(b),
        BinaryFunction::Plog => {
            if a < b {
                b.ln() + (a - b) / b - (a - b) * (a - b) / (2.0 * b * b)
                    + (a - b) * (a - b) * (a - b) / (3.0 * b * b * b)
            } else {
                a.ln()
            }
        }
        BinaryFunction::Polar => unreachable!("filtered by is_unimplemented above"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn number_evaluates_to_itself() {
        assert_eq!(evaluate(&NodeKind::Number(4.0)).unwrap(), 4.0);
    }

    #[test]
    fn integer_power_matches_repeated_multiplication() {
        assert!((integer_power(1.5, 7) - 1.5f64.powi(7)).abs() < 1e-9);
        assert_eq!(integer_power(2.0, 0), 1.0);
        assert!((integer_power(2.0, -2) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_node_is_an_error() {
        assert!(evaluate(&NodeKind::Empty).is_err());
    }
}
