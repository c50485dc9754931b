// Symbolic differentiation with respect to a single, address-identified
// value provider. Produces a new AST; callers typically follow up with
// `simplify` to get a compact derivative.

use std::f64::consts::{LN_2, PI};
use std::rc::Rc;

use crate::catalog::{BinaryFunction, BinaryOperator, MultinaryOperator, UnaryFunction, UnaryOperator};
use crate::error::{Error, Result};
use crate::node::{Node, NodeKind, Real, ValueProvider};

pub fn differentiate(node: &Node, provider: &ValueProvider) -> Result<Node> {
    d(node, provider)
}

fn num(v: Real) -> Node {
    Rc::new(NodeKind::Number(v))
}

fn mul(a: Node, b: Node) -> Node {
    Rc::new(NodeKind::Multinary(MultinaryOperator::Mul, vec![a, b]))
}

fn add(a: Node, b: Node) -> Node {
    Rc::new(NodeKind::Multinary(MultinaryOperator::Add, vec![a, b]))
}

fn sub(a: Node, b: Node) -> Node {
    Rc::new(NodeKind::BinaryOp(BinaryOperator::Sub, a, b))
}

fn div(a: Node, b: Node) -> Node {
    Rc::new(NodeKind::BinaryOp(BinaryOperator::Div, a, b))
}

fn neg(a: Node) -> Node {
    Rc::new(NodeKind::UnaryOp(UnaryOperator::Minus, a))
}

fn ipow(a: Node, n: i32) -> Node {
    Rc::new(NodeKind::IntegerPower(a, n))
}

fn ufn(tag: UnaryFunction, a: Node) -> Node {
    Rc::new(NodeKind::UnaryFn(tag, a))
}

fn cond(c: Node, t: Node, e: Node) -> Node {
    Rc::new(NodeKind::Conditional(c, t, e))
}

fn lt(a: Node, b: Node) -> Node {
    Rc::new(NodeKind::BinaryOp(BinaryOperator::Lt, a, b))
}

fn unsupported(what: &str) -> Error {
    Error::Unsupported(format!("derivative of `{}` is not implemented", what))
}

fn d(node: &Node, provider: &ValueProvider) -> Result<Node> {
    match node.as_ref() {
        NodeKind::Empty => Err(Error::InvalidNode),
        NodeKind::Number(_) => Ok(num(0.0)),
        NodeKind::Reference(p) => Ok(num(if p == provider { 1.0 } else { 0.0 })),
        NodeKind::ArrayReference(_) => Ok(num(0.0)),
        NodeKind::Symbol(_) => Ok(num(0.0)),
        NodeKind::Local(_) => Ok(num(0.0)),
        NodeKind::UnaryOp(op, a) => d_unary_op(*op, a, provider),
        NodeKind::BinaryOp(op, a, b) => d_binary_op(*op, a, b, provider),
        NodeKind::Multinary(op, args) => d_multinary(*op, args, provider),
        NodeKind::UnaryFn(tag, a) => d_unary_fn(*tag, a, provider),
        NodeKind::BinaryFn(tag, a, b) => d_binary_fn(*tag, a, b, provider),
        NodeKind::Conditional(c, t, e) => {
            // The condition itself is never differentiated: the derivative
            // branches on the same predicate as the value.
            Ok(cond(c.clone(), d(t, provider)?, d(e, provider)?))
        }
        NodeKind::IntegerPower(x, n) => {
            let dx = d(x, provider)?;
            Ok(mul(mul(num(*n as Real), dx), ipow(x.clone(), n - 1)))
        }
    }
}

fn d_unary_op(op: UnaryOperator, a: &Node, provider: &ValueProvider) -> Result<Node> {
    let da = d(a, provider)?;
    match op {
        UnaryOperator::Plus => Ok(da),
        UnaryOperator::Minus => Ok(neg(da)),
        UnaryOperator::Faculty => Err(unsupported("!")),
        UnaryOperator::Not => Err(unsupported("~")),
    }
}

fn d_binary_op(op: BinaryOperator, a: &Node, b: &Node, provider: &ValueProvider) -> Result<Node> {
    match op {
        BinaryOperator::Sub => Ok(sub(d(a, provider)?, d(b, provider)?)),
        BinaryOperator::Div => {
            let da = d(a, provider)?;
            let db = d(b, provider)?;
            Ok(sub(div(da, b.clone()), div(mul(db, a.clone()), ipow(b.clone(), 2))))
        }
        BinaryOperator::Mod => d(a, provider),
        BinaryOperator::Pow => d(&Rc::new(NodeKind::BinaryFn(BinaryFunction::Pow, a.clone(), b.clone())), provider),
        BinaryOperator::Or
        | BinaryOperator::And
        | BinaryOperator::Lt
        | BinaryOperator::Gt
        | BinaryOperator::Le
        | BinaryOperator::Ge
        | BinaryOperator::Eq
        | BinaryOperator::Ne => Ok(num(0.0)),
        BinaryOperator::Assign => Err(unsupported(":=")),
        BinaryOperator::List => d(b, provider),
    }
}

fn d_multinary(op: MultinaryOperator, args: &[Node], provider: &ValueProvider) -> Result<Node> {
    match op {
        MultinaryOperator::Add => {
            let mut terms = Vec::with_capacity(args.len());
            for a in args {
                terms.push(d(a, provider)?);
            }
            Ok(Rc::new(NodeKind::Multinary(MultinaryOperator::Add, terms)))
        }
        MultinaryOperator::Mul => {
            let mut terms = Vec::with_capacity(args.len());
            for (j, aj) in args.iter().enumerate() {
                let daj = d(aj, provider)?;
                let mut factors = vec![daj];
                for (i, ai) in args.iter().enumerate() {
                    if i != j {
                        factors.push(ai.clone());
                    }
                }
                terms.push(Rc::new(NodeKind::Multinary(MultinaryOperator::Mul, factors)));
            }
            Ok(Rc::new(NodeKind::Multinary(MultinaryOperator::Add, terms)))
        }
        MultinaryOperator::Component => Err(unsupported("component")),
        MultinaryOperator::List => {
            if let Some(last) = args.last() {
                d(last, provider)
            } else {
                Ok(num(0.0))
            }
        }
    }
}

fn d_unary_fn(tag: UnaryFunction, a: &Node, provider: &ValueProvider) -> Result<Node> {
    use UnaryFunction::*;
    if tag.is_unimplemented()
        || matches!(tag, Ceil | Floor | Int | Trunc)
    {
        return Err(unsupported(tag.spelling()));
    }
    let da = d(a, provider)?;
    let sqrt_pi_reciprocal_2 = num(2.0 / PI.sqrt());
    Ok(match tag {
        Abs => mul(da, cond(lt(a.clone(), num(0.0)), num(-1.0), num(1.0))),
        Acos => neg(div(da, ufn(Sqrt, sub(num(1.0), ipow(a.clone(), 2))))),
        Acosh => div(da, ufn(Sqrt, sub(ipow(a.clone(), 2), num(1.0)))),
        Asin => div(da, ufn(Sqrt, sub(num(1.0), ipow(a.clone(), 2)))),
        Asinh => div(da, ufn(Sqrt, add(ipow(a.clone(), 2), num(1.0)))),
        Atan => div(da, add(num(1.0), ipow(a.clone(), 2))),
        Atanh => div(da, sub(num(1.0), ipow(a.clone(), 2))),
        Cbrt => div(da, mul(num(3.0), ipow(ufn(Cbrt, a.clone()), 2))),
        Cos => neg(mul(da, ufn(Sin, a.clone()))),
        Cosh => mul(da, ufn(Sinh, a.clone())),
        Cot => neg(div(da, ipow(ufn(Sin, a.clone()), 2))),
        Csc => neg(mul(da, mul(ufn(Csc, a.clone()), ufn(Cot, a.clone())))),
        Erf => mul(da, mul(sqrt_pi_reciprocal_2, ufn(Exp, neg(ipow(a.clone(), 2))))),
        Erfc => neg(mul(da, mul(sqrt_pi_reciprocal_2, ufn(Exp, neg(ipow(a.clone(), 2)))))),
        Exp => mul(da, ufn(Exp, a.clone())),
        Exp2 => mul(da, mul(ufn(Exp2, a.clone()), num(LN_2))),
        Log => div(da, a.clone()),
        Log10 => div(da, mul(a.clone(), num(10f64.ln()))),
        Log2 => div(da, mul(a.clone(), num(LN_2))),
        Sec => mul(da, mul(ufn(Sec, a.clone()), ufn(Tan, a.clone()))),
        Sin => mul(da, ufn(Cos, a.clone())),
        Sinh => mul(da, ufn(Cosh, a.clone())),
        Sqrt => div(da, mul(num(2.0), ufn(Sqrt, a.clone()))),
        Tan => mul(da, add(num(1.0), ipow(ufn(Tan, a.clone()), 2))),
        Tanh => mul(da, sub(num(1.0), ipow(ufn(Tanh, a.clone()), 2))),
        Ceil | Floor | Int | Trunc | Arg | Conj | Imag | Real | T => {
            return Err(unsupported(tag.spelling()))
        }
    })
}

fn d_binary_fn(tag: BinaryFunction, a: &Node, b: &Node, provider: &ValueProvider) -> Result<Node> {
    use BinaryFunction::*;
    if tag.is_unimplemented() {
        return Err(unsupported(tag.spelling()));
    }
    let da = d(a, provider)?;
    let db = d(b, provider)?;
    Ok(match tag {
        Atan2 => div(
            sub(mul(b.clone(), da), mul(a.clone(), db)),
            add(ipow(a.clone(), 2), ipow(b.clone(), 2)),
        ),
        Min => cond(lt(a.clone(), b.clone()), da, db),
        Max => cond(lt(a.clone(), b.clone()), db, da),
        Plog => mul(
            da,
            cond(
                lt(a.clone(), b.clone()),
                add(
                    sub(div(num(1.0), b.clone()), div(sub(a.clone(), b.clone()), ipow(b.clone(), 2))),
                    div(ipow(sub(a.clone(), b.clone()), 2), ipow(b.clone(), 3)),
                ),
                div(num(1.0), a.clone()),
            ),
        ),
        Pow => {
            if let Some(bv) = b.as_number() {
                if bv == 1.0 {
                    return Ok(da);
                }
                if bv == 0.0 {
                    return Ok(num(0.0));
                }
                return Ok(mul(
                    mul(Rc::new(NodeKind::BinaryFn(Pow, a.clone(), sub(b.clone(), num(1.0)))), b.clone()),
                    da,
                ));
            }
            mul(
                Rc::new(NodeKind::BinaryFn(Pow, a.clone(), b.clone())),
                add(mul(db, ufn(UnaryFunction::Log, a.clone())), div(mul(b.clone(), da), a.clone())),
            )
        }
        Hypot => {
            let h = Rc::new(NodeKind::BinaryFn(Hypot, a.clone(), b.clone()));
            div(add(mul(a.clone(), da), mul(b.clone(), db)), h)
        }
        Polar => return Err(unsupported("polar")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluate;

    fn provider_node(addr: *const Real) -> (Node, ValueProvider) {
        let p = ValueProvider { addr, name: None };
        (Rc::new(NodeKind::Reference(p.clone())), p)
    }

    #[test]
    fn derivative_of_sin_matches_finite_difference() {
        let c: Real = 0.7;
        let (node, provider) = provider_node(&c as *const Real);
        let f = ufn(UnaryFunction::Sin, node);
        let df = differentiate(&f, &provider).unwrap();
        let analytic = evaluate(&df).unwrap();
        assert!((analytic - c.cos()).abs() < 1e-9);

        let eps = 1e-8;
        let c_plus = c + eps;
        let numeric = (f64::sin(c_plus) - f64::sin(c)) / eps;
        assert!((analytic - numeric).abs() < 1e-5);
    }

    #[test]
    fn derivative_of_mul_uses_product_rule() {
        let c: Real = 2.0;
        let (node, provider) = provider_node(&c as *const Real);
        let f = Rc::new(NodeKind::Multinary(MultinaryOperator::Mul, vec![node.clone(), node.clone()]));
        let df = differentiate(&f, &provider).unwrap();
        assert!((evaluate(&df).unwrap() - 2.0 * c).abs() < 1e-9);
    }

    #[test]
    fn nondifferentiable_function_is_an_error() {
        let c: Real = 1.0;
        let (node, provider) = provider_node(&c as *const Real);
        let f = ufn(UnaryFunction::Ceil, node);
        assert!(differentiate(&f, &provider).is_err());
    }
}
