// Constant folding and algebraic identities. Post-order: children are
// simplified first, then local rules are applied to the current node until
// a fixpoint is reached.

use std::rc::Rc;

use crate::catalog::{BinaryFunction, BinaryOperator, MultinaryOperator};
use crate::node::{Node, NodeKind, Real};

pub fn simplify(node: &Node) -> Node {
    let rebuilt = rebuild_children(node);
    fixpoint(rebuilt)
}

fn rebuild_children(node: &Node) -> Node {
    match node.as_ref() {
        NodeKind::Empty
        | NodeKind::Number(_)
        | NodeKind::Reference(_)
        | NodeKind::ArrayReference(_)
        | NodeKind::Symbol(_)
        | NodeKind::Local(_) => node.clone(),
        NodeKind::UnaryOp(op, a) => Rc::new(NodeKind::UnaryOp(*op, simplify(a))),
        NodeKind::BinaryOp(op, a, b) => Rc::new(NodeKind::BinaryOp(*op, simplify(a), simplify(b))),
        NodeKind::Multinary(op, args) => {
            Rc::new(NodeKind::Multinary(*op, args.iter().map(simplify).collect()))
        }
        NodeKind::UnaryFn(tag, a) => Rc::new(NodeKind::UnaryFn(*tag, simplify(a))),
        NodeKind::BinaryFn(tag, a, b) => Rc::new(NodeKind::BinaryFn(*tag, simplify(a), simplify(b))),
        NodeKind::Conditional(c, t, e) => {
            Rc::new(NodeKind::Conditional(simplify(c), simplify(t), simplify(e)))
        }
        NodeKind::IntegerPower(a, n) => Rc::new(NodeKind::IntegerPower(simplify(a), *n)),
    }
}

fn fixpoint(mut node: Node) -> Node {
    loop {
        let next = apply_rules(&node);
        if Rc::ptr_eq(&next, &node) {
            return node;
        }
        log::trace!("simplify rewrote {} -> {}", node, next);
        node = next;
    }
}

fn number(v: Real) -> Node {
    Rc::new(NodeKind::Number(v))
}

fn all_numbers(args: &[Node]) -> Option<Vec<Real>> {
    args.iter().map(|a| a.as_number()).collect()
}

fn apply_rules(node: &Node) -> Node {
    match node.as_ref() {
        NodeKind::UnaryOp(op, a) => {
            if let Some(v) = a.as_number() {
                return number(crate::eval::evaluate(&NodeKind::UnaryOp(*op, a.clone())).unwrap_or(v));
            }
            node.clone()
        }
        NodeKind::UnaryFn(tag, a) => {
            if a.is_number() && !tag.is_unimplemented() {
                if let Ok(v) = crate::eval::evaluate(&NodeKind::UnaryFn(*tag, a.clone())) {
                    return number(v);
                }
            }
            node.clone()
        }
        NodeKind::BinaryOp(op, a, b) => simplify_binary_op(node, *op, a, b),
        NodeKind::BinaryFn(tag, a, b) => simplify_binary_fn(node, *tag, a, b),
        NodeKind::Multinary(op, args) => simplify_multinary(node, *op, args),
        NodeKind::Conditional(c, t, e) => {
            if let Some(cv) = c.as_number() {
                return if cv != 0.0 { t.clone() } else { e.clone() };
            }
            node.clone()
        }
        NodeKind::IntegerPower(x, n) => simplify_integer_power(node, x, *n),
        _ => node.clone(),
    }
}

fn simplify_binary_op(node: &Node, op: BinaryOperator, a: &Node, b: &Node) -> Node {
    if a.is_number() && b.is_number() && op != BinaryOperator::Assign {
        if let Ok(v) = crate::eval::evaluate(&NodeKind::BinaryOp(op, a.clone(), b.clone())) {
            return number(v);
        }
    }
    match op {
        BinaryOperator::Sub => {
            if let Some(0.0) = b.as_number() {
                return a.clone();
            }
            if let Some(0.0) = a.as_number() {
                return Rc::new(NodeKind::UnaryOp(crate::catalog::UnaryOperator::Minus, b.clone()));
            }
            node.clone()
        }
        BinaryOperator::Div => {
            if let Some(1.0) = b.as_number() {
                return a.clone();
            }
            if let Some(0.0) = a.as_number() {
                return number(0.0);
            }
            node.clone()
        }
        BinaryOperator::Mod => {
            if let Some(1.0) = b.as_number() {
                return number(0.0);
            }
            node.clone()
        }
        BinaryOperator::Pow => {
            if let Some(bv) = b.as_number() {
                if bv.fract() == 0.0 && bv.is_finite() && bv.abs() <= i32::MAX as Real {
                    return simplify(&Rc::new(NodeKind::IntegerPower(a.clone(), bv as i32)));
                }
                return simplify(&Rc::new(NodeKind::BinaryFn(BinaryFunction::Pow, a.clone(), b.clone())));
            }
            node.clone()
        }
        BinaryOperator::Or => {
            if a.as_number().is_some_and(|v| v != 0.0) || b.as_number().is_some_and(|v| v != 0.0) {
                return number(1.0);
            }
            node.clone()
        }
        BinaryOperator::And => {
            if a.as_number() == Some(0.0) || b.as_number() == Some(0.0) {
                return number(0.0);
            }
            node.clone()
        }
        _ => node.clone(),
    }
}

/// Folds fully-constant calls and canonicalises `pow(x, n)` with an
/// integer-valued constant exponent into `IntegerPower`, mirroring the
/// `^`-operator path above.
fn simplify_binary_fn(node: &Node, tag: BinaryFunction, a: &Node, b: &Node) -> Node {
    if a.is_number() && b.is_number() && !tag.is_unimplemented() {
        if let Ok(v) = crate::eval::evaluate(&NodeKind::BinaryFn(tag, a.clone(), b.clone())) {
            return number(v);
        }
    }
    if tag == BinaryFunction::Pow {
        if let Some(bv) = b.as_number() {
            if bv.fract() == 0.0 && bv.is_finite() && bv.abs() <= i32::MAX as Real {
                return simplify(&Rc::new(NodeKind::IntegerPower(a.clone(), bv as i32)));
            }
        }
    }
    node.clone()
}

fn simplify_multinary(node: &Node, op: MultinaryOperator, args: &[Node]) -> Node {
    if !matches!(op, MultinaryOperator::Add | MultinaryOperator::Mul) {
        return node.clone();
    }

    // Hoist: flatten children that are the same multinary kind.
    let mut flat: Vec<Node> = Vec::with_capacity(args.len());
    for a in args {
        if let NodeKind::Multinary(child_op, child_args) = a.as_ref() {
            if *child_op == op {
                flat.extend(child_args.iter().cloned());
                continue;
            }
        }
        flat.push(a.clone());
    }

    let (constants, mut non_constants): (Vec<Node>, Vec<Node>) =
        flat.into_iter().partition(|a| a.is_number());
    let folded = if let Some(values) = all_numbers(&constants) {
        values.iter().fold(op.identity(), |acc, v| op.fold(acc, *v))
    } else {
        op.identity()
    };

    if matches!(op, MultinaryOperator::Mul) && folded == 0.0 {
        return number(0.0);
    }

    if non_constants.is_empty() {
        return number(folded);
    }

    if folded != op.identity() {
        non_constants.push(number(folded));
    }

    if non_constants.len() == 1 {
        return non_constants.into_iter().next().unwrap();
    }

    if non_constants.len() == args.len() && non_constants.iter().zip(args).all(|(a, b)| Rc::ptr_eq(a, b)) {
        return node.clone();
    }

    Rc::new(NodeKind::Multinary(op, non_constants))
}

fn simplify_integer_power(node: &Node, x: &Node, n: i32) -> Node {
    if let NodeKind::IntegerPower(y, m) = x.as_ref() {
        return simplify(&Rc::new(NodeKind::IntegerPower(y.clone(), m.saturating_mul(n))));
    }
    if let Some(v) = x.as_number() {
        return number(crate::eval::integer_power(v, n));
    }
    if n == 1 {
        return x.clone();
    }
    if n == 0 {
        return number(1.0);
    }
    node.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BinaryOperator, MultinaryOperator};

    #[test]
    fn folds_constant_arithmetic() {
        let tree = Rc::new(NodeKind::Multinary(
            MultinaryOperator::Add,
            vec![number(1.0), number(2.0), number(3.0)],
        ));
        assert_eq!(simplify(&tree).as_number(), Some(6.0));
    }

    #[test]
    fn drops_subtract_zero() {
        let tree = Rc::new(NodeKind::BinaryOp(
            BinaryOperator::Sub,
            Rc::new(NodeKind::Symbol("x".to_string())),
            number(0.0),
        ));
        let simplified = simplify(&tree);
        assert!(matches!(simplified.as_ref(), NodeKind::Symbol(n) if n == "x"));
    }

    #[test]
    fn pow_with_integer_exponent_canonicalises() {
        let tree = Rc::new(NodeKind::BinaryOp(
            BinaryOperator::Pow,
            Rc::new(NodeKind::Symbol("x".to_string())),
            number(3.0),
        ));
        let simplified = simplify(&tree);
        assert!(matches!(simplified.as_ref(), NodeKind::IntegerPower(_, 3)));
    }

    #[test]
    fn pow_function_call_with_integer_exponent_canonicalises() {
        let tree = Rc::new(NodeKind::BinaryFn(
            BinaryFunction::Pow,
            Rc::new(NodeKind::Symbol("x".to_string())),
            number(4.0),
        ));
        let simplified = simplify(&tree);
        assert!(matches!(simplified.as_ref(), NodeKind::IntegerPower(_, 4)));
    }

    #[test]
    fn is_idempotent_by_structural_hash() {
        let tree = Rc::new(NodeKind::Multinary(
            MultinaryOperator::Add,
            vec![
                number(1.0),
                Rc::new(NodeKind::Multinary(MultinaryOperator::Add, vec![number(2.0), number(3.0)])),
            ],
        ));
        let once = simplify(&tree);
        let twice = simplify(&once);
        assert_eq!(
            crate::transform::hash::structural_hash(&once),
            crate::transform::hash::structural_hash(&twice)
        );
    }
}
