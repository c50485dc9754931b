// Structural hashing: used to check that `simplify` is idempotent (the
// fixpoint of simplifying twice has the same structural hash as simplifying
// once) without requiring a full structural `Eq` on floating-point payloads.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::node::NodeKind;

pub fn structural_hash(node: &NodeKind) -> u64 {
    let mut hasher = DefaultHasher::new();
    write_hash(node, &mut hasher);
    hasher.finish()
}

fn write_hash(node: &NodeKind, hasher: &mut DefaultHasher) {
    match node {
        NodeKind::Empty => 0u8.hash(hasher),
        NodeKind::Number(v) => {
            1u8.hash(hasher);
            v.to_bits().hash(hasher);
        }
        NodeKind::Reference(p) => {
            2u8.hash(hasher);
            (p.addr as usize).hash(hasher);
        }
        NodeKind::ArrayReference(p) => {
            3u8.hash(hasher);
            (p.base as usize).hash(hasher);
            (p.index as usize).hash(hasher);
        }
        NodeKind::Symbol(name) => {
            4u8.hash(hasher);
            name.hash(hasher);
        }
        NodeKind::Local(slot) => {
            5u8.hash(hasher);
            slot.id.hash(hasher);
        }
        NodeKind::UnaryOp(op, a) => {
            6u8.hash(hasher);
            op.hash(hasher);
            write_hash(a, hasher);
        }
        NodeKind::BinaryOp(op, a, b) => {
            7u8.hash(hasher);
            op.hash(hasher);
            write_hash(a, hasher);
            write_hash(b, hasher);
        }
        NodeKind::Multinary(op, args) => {
            8u8.hash(hasher);
            op.hash(hasher);
            args.len().hash(hasher);
            for a in args {
                write_hash(a, hasher);
            }
        }
        NodeKind::UnaryFn(tag, a) => {
            9u8.hash(hasher);
            tag.hash(hasher);
            write_hash(a, hasher);
        }
        NodeKind::BinaryFn(tag, a, b) => {
            10u8.hash(hasher);
            tag.hash(hasher);
            write_hash(a, hasher);
            write_hash(b, hasher);
        }
        NodeKind::Conditional(c, t, e) => {
            11u8.hash(hasher);
            write_hash(c, hasher);
            write_hash(t, hasher);
            write_hash(e, hasher);
        }
        NodeKind::IntegerPower(a, n) => {
            12u8.hash(hasher);
            n.hash(hasher);
            write_hash(a, hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use std::rc::Rc;

    #[test]
    fn equal_structures_hash_equal() {
        let a = NodeKind::Number(2.0);
        let b = NodeKind::Number(2.0);
        assert_eq!(structural_hash(&a), structural_hash(&b));

        let sum_a = NodeKind::Multinary(
            crate::catalog::MultinaryOperator::Add,
            vec![Rc::new(NodeKind::Number(1.0)), Rc::new(NodeKind::Number(2.0))],
        );
        let sum_b = NodeKind::Multinary(
            crate::catalog::MultinaryOperator::Add,
            vec![Rc::new(NodeKind::Number(1.0)), Rc::new(NodeKind::Number(2.0))],
        );
        assert_eq!(structural_hash(&sum_a), structural_hash(&sum_b));
    }

    #[test]
    fn different_structures_usually_differ() {
        let a = NodeKind::Number(2.0);
        let b = NodeKind::Number(3.0);
        assert_ne!(structural_hash(&a), structural_hash(&b));
    }
}
