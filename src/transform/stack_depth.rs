// Computes the peak evaluation-stack depth of a subtree: required before
// any stack-based lowering (bytecode, native JIT) to size the stack/spill
// frame up front.

use crate::error::{Error, Result};
use crate::node::NodeKind;

/// `current` is the net stack effect so far; `maximum` is the high-water
/// mark observed along the way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Depth {
    pub current: i64,
    pub maximum: i64,
}

impl Depth {
    fn leaf() -> Depth {
        Depth { current: 1, maximum: 1 }
    }
}

pub fn analyze(node: &NodeKind) -> Result<Depth> {
    let depth = walk(node)?;
    Ok(depth)
}

fn walk(node: &NodeKind) -> Result<Depth> {
    match node {
        NodeKind::Empty => Err(Error::InvalidNode),
        NodeKind::Number(_) | NodeKind::Reference(_) | NodeKind::ArrayReference(_) | NodeKind::Symbol(_) | NodeKind::Local(_) => {
            Ok(Depth::leaf())
        }
        NodeKind::UnaryOp(_, a) | NodeKind::UnaryFn(_, a) | NodeKind::IntegerPower(a, _) => walk(a),
        NodeKind::BinaryOp(_, a, b) | NodeKind::BinaryFn(_, a, b) => {
            let da = walk(a)?;
            let db = walk(b)?;
            let current = da.current + db.current - 1;
            let maximum = da.maximum.max(da.current + db.maximum);
            Ok(Depth { current, maximum })
        }
        NodeKind::Multinary(_, args) => {
            if args.is_empty() {
                return Err(Error::Lowering("multinary node with no children".to_string()));
            }
            let mut current = 0i64;
            let mut maximum = 0i64;
            for (i, a) in args.iter().enumerate() {
                let da = walk(a)?;
                maximum = maximum.max(current + da.maximum);
                current += da.current;
                if i > 0 {
                    current -= 1;
                }
            }
            Ok(Depth { current, maximum })
        }
        NodeKind::Conditional(c, t, e) => {
            let dc = walk(c)?;
            let base_current = dc.current - 1;
            let dt = walk(t)?;
            let de = walk(e)?;
            if dt.current != de.current {
                return Err(Error::Lowering(
                    "malformed conditional: branches disagree on net stack effect".to_string(),
                ));
            }
            let maximum = dc
                .maximum
                .max(base_current + dt.maximum)
                .max(base_current + de.maximum);
            Ok(Depth {
                current: base_current + dt.current,
                maximum,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BinaryOperator, MultinaryOperator};
    use crate::node::NodeKind;
    use std::rc::Rc;

    #[test]
    fn leaf_has_depth_one() {
        let d = analyze(&NodeKind::Number(1.0)).unwrap();
        assert_eq!(d, Depth { current: 1, maximum: 1 });
    }

    #[test]
    fn binary_op_nets_to_one() {
        let tree = NodeKind::BinaryOp(
            BinaryOperator::Sub,
            Rc::new(NodeKind::Number(1.0)),
            Rc::new(NodeKind::Number(2.0)),
        );
        let d = analyze(&tree).unwrap();
        assert_eq!(d.current, 1);
        assert_eq!(d.maximum, 2);
    }

    #[test]
    fn multinary_three_children_peaks_at_three() {
        let tree = NodeKind::Multinary(
            MultinaryOperator::Add,
            vec![
                Rc::new(NodeKind::Number(1.0)),
                Rc::new(NodeKind::Number(2.0)),
                Rc::new(NodeKind::Number(3.0)),
            ],
        );
        let d = analyze(&tree).unwrap();
        assert_eq!(d.current, 1);
        assert_eq!(d.maximum, 3);
    }

    #[test]
    fn conditional_requires_matching_branch_effect() {
        let c = Rc::new(NodeKind::Number(1.0));
        let t = Rc::new(NodeKind::Number(2.0));
        let e = Rc::new(NodeKind::Multinary(
            MultinaryOperator::Add,
            vec![Rc::new(NodeKind::Number(3.0)), Rc::new(NodeKind::Number(4.0))],
        ));
        // `t` nets +1, `e` also nets +1 (two leaves folded by multinary) -- matches.
        let tree = NodeKind::Conditional(c, t, e);
        assert!(analyze(&tree).is_ok());
    }
}
