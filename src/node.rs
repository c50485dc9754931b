// The expression AST: a tagged sum of node variants behind a reference
// counted, shared handle. Node identity is structural, not pointer
// identity -- sharing subtrees is permitted, and no variant is ever
// mutated in place through a shared handle. Transforms build new handles
// and replace the ones they hold; they never reach through `Rc` to mutate
// a node another holder can see (see `crate::transform`).

use std::fmt;
use std::rc::Rc;

use crate::catalog::{BinaryFunction, BinaryOperator, MultinaryOperator, UnaryFunction, UnaryOperator};

/// IEEE-754 double precision, the only numeric domain the toolkit models.
pub type Real = f64;

/// A shared handle to a node. Cheap to clone; clones alias the same data.
pub type Node = Rc<NodeKind>;

/// An external `Real` bound by address. Two providers are "the same" iff
/// they point at the same address -- this is what differentiation and
/// stack-machine variable deduplication key off of.
///
/// # Safety
/// The pointee must outlive every `Node`/evaluator built from it; the host
/// registering the provider is responsible for that invariant (see
/// `Engine::register_provider`).
#[derive(Clone)]
pub struct ValueProvider {
    pub addr: *const Real,
    pub name: Option<String>,
}

impl ValueProvider {
    pub fn read(&self) -> Real {
        unsafe { *self.addr }
    }
}

impl fmt::Debug for ValueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueProvider")
            .field("addr", &self.addr)
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for ValueProvider {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr, other.addr)
    }
}

/// `base[index]` read through two external addresses: the array base and
/// an external integer index. Two instances are "the same provider" iff
/// both addresses match.
#[derive(Clone)]
pub struct ArrayValueProvider {
    pub base: *const Real,
    pub index: *const i64,
    pub name: Option<String>,
}

impl ArrayValueProvider {
    pub fn read(&self) -> Real {
        unsafe {
            let i = *self.index;
            *self.base.offset(i as isize)
        }
    }
}

impl fmt::Debug for ArrayValueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayValueProvider")
            .field("base", &self.base)
            .field("index", &self.index)
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for ArrayValueProvider {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.base, other.base) && std::ptr::eq(self.index, other.index)
    }
}

/// A function-scoped local variable slot, reserved for the `:=` operator.
/// Parsing allocates these; evaluation and lowering reject them (see
/// `DESIGN.md` -- local variables are an unimplemented corner, same as in
/// the source library).
#[derive(Clone, Debug, PartialEq)]
pub struct LocalSlot {
    pub id: usize,
    pub name: String,
}

/// The node variants. Every child slot is itself a `Node` and is therefore
/// always valid (non-`Empty`) by construction -- the `Empty` variant only
/// ever appears as a standalone root before a real tree is built.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Empty,
    Number(Real),
    Reference(ValueProvider),
    ArrayReference(ArrayValueProvider),
    Symbol(String),
    Local(LocalSlot),
    UnaryOp(UnaryOperator, Node),
    BinaryOp(BinaryOperator, Node, Node),
    Multinary(MultinaryOperator, Vec<Node>),
    UnaryFn(UnaryFunction, Node),
    BinaryFn(BinaryFunction, Node, Node),
    Conditional(Node, Node, Node),
    /// `x^n` for signed integer `n` -- a canonical post-simplification form
    /// distinct from `pow(x, n)`, kept separate to enable
    /// exponentiation-by-squaring lowering and cleaner derivatives.
    IntegerPower(Node, i32),
}

impl NodeKind {
    pub fn number(value: Real) -> Node {
        Rc::new(NodeKind::Number(value))
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, NodeKind::Empty)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, NodeKind::Number(_))
    }

    /// The constant value of this node, if it is a number.
    pub fn as_number(&self) -> Option<Real> {
        match self {
            NodeKind::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Number of direct children. Matches the C++ source's `size()`.
    pub fn arity(&self) -> usize {
        match self {
            NodeKind::Empty
            | NodeKind::Number(_)
            | NodeKind::Reference(_)
            | NodeKind::ArrayReference(_)
            | NodeKind::Symbol(_)
            | NodeKind::Local(_) => 0,
            NodeKind::UnaryOp(_, _) | NodeKind::UnaryFn(_, _) | NodeKind::IntegerPower(_, _) => 1,
            NodeKind::BinaryOp(_, _, _) | NodeKind::BinaryFn(_, _, _) => 2,
            NodeKind::Conditional(_, _, _) => 3,
            NodeKind::Multinary(_, args) => args.len(),
        }
    }

    pub fn children(&self) -> Vec<Node> {
        match self {
            NodeKind::Empty
            | NodeKind::Number(_)
            | NodeKind::Reference(_)
            | NodeKind::ArrayReference(_)
            | NodeKind::Symbol(_)
            | NodeKind::Local(_) => vec![],
            NodeKind::UnaryOp(_, a) | NodeKind::UnaryFn(_, a) | NodeKind::IntegerPower(a, _) => {
                vec![a.clone()]
            }
            NodeKind::BinaryOp(_, a, b) | NodeKind::BinaryFn(_, a, b) => vec![a.clone(), b.clone()],
            NodeKind::Conditional(c, t, e) => vec![c.clone(), t.clone(), e.clone()],
            NodeKind::Multinary(_, args) => args.clone(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::format::format(self))
    }
}
