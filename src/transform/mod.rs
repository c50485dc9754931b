// Transform framework: visitors over the AST, one dispatch function per
// pass with a private helper per node variant (mirrors the `eval_expr` /
// `eval_*` shape of a conventional tree-walking visitor). Because nodes are
// immutable `Rc` handles, "rewriting" a node just means returning a new
// handle; the persistent-tree discipline is enforced by never matching on
// `Rc::get_mut`.

pub mod differentiate;
pub mod hash;
pub mod simplify;
pub mod stack_depth;
