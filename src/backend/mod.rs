// Back-end abstraction: turns a simplified AST into a callable `() -> Real`.
// A registry maps a back-end name to a constructor plus a numeric priority
// (higher wins); `best_compiler` and `build_compiler` implement the factory
// described for this toolkit. Registration is static, built once behind a
// `lazy_static`.

pub mod bytecode;
pub mod csource;
pub mod jit;

use lazy_static::lazy_static;

use crate::error::Result;
use crate::node::{Node, Real};

/// A compiled evaluator. Not re-entrant: an instance owns its scratch stack
/// (or, for the C-source back-end, its loaded library) and is not safe to
/// call from more than one thread concurrently.
pub trait Evaluator {
    fn call(&mut self) -> Real;
}

type Constructor = fn(&Node) -> Result<Box<dyn Evaluator>>;

struct BackendEntry {
    name: &'static str,
    priority: i32,
    constructor: Constructor,
}

lazy_static! {
    static ref REGISTRY: Vec<BackendEntry> = vec![
        BackendEntry {
            name: "bytecode",
            priority: 1,
            constructor: bytecode::build,
        },
        BackendEntry {
            name: "csource",
            priority: 10,
            constructor: csource::build,
        },
        BackendEntry {
            name: "jit",
            priority: 100,
            constructor: jit::build,
        },
    ];
}

/// The name of the highest-priority registered back-end.
pub fn best_compiler() -> &'static str {
    REGISTRY
        .iter()
        .max_by_key(|e| e.priority)
        .map(|e| e.name)
        .expect("registry is never empty")
}

/// Builds an evaluator for `node` using the named back-end.
pub fn build_compiler(name: &str, node: &Node) -> Result<Box<dyn Evaluator>> {
    match REGISTRY.iter().find(|e| e.name == name) {
        Some(entry) => {
            log::trace!("building evaluator with back-end `{}`", name);
            (entry.constructor)(node)
        }
        None => Err(crate::error::Error::Unsupported(format!("no such back-end: {}", name))),
    }
}

/// Builds an evaluator using whichever back-end `best_compiler` selects.
pub fn build_best(node: &Node) -> Result<Box<dyn Evaluator>> {
    build_compiler(best_compiler(), node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jit_outranks_everything() {
        assert_eq!(best_compiler(), "jit");
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let node: Node = std::rc::Rc::new(crate::node::NodeKind::Number(1.0));
        assert!(build_compiler("nonexistent", &node).is_err());
    }
}
