// The top-level object a host interacts with: a root node plus the set of
// providers it was parsed against. Cheap to clone -- the AST is shared.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::node::{Node, ValueProvider};
use crate::transform::{differentiate, simplify};

#[derive(Clone)]
pub struct Function {
    root: Node,
    providers: HashMap<String, ValueProvider>,
}

impl Function {
    pub fn new(root: Node, providers: HashMap<String, ValueProvider>) -> Function {
        Function { root, providers }
    }

    pub fn root(&self) -> Node {
        self.root.clone()
    }

    pub fn providers(&self) -> &HashMap<String, ValueProvider> {
        &self.providers
    }

    /// The symbolic derivative with respect to the named, registered
    /// provider. The result shares `self`'s provider set.
    pub fn differentiate(&self, provider_name: &str) -> Result<Function> {
        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| Error::UnknownIdentifier(provider_name.to_string()))?;
        let derivative = differentiate::differentiate(&self.root, provider)?;
        Ok(Function {
            root: derivative,
            providers: self.providers.clone(),
        })
    }

    /// Alias matching the host API's `function.D(provider)` naming.
    pub fn d(&self, provider_name: &str) -> Result<Function> {
        self.differentiate(provider_name)
    }

    pub fn simplify(&self) -> Function {
        Function {
            root: simplify::simplify(&self.root),
            providers: self.providers.clone(),
        }
    }

    pub fn format(&self) -> String {
        crate::format::format(&self.root)
    }

    pub fn format_tree(&self) -> String {
        crate::format::format_tree(&self.root, "")
    }
}
