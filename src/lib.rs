// symbolic_math: a symbolic-mathematics toolkit for scalar real-valued
// expressions -- parsing, AST rewrites (simplify/differentiate), and
// multiple evaluator back-ends (tree-walker, bytecode, native JIT, C source).
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

#[macro_use]
extern crate lazy_static;

pub mod backend;
pub mod catalog;
pub mod error;
pub mod eval;
pub mod format;
pub mod function;
pub mod node;
pub mod parser;
pub mod token;
pub mod transform;

pub use error::{Error, Result};
pub use function::Function;
pub use parser::Engine;

