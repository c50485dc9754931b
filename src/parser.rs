// Shunting-yard parser: translates a token stream into an AST, resolving
// identifiers against the engine's provider/constant registries as it goes
// and validating function arity and bracket matching along the way.

use std::collections::HashMap;
use std::rc::Rc;

use crate::catalog::{BinaryOperator, FunctionTag, MultinaryOperator, UnaryOperator};
use crate::error::{Error, Result};
use crate::function::Function;
use crate::node::{LocalSlot, Node, NodeKind, Real, ValueProvider};
use crate::token::{BracketKind, Token, TokenKind, Tokenizer};

/// Owns the provider/constant registries a host builds up before parsing
/// expressions against them. Cheap to keep around; `parse` may be called
/// repeatedly.
#[derive(Default)]
pub struct Engine {
    providers: HashMap<String, ValueProvider>,
    constants: HashMap<String, Real>,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::default()
    }

    /// Binds `name` to the external `Real` at `addr`. The caller must keep
    /// `addr` valid for as long as any parsed `Function` referencing it, or
    /// any evaluator built from one, is alive.
    pub fn register_provider(&mut self, name: &str, addr: *const Real) {
        self.providers.insert(
            name.to_string(),
            ValueProvider {
                addr,
                name: Some(name.to_string()),
            },
        );
    }

    pub fn register_constant(&mut self, name: &str, value: Real) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn parse(&self, source: &str) -> Result<Function> {
        log::trace!("parsing {:?}", source);
        let mut parser = Parser::new(source, &self.providers, &self.constants);
        let root = parser.run()?;
        Ok(Function::new(root, self.providers.clone()))
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Assoc {
    Left,
    Right,
}

#[derive(Clone)]
enum OpEntry {
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    Multinary(MultinaryOperator),
    Function(FunctionTag),
    Bracket(BracketKind),
}

impl OpEntry {
    fn precedence(&self) -> Option<u8> {
        match self {
            OpEntry::Unary(_) => Some(UnaryOperator::PRECEDENCE),
            OpEntry::Binary(op) => Some(op.precedence()),
            OpEntry::Multinary(op) => Some(op.precedence()),
            OpEntry::Function(_) | OpEntry::Bracket(_) => None,
        }
    }

    fn assoc(&self) -> Assoc {
        match self {
            OpEntry::Unary(_) => Assoc::Right,
            _ => Assoc::Left,
        }
    }
}

/// What the previous significant token was, for unary/binary disambiguation
/// and the "consecutive operand" / "closing bracket after operator" checks.
#[derive(Clone, Copy, PartialEq)]
enum Prev {
    Start,
    Operand,
    ClosingBracket,
    OpeningBracket(BracketKind),
    OperatorOrComma,
}

struct Parser<'a> {
    source: &'a str,
    tokenizer: Tokenizer<'a>,
    providers: &'a HashMap<String, ValueProvider>,
    constants: &'a HashMap<String, Real>,
    locals: HashMap<String, usize>,
    output: Vec<Node>,
    ops: Vec<OpEntry>,
    argcounts: Vec<usize>,
    prev: Prev,
}

impl<'a> Parser<'a> {
    fn new(
        source: &'a str,
        providers: &'a HashMap<String, ValueProvider>,
        constants: &'a HashMap<String, Real>,
    ) -> Parser<'a> {
        Parser {
            source,
            tokenizer: Tokenizer::new(source),
            providers,
            constants,
            locals: HashMap::new(),
            output: vec![],
            ops: vec![],
            argcounts: vec![],
            prev: Prev::Start,
        }
    }

    fn err(&self, offset: usize, message: impl Into<String>) -> Error {
        Error::syntax(self.source, offset, message)
    }

    fn run(&mut self) -> Result<Node> {
        loop {
            let tok = self.tokenizer.next();
            if tok.kind == TokenKind::End {
                self.drain_to_end(tok.offset)?;
                break;
            }
            self.step(tok)?;
        }
        if self.output.len() != 1 {
            return Err(self.err(self.source.len(), "incomplete expression"));
        }
        let root = self.output.pop().unwrap();
        if !root.is_valid() {
            return Err(Error::InvalidNode);
        }
        Ok(root)
    }

    fn step(&mut self, tok: Token) -> Result<()> {
        let offset = tok.offset;
        match tok.kind {
            TokenKind::Invalid(c) => {
                return Err(self.err(offset, format!("unrecognised character `{}`", c)));
            }
            TokenKind::Number(v) => {
                self.check_not_consecutive_operand(offset)?;
                self.output.push(Rc::new(NodeKind::Number(v)));
                self.prev = Prev::Operand;
            }
            TokenKind::Symbol(name) => {
                self.check_not_consecutive_operand(offset)?;
                let node = self.resolve_symbol(&name);
                self.output.push(node);
                self.prev = Prev::Operand;
            }
            TokenKind::Function(name) => {
                let tag = FunctionTag::lookup(&name)
                    .ok_or_else(|| self.err(offset, format!("unknown function `{}`", name)))?;
                self.ops.push(OpEntry::Function(tag));
                self.argcounts.push(1);
                self.prev = Prev::OperatorOrComma;
            }
            TokenKind::Bracket(kind, true) => {
                self.ops.push(OpEntry::Bracket(kind));
                self.prev = Prev::OpeningBracket(kind);
            }
            TokenKind::Bracket(kind, false) => {
                self.close_bracket(kind, offset)?;
                self.prev = Prev::ClosingBracket;
            }
            TokenKind::Comma => {
                self.comma(offset)?;
                self.prev = Prev::OperatorOrComma;
            }
            TokenKind::Operator(spelling) => {
                self.operator(&spelling, offset)?;
                self.prev = Prev::OperatorOrComma;
            }
            TokenKind::End => unreachable!(),
        }
        Ok(())
    }

    fn check_not_consecutive_operand(&self, offset: usize) -> Result<()> {
        if self.prev == Prev::Operand || self.prev == Prev::ClosingBracket {
            return Err(self.err(offset, "unexpected operand (missing operator)"));
        }
        Ok(())
    }

    fn resolve_symbol(&mut self, name: &str) -> Node {
        if let Some(provider) = self.providers.get(name) {
            return Rc::new(NodeKind::Reference(provider.clone()));
        }
        if let Some(value) = self.constants.get(name) {
            return Rc::new(NodeKind::Number(*value));
        }
        let next_id = self.locals.len();
        let id = *self.locals.entry(name.to_string()).or_insert(next_id);
        Rc::new(NodeKind::Local(LocalSlot {
            id,
            name: name.to_string(),
        }))
    }

    fn is_unary_position(&self) -> bool {
        !matches!(self.prev, Prev::Operand | Prev::ClosingBracket)
    }

    fn operator(&mut self, spelling: &str, offset: usize) -> Result<()> {
        if self.is_unary_position() {
            let op = UnaryOperator::from_spelling(spelling)
                .ok_or_else(|| self.err(offset, format!("`{}` is not valid here", spelling)))?;
            self.push_operator(OpEntry::Unary(op));
            return Ok(());
        }

        let entry = match spelling {
            "+" => OpEntry::Multinary(MultinaryOperator::Add),
            "*" => OpEntry::Multinary(MultinaryOperator::Mul),
            _ => {
                let op = BinaryOperator::from_spelling(spelling).ok_or_else(|| {
                    self.err(offset, format!("`{}` is not a valid binary operator", spelling))
                })?;
                OpEntry::Binary(op)
            }
        };
        self.push_operator(entry);
        Ok(())
    }

    fn push_operator(&mut self, entry: OpEntry) {
        let cur_prec = entry.precedence().expect("operator entries always carry precedence");
        while let Some(top) = self.ops.last() {
            let Some(top_prec) = top.precedence() else { break };
            let pop = match top.assoc() {
                Assoc::Left => top_prec <= cur_prec,
                Assoc::Right => top_prec < cur_prec,
            };
            if !pop {
                break;
            }
            self.pop_operator_to_output().expect("popped entry carries precedence and enough operands");
        }
        self.ops.push(entry);
    }

    /// Pops one operator/function entry from `ops`, consumes its operands
    /// from `output`, and pushes the resulting node.
    fn pop_operator_to_output(&mut self) -> Result<()> {
        let entry = self.ops.pop().expect("caller checked non-empty");
        let node = match entry {
            OpEntry::Unary(op) => {
                let a = self.pop_output()?;
                Rc::new(NodeKind::UnaryOp(op, a))
            }
            OpEntry::Binary(op) => {
                let b = self.pop_output()?;
                let a = self.pop_output()?;
                Rc::new(NodeKind::BinaryOp(op, a, b))
            }
            OpEntry::Multinary(op) => {
                let b = self.pop_output()?;
                let a = self.pop_output()?;
                Rc::new(NodeKind::Multinary(op, vec![a, b]))
            }
            OpEntry::Function(tag) => {
                let argcount = self.argcounts.pop().unwrap_or(0);
                return self.emit_function(tag, argcount);
            }
            OpEntry::Bracket(_) => return Ok(()),
        };
        self.output.push(node);
        Ok(())
    }

    fn emit_function(&mut self, tag: FunctionTag, argcount: usize) -> Result<()> {
        if argcount != tag.arity() {
            return Err(self.err(
                self.source.len(),
                format!("wrong argument count: expected {}, got {}", tag.arity(), argcount),
            ));
        }
        let node = match tag {
            FunctionTag::Unary(f) => {
                let a = self.pop_output()?;
                Rc::new(NodeKind::UnaryFn(f, a))
            }
            FunctionTag::Binary(f) => {
                let b = self.pop_output()?;
                let a = self.pop_output()?;
                Rc::new(NodeKind::BinaryFn(f, a, b))
            }
            FunctionTag::Conditional => {
                let e = self.pop_output()?;
                let t = self.pop_output()?;
                let c = self.pop_output()?;
                Rc::new(NodeKind::Conditional(c, t, e))
            }
        };
        self.output.push(node);
        Ok(())
    }

    fn pop_output(&mut self) -> Result<Node> {
        self.output
            .pop()
            .ok_or_else(|| self.err(self.source.len(), "missing operand"))
    }

    fn comma(&mut self, offset: usize) -> Result<()> {
        loop {
            match self.ops.last() {
                None => return Err(self.err(offset, "comma outside of a bracketed expression")),
                Some(OpEntry::Bracket(_)) => break,
                Some(_) => {
                    self.pop_operator_to_output()?;
                }
            }
        }
        match self.argcounts.last_mut() {
            Some(n) => *n += 1,
            None => return Err(self.err(offset, "comma outside of a function call")),
        }
        Ok(())
    }

    fn close_bracket(&mut self, kind: BracketKind, offset: usize) -> Result<()> {
        if self.prev == Prev::OperatorOrComma {
            return Err(self.err(offset, "unexpected closing bracket"));
        }

        if self.prev == Prev::OpeningBracket(kind) {
            // Empty pair: only legal directly after a function token.
            self.ops.pop(); // discard the opening bracket
            match self.ops.last() {
                Some(OpEntry::Function(tag)) => {
                    let tag = *tag;
                    self.argcounts.pop();
                    self.ops.pop();
                    return self.emit_function(tag, 0);
                }
                _ => return Err(self.err(offset, "empty bracket pair is not a function call")),
            }
        }

        loop {
            match self.ops.last() {
                None => return Err(self.err(offset, "unmatched closing bracket")),
                Some(OpEntry::Bracket(open_kind)) => {
                    if *open_kind != kind {
                        return Err(self.err(offset, "mismatched bracket kind"));
                    }
                    self.ops.pop();
                    break;
                }
                Some(_) => {
                    self.pop_operator_to_output()?;
                }
            }
        }

        if let Some(OpEntry::Function(tag)) = self.ops.last() {
            let tag = *tag;
            let argcount = self.argcounts.pop().unwrap_or(0);
            self.ops.pop();
            self.emit_function(tag, argcount)?;
        }
        Ok(())
    }

    fn drain_to_end(&mut self, offset: usize) -> Result<()> {
        while let Some(top) = self.ops.last() {
            if matches!(top, OpEntry::Bracket(_)) {
                return Err(self.err(offset, "unmatched opening bracket"));
            }
            self.pop_operator_to_output()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(engine: &Engine, text: &str) -> Real {
        let f = engine.parse(text).expect("parse");
        crate::eval::evaluate(&f.root()).expect("eval")
    }

    #[test]
    fn arithmetic_precedence() {
        let engine = Engine::new();
        assert!((eval(&engine, "1+2*3") - 7.0).abs() < 1e-9);
    }

    #[test]
    fn provider_binding() {
        let mut engine = Engine::new();
        let c: Real = 2.0;
        engine.register_provider("c", &c as *const Real);
        assert!((eval(&engine, "1 + c + 2*c + 3*c^3") - 31.0).abs() < 1e-9);
    }

    #[test]
    fn empty_unary_function_call_is_error() {
        let engine = Engine::new();
        assert!(engine.parse("sin()").is_err());
    }

    #[test]
    fn unary_operator_position_error() {
        let engine = Engine::new();
        assert!(engine.parse("*-x").is_err());
    }

    #[test]
    fn mismatched_bracket_errors() {
        let engine = Engine::new();
        assert!(engine.parse("(1+2]").is_err());
    }

    #[test]
    fn conditional_nested() {
        let mut engine = Engine::new();
        let c: Real = 0.0;
        engine.register_provider("c", &c as *const Real);
        assert!((eval(&engine, "if(c<-0.5, 10, if(c>0.2, 20, 30))") - 30.0).abs() < 1e-9);
    }

    #[test]
    fn deeply_nested_parens() {
        let engine = Engine::new();
        assert!((eval(&engine, "((((5))))") - 5.0).abs() < 1e-9);
    }
}
