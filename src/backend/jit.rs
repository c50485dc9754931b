// Native JIT back-end: lowers the AST to Cranelift IR and compiles it to
// machine code with `cranelift-jit`.
//
// Cranelift's instruction set has no transcendental math, integer-to-float
// remainder, or comparison-to-float-boolean conversion built in, so simple
// arithmetic (add/sub/mul/div/negate, and exponent-known integer powers) is
// lowered to native instructions, while every operator or function table
// entry (`plog`, `sin`, comparisons, `%`, ...) is lowered to a call into one
// of four trampoline functions that defer to the same dispatch tables the
// tree-walker and bytecode back-end use (`crate::eval`). This keeps the
// three back-ends provably in agreement: they all bottom out in the same
// Rust arithmetic.
//
// Provider reads are not snapshotted: each load bakes the provider's address
// as an absolute literal and reads through it at call time, the same timing
// the tree-walking evaluator uses (unlike the bytecode back-end's call-start
// snapshot -- see `DESIGN.md`).

use std::mem;

use cranelift::prelude::*;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};

use crate::catalog::{BinaryFunction, BinaryOperator, MultinaryOperator, UnaryFunction, UnaryOperator};
use crate::error::{Error, Result};
use crate::eval::{eval_binary_fn, eval_binary_op, eval_unary_fn, eval_unary_op};
use crate::node::{Node, NodeKind, Real};

use super::Evaluator;

extern "C" fn unary_op_trampoline(tag: i32, a: Real) -> Real {
    eval_unary_op(unary_op_from_code(tag), a).unwrap_or(Real::NAN)
}

extern "C" fn binary_op_trampoline(tag: i32, a: Real, b: Real) -> Real {
    eval_binary_op(binary_op_from_code(tag), a, b).unwrap_or(Real::NAN)
}

extern "C" fn unary_fn_trampoline(tag: i32, a: Real) -> Real {
    eval_unary_fn(unary_fn_from_code(tag), a).unwrap_or(Real::NAN)
}

extern "C" fn binary_fn_trampoline(tag: i32, a: Real, b: Real) -> Real {
    eval_binary_fn(binary_fn_from_code(tag), a, b).unwrap_or(Real::NAN)
}

fn unary_op_code(op: UnaryOperator) -> i32 {
    match op {
        UnaryOperator::Plus => 0,
        UnaryOperator::Minus => 1,
        UnaryOperator::Faculty => 2,
        UnaryOperator::Not => 3,
    }
}

fn unary_op_from_code(code: i32) -> UnaryOperator {
    match code {
        0 => UnaryOperator::Plus,
        1 => UnaryOperator::Minus,
        2 => UnaryOperator::Faculty,
        _ => UnaryOperator::Not,
    }
}

fn binary_op_code(op: BinaryOperator) -> i32 {
    use BinaryOperator::*;
    match op {
        Sub => 0,
        Div => 1,
        Mod => 2,
        Pow => 3,
        Or => 4,
        And => 5,
        Lt => 6,
        Gt => 7,
        Le => 8,
        Ge => 9,
        Eq => 10,
        Ne => 11,
        Assign => 12,
        List => 13,
    }
}

fn binary_op_from_code(code: i32) -> BinaryOperator {
    use BinaryOperator::*;
    match code {
        0 => Sub,
        1 => Div,
        2 => Mod,
        3 => Pow,
        4 => Or,
        5 => And,
        6 => Lt,
        7 => Gt,
        8 => Le,
        9 => Ge,
        10 => Eq,
        11 => Ne,
        12 => Assign,
        _ => List,
    }
}

fn unary_fn_code(tag: UnaryFunction) -> i32 {
    // Stable within one lowering; never persisted, so a simple enumeration
    // of `from_spelling`'s match arms is sufficient.
    use UnaryFunction::*;
    match tag {
        Abs => 0,
        Acos => 1,
        Acosh => 2,
        Arg => 3,
        Asin => 4,
        Asinh => 5,
        Atan => 6,
        Atanh => 7,
        Cbrt => 8,
        Ceil => 9,
        Conj => 10,
        Cos => 11,
        Cosh => 12,
        Cot => 13,
        Csc => 14,
        Erf => 15,
        Erfc => 16,
        Exp => 17,
        Exp2 => 18,
        Floor => 19,
        Imag => 20,
        Int => 21,
        Log => 22,
        Log10 => 23,
        Log2 => 24,
        Real => 25,
        Sec => 26,
        Sin => 27,
        Sinh => 28,
        Sqrt => 29,
        T => 30,
        Tan => 31,
        Tanh => 32,
        Trunc => 33,
    }
}

fn unary_fn_from_code(code: i32) -> UnaryFunction {
    use UnaryFunction::*;
    const TABLE: [UnaryFunction; 34] = [
        Abs, Acos, Acosh, Arg, Asin, Asinh, Atan, Atanh, Cbrt, Ceil, Conj, Cos, Cosh, Cot, Csc, Erf, Erfc, Exp,
        Exp2, Floor, Imag, Int, Log, Log10, Log2, Real, Sec, Sin, Sinh, Sqrt, T, Tan, Tanh, Trunc,
    ];
    TABLE[code as usize]
}

fn binary_fn_code(tag: BinaryFunction) -> i32 {
    use BinaryFunction::*;
    match tag {
        Atan2 => 0,
        Hypot => 1,
        Min => 2,
        Max => 3,
        Plog => 4,
        Polar => 5,
        Pow => 6,
    }
}

fn binary_fn_from_code(code: i32) -> BinaryFunction {
    use BinaryFunction::*;
    const TABLE: [BinaryFunction; 7] = [Atan2, Hypot, Min, Max, Plog, Polar, Pow];
    TABLE[code as usize]
}

struct Trampolines {
    unary_op: FuncId,
    binary_op: FuncId,
    unary_fn: FuncId,
    binary_fn: FuncId,
}

fn declare_trampolines(module: &mut JITModule) -> Result<Trampolines> {
    let mut unary_sig = module.make_signature();
    unary_sig.params.push(AbiParam::new(types::I32));
    unary_sig.params.push(AbiParam::new(types::F64));
    unary_sig.returns.push(AbiParam::new(types::F64));

    let mut binary_sig = module.make_signature();
    binary_sig.params.push(AbiParam::new(types::I32));
    binary_sig.params.push(AbiParam::new(types::F64));
    binary_sig.params.push(AbiParam::new(types::F64));
    binary_sig.returns.push(AbiParam::new(types::F64));

    let unary_op = module
        .declare_function("sm_unary_op", Linkage::Import, &unary_sig)
        .map_err(|e| Error::Runtime(e.to_string()))?;
    let binary_op = module
        .declare_function("sm_binary_op", Linkage::Import, &binary_sig)
        .map_err(|e| Error::Runtime(e.to_string()))?;
    let unary_fn = module
        .declare_function("sm_unary_fn", Linkage::Import, &unary_sig)
        .map_err(|e| Error::Runtime(e.to_string()))?;
    let binary_fn = module
        .declare_function("sm_binary_fn", Linkage::Import, &binary_sig)
        .map_err(|e| Error::Runtime(e.to_string()))?;

    Ok(Trampolines {
        unary_op,
        binary_op,
        unary_fn,
        binary_fn,
    })
}

struct Lowerer<'a> {
    builder: FunctionBuilder<'a>,
    module: &'a mut JITModule,
    trampolines: &'a Trampolines,
}

impl<'a> Lowerer<'a> {
    fn call_unary_op(&mut self, op: UnaryOperator, a: Value) -> Value {
        let code = self.builder.ins().iconst(types::I32, unary_op_code(op) as i64);
        let callee = self.module.declare_func_in_func(self.trampolines.unary_op, self.builder.func);
        let call = self.builder.ins().call(callee, &[code, a]);
        self.builder.inst_results(call)[0]
    }

    fn call_binary_op(&mut self, op: BinaryOperator, a: Value, b: Value) -> Value {
        let code = self.builder.ins().iconst(types::I32, binary_op_code(op) as i64);
        let callee = self.module.declare_func_in_func(self.trampolines.binary_op, self.builder.func);
        let call = self.builder.ins().call(callee, &[code, a, b]);
        self.builder.inst_results(call)[0]
    }

    fn call_unary_fn(&mut self, tag: UnaryFunction, a: Value) -> Value {
        let code = self.builder.ins().iconst(types::I32, unary_fn_code(tag) as i64);
        let callee = self.module.declare_func_in_func(self.trampolines.unary_fn, self.builder.func);
        let call = self.builder.ins().call(callee, &[code, a]);
        self.builder.inst_results(call)[0]
    }

    fn call_binary_fn(&mut self, tag: BinaryFunction, a: Value, b: Value) -> Value {
        let code = self.builder.ins().iconst(types::I32, binary_fn_code(tag) as i64);
        let callee = self.module.declare_func_in_func(self.trampolines.binary_fn, self.builder.func);
        let call = self.builder.ins().call(callee, &[code, a, b]);
        self.builder.inst_results(call)[0]
    }

    fn load_address(&mut self, addr: *const Real) -> Value {
        let addr_val = self.builder.ins().iconst(types::I64, addr as i64);
        self.builder.ins().load(types::F64, MemFlags::trusted(), addr_val, 0)
    }

    fn lower(&mut self, node: &Node) -> Result<Value> {
        match node.as_ref() {
            NodeKind::Empty => Err(Error::InvalidNode),
            NodeKind::Number(v) => Ok(self.builder.ins().f64const(*v)),
            NodeKind::Reference(p) => Ok(self.load_address(p.addr)),
            NodeKind::ArrayReference(p) => {
                let index_addr = self.builder.ins().iconst(types::I64, p.index as i64);
                let index = self.builder.ins().load(types::I64, MemFlags::trusted(), index_addr, 0);
                let base = self.builder.ins().iconst(types::I64, p.base as i64);
                let offset = self.builder.ins().imul_imm(index, mem::size_of::<Real>() as i64);
                let addr = self.builder.ins().iadd(base, offset);
                Ok(self.builder.ins().load(types::F64, MemFlags::trusted(), addr, 0))
            }
            NodeKind::Symbol(name) => Err(Error::Unsupported(format!("cannot lower free symbol `{}`", name))),
            NodeKind::Local(slot) => {
                Err(Error::Unsupported(format!("local variable `{}` is not implemented", slot.name)))
            }
            NodeKind::UnaryOp(op, a) => {
                let av = self.lower(a)?;
                Ok(match op {
                    UnaryOperator::Plus => av,
                    UnaryOperator::Minus => self.builder.ins().fneg(av),
                    UnaryOperator::Faculty | UnaryOperator::Not => self.call_unary_op(*op, av),
                })
            }
            NodeKind::BinaryOp(op, a, b) => {
                let av = self.lower(a)?;
                let bv = self.lower(b)?;
                Ok(match op {
                    BinaryOperator::Sub => self.builder.ins().fsub(av, bv),
                    BinaryOperator::Div => self.builder.ins().fdiv(av, bv),
                    _ => self.call_binary_op(*op, av, bv),
                })
            }
            NodeKind::Multinary(op, args) => self.lower_multinary(*op, args),
            NodeKind::UnaryFn(tag, a) => {
                if tag.is_unimplemented() {
                    return Err(Error::Unsupported(format!("`{}` is not implemented", tag.spelling())));
                }
                let av = self.lower(a)?;
                Ok(self.call_unary_fn(*tag, av))
            }
            NodeKind::BinaryFn(tag, a, b) => {
                if tag.is_unimplemented() {
                    return Err(Error::Unsupported(format!("`{}` is not implemented", tag.spelling())));
                }
                let av = self.lower(a)?;
                let bv = self.lower(b)?;
                Ok(self.call_binary_fn(*tag, av, bv))
            }
            NodeKind::Conditional(c, t, e) => {
                let cv = self.lower(c)?;
                let zero = self.builder.ins().f64const(0.0);
                let is_true = self.builder.ins().fcmp(FloatCC::NotEqual, cv, zero);

                let then_block = self.builder.create_block();
                let else_block = self.builder.create_block();
                let merge_block = self.builder.create_block();
                self.builder.append_block_param(merge_block, types::F64);

                self.builder.ins().brif(is_true, then_block, &[], else_block, &[]);

                self.builder.switch_to_block(then_block);
                self.builder.seal_block(then_block);
                let tv = self.lower(t)?;
                self.builder.ins().jump(merge_block, &[tv]);

                self.builder.switch_to_block(else_block);
                self.builder.seal_block(else_block);
                let ev = self.lower(e)?;
                self.builder.ins().jump(merge_block, &[ev]);

                self.builder.switch_to_block(merge_block);
                self.builder.seal_block(merge_block);
                Ok(self.builder.block_params(merge_block)[0])
            }
            NodeKind::IntegerPower(a, n) => {
                let av = self.lower(a)?;
                Ok(self.lower_integer_power(av, *n))
            }
        }
    }

    fn lower_integer_power(&mut self, base: Value, exp: i32) -> Value {
        if exp == 0 {
            return self.builder.ins().f64const(1.0);
        }
        let positive = self.lower_positive_integer_power(base, exp.unsigned_abs());
        if exp < 0 {
            let one = self.builder.ins().f64const(1.0);
            self.builder.ins().fdiv(one, positive)
        } else {
            positive
        }
    }

    fn lower_positive_integer_power(&mut self, base: Value, exp: u32) -> Value {
        let mut result: Option<Value> = None;
        let mut b = base;
        let mut n = exp;
        while n > 0 {
            if n & 1 == 1 {
                result = Some(match result {
                    Some(r) => self.builder.ins().fmul(r, b),
                    None => b,
                });
            }
            b = self.builder.ins().fmul(b, b);
            n >>= 1;
        }
        result.unwrap_or_else(|| self.builder.ins().f64const(1.0))
    }

    fn lower_multinary(&mut self, op: MultinaryOperator, args: &[Node]) -> Result<Value> {
        match op {
            MultinaryOperator::Component => return Err(Error::Unsupported("component is not implemented".to_string())),
            MultinaryOperator::List => {
                if args.is_empty() {
                    return Err(Error::Lowering("multinary node with no children".to_string()));
                }
                let mut last = None;
                for a in args {
                    last = Some(self.lower(a)?);
                }
                return Ok(last.unwrap());
            }
            MultinaryOperator::Add | MultinaryOperator::Mul => {}
        }
        if args.is_empty() {
            return Err(Error::Lowering("multinary node with no children".to_string()));
        }
        let mut acc: Option<Value> = None;
        for a in args {
            let v = self.lower(a)?;
            acc = Some(match acc {
                None => v,
                Some(prev) => match op {
                    MultinaryOperator::Add => self.builder.ins().fadd(prev, v),
                    MultinaryOperator::Mul => self.builder.ins().fmul(prev, v),
                    _ => unreachable!(),
                },
            });
        }
        Ok(acc.unwrap())
    }
}

pub fn build(node: &Node) -> Result<Box<dyn Evaluator>> {
    let mut builder = JITBuilder::new(cranelift_module::default_libcall_names())
        .map_err(|e| Error::Runtime(e.to_string()))?;
    builder.symbol("sm_unary_op", unary_op_trampoline as *const u8);
    builder.symbol("sm_binary_op", binary_op_trampoline as *const u8);
    builder.symbol("sm_unary_fn", unary_fn_trampoline as *const u8);
    builder.symbol("sm_binary_fn", binary_fn_trampoline as *const u8);

    let mut module = JITModule::new(builder);
    let trampolines = declare_trampolines(&mut module)?;

    let mut sig = module.make_signature();
    sig.returns.push(AbiParam::new(types::F64));
    let func_id = module
        .declare_function("sm_entry", Linkage::Export, &sig)
        .map_err(|e| Error::Runtime(e.to_string()))?;

    let mut ctx = module.make_context();
    ctx.func.signature = sig;
    let mut builder_context = FunctionBuilderContext::new();

    {
        let mut fb = FunctionBuilder::new(&mut ctx.func, &mut builder_context);
        let entry = fb.create_block();
        fb.append_block_params_for_function_params(entry);
        fb.switch_to_block(entry);
        fb.seal_block(entry);

        let mut lowerer = Lowerer {
            builder: fb,
            module: &mut module,
            trampolines: &trampolines,
        };
        let result = lowerer.lower(node)?;
        lowerer.builder.ins().return_(&[result]);
        lowerer.builder.finalize();
    }

    module
        .define_function(func_id, &mut ctx)
        .map_err(|e| Error::Runtime(e.to_string()))?;
    module.clear_context(&mut ctx);
    module
        .finalize_definitions()
        .map_err(|e| Error::Runtime(e.to_string()))?;

    let code_ptr = module.get_finalized_function(func_id);
    let entry: unsafe extern "C" fn() -> Real = unsafe { mem::transmute(code_ptr) };

    Ok(Box::new(JitEvaluator { _module: module, entry }))
}

pub struct JitEvaluator {
    // Keeps the compiled code alive; `entry` points into its pages.
    _module: JITModule,
    entry: unsafe extern "C" fn() -> Real,
}

impl Evaluator for JitEvaluator {
    fn call(&mut self) -> Real {
        unsafe { (self.entry)() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Engine;

    fn run_expr(engine: &Engine, text: &str) -> Real {
        let f = engine.parse(text).unwrap();
        let simplified = f.simplify();
        let mut evaluator = build(&simplified.root()).unwrap();
        evaluator.call()
    }

    #[test]
    fn matches_tree_walker_on_scenarios() {
        let mut engine = Engine::new();
        let c: Real = 2.0;
        engine.register_provider("c", &c as *const Real);
        let result = run_expr(&engine, "1 + c + 2*c + 3*c^3");
        assert!((result - 31.0).abs() < 1e-9);
    }

    #[test]
    fn transcendental_call_matches_std() {
        let mut engine = Engine::new();
        let c: Real = 0.5;
        engine.register_provider("c", &c as *const Real);
        let result = run_expr(&engine, "sin(c)");
        assert!((result - 0.5f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn conditional_picks_matching_branch() {
        let mut engine = Engine::new();
        let c: Real = -1.0;
        engine.register_provider("c", &c as *const Real);
        let result = run_expr(&engine, "if(c < 0, 7, 9)");
        assert!((result - 7.0).abs() < 1e-12);
    }
}
