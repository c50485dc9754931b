// Symbol catalog: the closed sets of operator/function tags, together with
// their precedence, associativity and textual spelling. Kept as small enums
// plus match-based property tables (rather than virtual dispatch) per the
// node model's tagged-sum design.

/// A pattern used by `is()`-style predicates during rewriting: either an
/// exact tag or the wildcard `_ANY` sentinel that matches any tag of its
/// category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wildcard<T> {
    Any,
    Is(T),
}

impl<T: PartialEq> Wildcard<T> {
    pub fn matches(&self, actual: &T) -> bool {
        match self {
            Wildcard::Any => true,
            Wildcard::Is(t) => t == actual,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Faculty,
    Not,
}

impl UnaryOperator {
    pub const PRECEDENCE: u8 = 3;

    pub fn spelling(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Faculty => "!",
            UnaryOperator::Not => "~",
        }
    }

    /// Maps the raw operator character seen in a unary syntactic position.
    pub fn from_spelling(spelling: &str) -> Option<UnaryOperator> {
        match spelling {
            "+" => Some(UnaryOperator::Plus),
            "-" => Some(UnaryOperator::Minus),
            "!" => Some(UnaryOperator::Faculty),
            "~" => Some(UnaryOperator::Not),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Sub,
    Div,
    Mod,
    Pow,
    Or,
    And,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    Assign,
    List,
}

impl BinaryOperator {
    /// Precedence (lower binds looser), left-associative throughout.
    pub fn precedence(self) -> u8 {
        use BinaryOperator::*;
        match self {
            List => 15,
            Or => 13,
            And => 12,
            Eq | Ne | Assign => 11,
            Lt | Gt | Le | Ge => 10,
            Sub => 6,
            Mod => 5,
            Div => 5,
            Pow => 4,
        }
    }

    pub fn spelling(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Sub => "-",
            Div => "/",
            Mod => "%",
            Pow => "^",
            Or => "|",
            And => "&",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            Eq => "==",
            Ne => "!=",
            Assign => ":=",
            List => ";",
        }
    }

    pub fn from_spelling(spelling: &str) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        Some(match spelling {
            "-" => Sub,
            "/" => Div,
            "%" => Mod,
            "^" => Pow,
            "|" => Or,
            "&" => And,
            "<" => Lt,
            ">" => Gt,
            "<=" => Le,
            ">=" => Ge,
            "==" => Eq,
            "!=" => Ne,
            ":=" => Assign,
            ";" => List,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MultinaryOperator {
    Add,
    Mul,
    Component,
    List,
}

impl MultinaryOperator {
    pub fn precedence(self) -> u8 {
        match self {
            MultinaryOperator::Mul => 5,
            MultinaryOperator::Add => 6,
            MultinaryOperator::Component => 6,
            MultinaryOperator::List => 15,
        }
    }

    /// The identity element of the reduction this operator denotes.
    pub fn identity(self) -> f64 {
        match self {
            MultinaryOperator::Add | MultinaryOperator::Component | MultinaryOperator::List => 0.0,
            MultinaryOperator::Mul => 1.0,
        }
    }

    pub fn fold(self, a: f64, b: f64) -> f64 {
        match self {
            MultinaryOperator::Add => a + b,
            MultinaryOperator::Mul => a * b,
            MultinaryOperator::Component | MultinaryOperator::List => b,
        }
    }

    pub fn spelling(self) -> &'static str {
        match self {
            MultinaryOperator::Add => "+",
            MultinaryOperator::Mul => "*",
            MultinaryOperator::Component => ",",
            MultinaryOperator::List => ";",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryFunction {
    Abs,
    Acos,
    Acosh,
    Arg,
    Asin,
    Asinh,
    Atan,
    Atanh,
    Cbrt,
    Ceil,
    Conj,
    Cos,
    Cosh,
    Cot,
    Csc,
    Erf,
    Erfc,
    Exp,
    Exp2,
    Floor,
    Imag,
    Int,
    Log,
    Log10,
    Log2,
    Real,
    Sec,
    Sin,
    Sinh,
    Sqrt,
    T,
    Tan,
    Tanh,
    Trunc,
}

impl UnaryFunction {
    /// Variants the original mathparse library ships as stubs. A
    /// conforming implementation fails these with a clearly named error
    /// rather than guessing an implementation.
    pub fn is_unimplemented(self) -> bool {
        matches!(
            self,
            UnaryFunction::Arg
                | UnaryFunction::Conj
                | UnaryFunction::Imag
                | UnaryFunction::Real
                | UnaryFunction::T
        )
    }

    pub fn spelling(self) -> &'static str {
        use UnaryFunction::*;
        match self {
            Abs => "abs",
            Acos => "acos",
            Acosh => "acosh",
            Arg => "arg",
            Asin => "asin",
            Asinh => "asinh",
            Atan => "atan",
            Atanh => "atanh",
            Cbrt => "cbrt",
            Ceil => "ceil",
            Conj => "conj",
            Cos => "cos",
            Cosh => "cosh",
            Cot => "cot",
            Csc => "csc",
            Erf => "erf",
            Erfc => "erfc",
            Exp => "exp",
            Exp2 => "exp2",
            Floor => "floor",
            Imag => "imag",
            Int => "int",
            Log => "log",
            Log10 => "log10",
            Log2 => "log2",
            Real => "real",
            Sec => "sec",
            Sin => "sin",
            Sinh => "sinh",
            Sqrt => "sqrt",
            T => "t",
            Tan => "tan",
            Tanh => "tanh",
            Trunc => "trunc",
        }
    }

    pub fn from_spelling(name: &str) -> Option<UnaryFunction> {
        use UnaryFunction::*;
        Some(match name {
            "abs" => Abs,
            "acos" => Acos,
            "acosh" => Acosh,
            "arg" => Arg,
            "asin" => Asin,
            "asinh" => Asinh,
            "atan" => Atan,
            "atanh" => Atanh,
            "cbrt" => Cbrt,
            "ceil" => Ceil,
            "conj" => Conj,
            "cos" => Cos,
            "cosh" => Cosh,
            "cot" => Cot,
            "csc" => Csc,
            "erf" => Erf,
            "erfc" => Erfc,
            "exp" => Exp,
            "exp2" => Exp2,
            "floor" => Floor,
            "imag" => Imag,
            "int" => Int,
            "log" => Log,
            "log10" => Log10,
            "log2" => Log2,
            "real" => Real,
            "sec" => Sec,
            "sin" => Sin,
            "sinh" => Sinh,
            "sqrt" => Sqrt,
            "t" => T,
            "tan" => Tan,
            "tanh" => Tanh,
            "trunc" => Trunc,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryFunction {
    Atan2,
    Hypot,
    Min,
    Max,
    Plog,
    Polar,
    Pow,
}

impl BinaryFunction {
    pub fn is_unimplemented(self) -> bool {
        matches!(self, BinaryFunction::Polar)
    }

    pub fn spelling(self) -> &'static str {
        use BinaryFunction::*;
        match self {
            Atan2 => "atan2",
            Hypot => "hypot",
            Min => "min",
            Max => "max",
            Plog => "plog",
            Polar => "polar",
            Pow => "pow",
        }
    }

    pub fn from_spelling(name: &str) -> Option<BinaryFunction> {
        use BinaryFunction::*;
        Some(match name {
            "atan2" => Atan2,
            "hypot" => Hypot,
            "min" => Min,
            "max" => Max,
            "plog" => Plog,
            "polar" => Polar,
            "pow" => Pow,
            _ => return None,
        })
    }
}

/// The set of catalog entries a function-call name resolves to, along with
/// the arity the parser must enforce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionTag {
    Unary(UnaryFunction),
    Binary(BinaryFunction),
    /// The ternary `if(cond, then, else)` conditional.
    Conditional,
}

impl FunctionTag {
    pub fn arity(self) -> usize {
        match self {
            FunctionTag::Unary(_) => 1,
            FunctionTag::Binary(_) => 2,
            FunctionTag::Conditional => 3,
        }
    }

    pub fn lookup(name: &str) -> Option<FunctionTag> {
        if name == "if" {
            return Some(FunctionTag::Conditional);
        }
        if let Some(u) = UnaryFunction::from_spelling(name) {
            return Some(FunctionTag::Unary(u));
        }
        if let Some(b) = BinaryFunction::from_spelling(name) {
            return Some(FunctionTag::Binary(b));
        }
        None
    }
}
