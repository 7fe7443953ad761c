//! Whitelisted math expressions, parsed with pest and evaluated over a [`Scope`].

use std::collections::HashMap;
use std::f64::consts;
use std::sync::OnceLock;

use ndarray::{ArrayD, IxDyn, Zip};
use pest::error::ErrorVariant;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::error::ExprError;

#[derive(Parser)]
#[grammar = "field.pest"]
pub struct FieldParser;

/// Optional namespace prefix accepted in front of names, so numpy-style
/// input such as `np.sin(x) * np.pi` keeps working.
const NAMESPACE_PREFIX: &str = "np.";

/// Parsing, evaluating and dropping an AST all recurse once per level, so
/// both the input size and its nesting are bounded.
pub const MAX_SOURCE_LEN: usize = 1024;
pub const MAX_DEPTH: usize = 64;
/// Operator chains such as `x + x + ... + x` are flat text but a deep tree.
pub const MAX_TREE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Log2,
    Sqrt,
    Abs,
    Sign,
    Floor,
    Ceil,
    Atan2,
    Hypot,
    Pow,
    Min,
    Max,
}

impl Function {
    pub fn lookup(name: &str) -> Option<Self> {
        let func = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" | "arcsin" => Function::Asin,
            "acos" | "arccos" => Function::Acos,
            "atan" | "arctan" => Function::Atan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Ln,
            "log10" => Function::Log10,
            "log2" => Function::Log2,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            "sign" => Function::Sign,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "atan2" | "arctan2" => Function::Atan2,
            "hypot" => Function::Hypot,
            "pow" | "power" => Function::Pow,
            "min" | "minimum" => Function::Min,
            "max" | "maximum" => Function::Max,
            _ => return None,
        };
        Some(func)
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Atan2 | Function::Hypot | Function::Pow | Function::Min | Function::Max => 2,
            _ => 1,
        }
    }

    fn apply1(self, v: f64) -> f64 {
        match self {
            Function::Sin => v.sin(),
            Function::Cos => v.cos(),
            Function::Tan => v.tan(),
            Function::Asin => v.asin(),
            Function::Acos => v.acos(),
            Function::Atan => v.atan(),
            Function::Sinh => v.sinh(),
            Function::Cosh => v.cosh(),
            Function::Tanh => v.tanh(),
            Function::Exp => v.exp(),
            Function::Ln => v.ln(),
            Function::Log10 => v.log10(),
            Function::Log2 => v.log2(),
            Function::Sqrt => v.sqrt(),
            Function::Abs => v.abs(),
            // signum() maps 0.0 to 1.0, the elementwise sign must keep zero
            Function::Sign if v == 0.0 || v.is_nan() => v,
            Function::Sign => v.signum(),
            Function::Floor => v.floor(),
            Function::Ceil => v.ceil(),
            _ => f64::NAN,
        }
    }

    fn apply2(self, a: f64, b: f64) -> f64 {
        match self {
            Function::Atan2 => a.atan2(b),
            Function::Hypot => a.hypot(b),
            Function::Pow => a.powf(b),
            Function::Min if a.is_nan() || b.is_nan() => f64::NAN,
            Function::Min => a.min(b),
            Function::Max if a.is_nan() || b.is_nan() => f64::NAN,
            Function::Max => a.max(b),
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

/// Names visible to an expression, each bound to a coordinate array.
#[derive(Debug, Default)]
pub struct Scope<'a> {
    vars: HashMap<&'a str, &'a ArrayD<f64>>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &'a str, values: &'a ArrayD<f64>) -> Self {
        self.vars.insert(name, values);
        self
    }

    fn lookup(&self, name: &str) -> Option<&'a ArrayD<f64>> {
        self.vars.get(name).copied()
    }
}

fn pratt() -> &'static PrattParser<Rule> {
    static PRATT: OnceLock<PrattParser<Rule>> = OnceLock::new();
    PRATT.get_or_init(|| {
        // Lowest precedence first. Unary minus sits below `**` so that
        // `-x**2` reads as `-(x**2)`.
        PrattParser::new()
            .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
            .op(Op::infix(Rule::mul, Assoc::Left) | Op::infix(Rule::div, Assoc::Left))
            .op(Op::prefix(Rule::neg) | Op::prefix(Rule::pos))
            .op(Op::infix(Rule::pow, Assoc::Right))
    })
}

/// Parses one expression into its AST.
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    if input.trim().is_empty() {
        return Err(ExprError::Empty);
    }
    if input.len() > MAX_SOURCE_LEN {
        return Err(ExprError::TooLong {
            len: input.len(),
            max: MAX_SOURCE_LEN,
        });
    }
    if nesting(input) > MAX_DEPTH {
        return Err(ExprError::TooDeep { max: MAX_DEPTH });
    }

    let mut pairs = FieldParser::parse(Rule::program, input).map_err(Box::new)?;
    let expr = pairs
        .next()
        .and_then(|program| program.into_inner().next())
        .ok_or(ExprError::Empty)?;

    let ast = build(expr.into_inner())?;
    if ast.depth() > MAX_TREE_DEPTH {
        return Err(ExprError::TooDeep {
            max: MAX_TREE_DEPTH,
        });
    }
    log::debug!("parsed {input:?} as {ast:?}");
    Ok(ast)
}

/// Upper bound on the grammar's recursion: open parentheses plus runs of
/// sign characters, which may all be unary.
fn nesting(input: &str) -> usize {
    let mut parens = 0usize;
    let mut signs = 0usize;
    let mut deepest = 0usize;
    for c in input.chars() {
        match c {
            '(' => {
                parens += 1;
                signs = 0;
            }
            ')' => {
                parens = parens.saturating_sub(1);
                signs = 0;
            }
            '+' | '-' => signs += 1,
            c if c.is_whitespace() => {}
            _ => signs = 0,
        }
        deepest = deepest.max(parens + signs);
    }
    deepest
}

fn build(pairs: Pairs<'_, Rule>) -> Result<Expr, ExprError> {
    pratt()
        .map_primary(primary)
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::neg => UnaryOp::Neg,
                _ => UnaryOp::Pos,
            };
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand?),
            })
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                _ => BinaryOp::Pow,
            };
            Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs?),
                rhs: Box::new(rhs?),
            })
        })
        .parse(pairs)
}

fn primary(pair: Pair<'_, Rule>) -> Result<Expr, ExprError> {
    match pair.as_rule() {
        Rule::number => number(pair),
        Rule::ident => Ok(identifier(pair.as_str())),
        Rule::call => call(pair),
        Rule::expr => build(pair.into_inner()),
        rule => unreachable!("grammar produced {rule:?} as a primary"),
    }
}

fn number(pair: Pair<'_, Rule>) -> Result<Expr, ExprError> {
    pair.as_str().parse::<f64>().map(Expr::Number).map_err(|err| {
        let variant = ErrorVariant::CustomError {
            message: format!("invalid number: {err}"),
        };
        ExprError::Parse(Box::new(pest::error::Error::new_from_span(
            variant,
            pair.as_span(),
        )))
    })
}

fn identifier(raw: &str) -> Expr {
    match raw.strip_prefix(NAMESPACE_PREFIX).unwrap_or(raw) {
        "pi" => Expr::Number(consts::PI),
        "e" => Expr::Number(consts::E),
        // `np.` only qualifies functions and constants
        _ if raw.starts_with(NAMESPACE_PREFIX) => Expr::Variable(raw.to_string()),
        name => Expr::Variable(name.to_string()),
    }
}

fn call(pair: Pair<'_, Rule>) -> Result<Expr, ExprError> {
    let mut inner = pair.into_inner();
    let raw = inner.next().map(|ident| ident.as_str()).unwrap_or_default();
    let name = raw.strip_prefix(NAMESPACE_PREFIX).unwrap_or(raw);
    let func =
        Function::lookup(name).ok_or_else(|| ExprError::UnknownFunction(raw.to_string()))?;

    let args = inner
        .map(|arg| build(arg.into_inner()))
        .collect::<Result<Vec<_>, _>>()?;
    if args.len() != func.arity() {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected: func.arity(),
            found: args.len(),
        });
    }

    Ok(Expr::Call { func, args })
}

impl Expr {
    /// Levels in the tree; a lone literal or name is 1.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Number(_) | Expr::Variable(_) => 1,
            Expr::Unary { operand, .. } => 1 + operand.depth(),
            Expr::Binary { lhs, rhs, .. } => 1 + lhs.depth().max(rhs.depth()),
            Expr::Call { args, .. } => 1 + args.iter().map(Expr::depth).max().unwrap_or(0),
        }
    }

    /// Evaluates elementwise. Literals come back as 0-d arrays and broadcast
    /// against whatever they are combined with.
    pub fn eval(&self, scope: &Scope<'_>) -> Result<ArrayD<f64>, ExprError> {
        match self {
            Expr::Number(v) => Ok(ArrayD::from_elem(IxDyn(&[]), *v)),
            Expr::Variable(name) => scope
                .lookup(name)
                .cloned()
                .ok_or_else(|| ExprError::UnknownVariable(name.clone())),
            Expr::Unary { op, operand } => {
                let values = operand.eval(scope)?;
                Ok(match op {
                    UnaryOp::Neg => values.mapv_into(|v| -v),
                    UnaryOp::Pos => values,
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let op = *op;
                zip_with(&lhs.eval(scope)?, &rhs.eval(scope)?, |a, b| op.apply(a, b))
            }
            Expr::Call { func, args } => {
                let func = *func;
                match args.as_slice() {
                    [arg] if func.arity() == 1 => {
                        Ok(arg.eval(scope)?.mapv_into(|v| func.apply1(v)))
                    }
                    [a, b] if func.arity() == 2 => {
                        zip_with(&a.eval(scope)?, &b.eval(scope)?, |a, b| func.apply2(a, b))
                    }
                    _ => Err(ExprError::Arity {
                        name: format!("{func:?}").to_lowercase(),
                        expected: func.arity(),
                        found: args.len(),
                    }),
                }
            }
        }
    }

    /// Evaluates and broadcasts the result to `shape`.
    pub fn eval_on(
        &self,
        scope: &Scope<'_>,
        shape: &[usize],
    ) -> Result<ArrayD<f64>, ExprError> {
        let values = self.eval(scope)?;
        let broadcast = values.broadcast(shape).ok_or_else(|| ExprError::ShapeMismatch {
            expected: shape.to_vec(),
            found: values.shape().to_vec(),
        })?;
        Ok(broadcast.to_owned())
    }
}

/// Parses `source` and evaluates it over `scope`, producing an array of
/// exactly `shape`.
pub fn evaluate(
    source: &str,
    scope: &Scope<'_>,
    shape: &[usize],
) -> Result<ArrayD<f64>, ExprError> {
    parse(source)?.eval_on(scope, shape)
}

fn zip_with(
    a: &ArrayD<f64>,
    b: &ArrayD<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<ArrayD<f64>, ExprError> {
    let shape = if (b.ndim(), b.len()) > (a.ndim(), a.len()) {
        b.shape().to_vec()
    } else {
        a.shape().to_vec()
    };

    let mismatch = |found: &[usize]| ExprError::ShapeMismatch {
        expected: shape.clone(),
        found: found.to_vec(),
    };
    let lhs = a.broadcast(shape.as_slice()).ok_or_else(|| mismatch(a.shape()))?;
    let rhs = b.broadcast(shape.as_slice()).ok_or_else(|| mismatch(b.shape()))?;

    Ok(Zip::from(&lhs).and(&rhs).map_collect(|&x, &y| f(x, y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(source: &str) -> f64 {
        let values = parse(source).unwrap().eval(&Scope::new()).unwrap();
        values.iter().copied().next().unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(scalar("1 + 2 * 3"), 7.0);
        assert_eq!(scalar("(1 + 2) * 3"), 9.0);
        assert_eq!(scalar("10 - 4 - 3"), 3.0);
        assert_eq!(scalar("8 / 4 / 2"), 1.0);
    }

    #[test]
    fn test_power_binds_tighter_than_unary_minus() {
        assert_eq!(scalar("-2**2"), -4.0);
        assert_eq!(scalar("(-2)**2"), 4.0);
        assert_eq!(scalar("2**-1"), 0.5);
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(scalar("2**3**2"), 512.0);
        assert_eq!(scalar("2^3^2"), 512.0);
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(scalar(".5"), 0.5);
        assert_eq!(scalar("2."), 2.0);
        assert_eq!(scalar("1e-3"), 0.001);
        assert_eq!(scalar("2.5E2"), 250.0);
    }

    #[test]
    fn test_constants_and_namespace() {
        assert_eq!(scalar("pi"), consts::PI);
        assert_eq!(scalar("np.pi"), consts::PI);
        assert_eq!(scalar("e"), consts::E);
        assert_eq!(scalar("np.cos(0)"), 1.0);
    }

    #[test]
    fn test_sign_keeps_zero() {
        assert_eq!(scalar("sign(0)"), 0.0);
        assert_eq!(scalar("sign(-3)"), -1.0);
        assert_eq!(scalar("sign(7)"), 1.0);
    }

    #[test]
    fn test_ast_shape() {
        let ast = parse("-x + sin(y)").unwrap();
        let expected = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(Expr::Variable("x".into())),
            }),
            rhs: Box::new(Expr::Call {
                func: Function::Sin,
                args: vec![Expr::Variable("y".into())],
            }),
        };
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_unknown_function_rejected_at_parse() {
        let err = parse("eval(x)").unwrap_err();
        assert!(matches!(err, ExprError::UnknownFunction(name) if name == "eval"));
        assert!(matches!(parse("np.system(1)"), Err(ExprError::UnknownFunction(_))));
    }

    #[test]
    fn test_arity_checked() {
        let err = parse("atan2(y)").unwrap_err();
        assert!(matches!(
            err,
            ExprError::Arity { expected: 2, found: 1, .. }
        ));
        assert!(matches!(parse("sin(x, y)"), Err(ExprError::Arity { .. })));
    }

    #[test]
    fn test_long_input_rejected() {
        let sum = vec!["1"; 20000].join("+");
        assert!(matches!(parse(&sum), Err(ExprError::TooLong { .. })));
        let negations = format!("{}x", "-".repeat(20000));
        assert!(matches!(parse(&negations), Err(ExprError::TooLong { .. })));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let parens = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(parse(&parens), Err(ExprError::TooDeep { .. })));
        let negations = format!("{}x", "-".repeat(300));
        assert!(matches!(parse(&negations), Err(ExprError::TooDeep { .. })));
        // short enough text, but a tree deeper than the evaluator allows
        let chain = vec!["x"; 300].join("+");
        assert!(chain.len() <= MAX_SOURCE_LEN);
        assert!(matches!(parse(&chain), Err(ExprError::TooDeep { .. })));
    }

    #[test]
    fn test_moderate_nesting_accepted() {
        let parens = format!("{}x{}", "(".repeat(30), ")".repeat(30));
        assert_eq!(parse(&parens).unwrap(), Expr::Variable("x".into()));
        assert_eq!(scalar("--1"), 1.0);
        let chain = vec!["1"; 100].join("+");
        assert_eq!(scalar(&chain), 100.0);
    }

    #[test]
    fn test_blank_is_empty() {
        assert!(matches!(parse(""), Err(ExprError::Empty)));
        assert!(matches!(parse("   "), Err(ExprError::Empty)));
    }

    #[test]
    fn test_namespaced_variable_is_not_a_coordinate() {
        let x = ArrayD::from_elem(IxDyn(&[2]), 1.0);
        let scope = Scope::new().bind("x", &x);
        let err = parse("np.x").unwrap().eval(&scope).unwrap_err();
        assert!(matches!(err, ExprError::UnknownVariable(name) if name == "np.x"));
    }

    #[test]
    fn test_scalar_broadcasts_against_array() {
        let x = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 2.0, 3.0]).unwrap();
        let scope = Scope::new().bind("x", &x);
        let out = parse("2 * x + 1").unwrap().eval(&scope).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_incompatible_shapes() {
        let a = ArrayD::zeros(IxDyn(&[3]));
        let b = ArrayD::zeros(IxDyn(&[4]));
        let scope = Scope::new().bind("a", &a).bind("b", &b);
        let err = parse("a + b").unwrap().eval(&scope).unwrap_err();
        assert!(matches!(err, ExprError::ShapeMismatch { .. }));
    }
}
