//! Tree-walking evaluator over JSON values.

use std::cell::Cell;
use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use super::ast::{BinOp, BoolOp, CmpOp, Expr, UnaryOp};
use super::builtins;

/// Runtime faults while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UnknownName(String),

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Value(String),

    #[error("division by zero")]
    ZeroDivision,

    #[error("integer overflow")]
    Overflow,

    #[error("index out of range: {0}")]
    Index(i64),

    #[error("key not found: {0}")]
    Key(String),

    #[error("{0} cannot be evaluated")]
    Forbidden(String),
}

/// Evaluate `expr` with `context` as the only variables in scope.
pub fn evaluate(expr: &Expr, context: &Map<String, Value>) -> Result<Value, EvalError> {
    Evaluator {
        context,
        budget: Cell::new(MAX_BUILT_CELLS),
    }
    .eval(expr)
}

/// Upper bound on the cells one evaluation may build by repetition and
/// concatenation, summed over every such operation.
const MAX_BUILT_CELLS: usize = 1_000_000;

struct Evaluator<'a> {
    context: &'a Map<String, Value>,
    /// Cells still available to sequence-building operators.
    budget: Cell<usize>,
}

impl Evaluator<'_> {
    fn charge(&self, cells: usize) -> Result<(), EvalError> {
        let left = self.budget.get();
        if cells > left {
            return Err(EvalError::Value(format!(
                "expression would build more than {MAX_BUILT_CELLS} values"
            )));
        }
        self.budget.set(left - cells);
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => self
                .context
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownName(name.clone())),
            Expr::List(items) | Expr::Tuple(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Dict(pairs) => {
                let mut map = Map::new();
                for (k, v) in pairs {
                    let key = dict_key(self.eval(k)?)?;
                    map.insert(key, self.eval(v)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Attribute { value, attr } => match self.eval(value)? {
                Value::Object(map) => map.get(attr).cloned().ok_or_else(|| {
                    EvalError::Type(format!("object has no attribute '{attr}'"))
                }),
                other => Err(EvalError::Type(format!(
                    "'{}' object has no attribute '{attr}'",
                    type_name(&other)
                ))),
            },
            Expr::Subscript { value, index } => subscript(self.eval(value)?, self.eval(index)?),
            Expr::Call { func, args } => {
                let name = match func.as_ref() {
                    Expr::Name(name) => name,
                    _ => return Err(EvalError::Forbidden("computed call".into())),
                };
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                builtins::call(name, args)
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&v))),
                    UnaryOp::Pos => Num::from_value(&v)
                        .map(Num::into_value)
                        .ok_or_else(|| bad_operand("unary +", &v))?,
                    UnaryOp::Neg => match Num::from_value(&v) {
                        Some(Num::Int(i)) => i.checked_neg().map(Value::from).ok_or(EvalError::Overflow),
                        Some(Num::Float(f)) => Num::Float(-f).into_value(),
                        None => Err(bad_operand("unary -", &v)),
                    },
                }
            }
            Expr::Binary { op, left, right } => {
                let (a, b) = (self.eval(left)?, self.eval(right)?);
                self.charge(built_cells(*op, &a, &b))?;
                binary(*op, a, b)
            }
            Expr::Compare { left, rest } => {
                let mut lhs = self.eval(left)?;
                for (op, rhs_expr) in rest {
                    let rhs = self.eval(rhs_expr)?;
                    if !compare_op(*op, &lhs, &rhs)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
            Expr::Bool { op, left, right } => {
                let lhs = self.eval(left)?;
                match (op, truthy(&lhs)) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(lhs),
                    _ => self.eval(right),
                }
            }
            Expr::Import { module } => Err(EvalError::Forbidden(format!("import of '{module}'"))),
        }
    }
}

/// Numeric view of a JSON value (booleans count as 0/1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(super) fn from_value(v: &Value) -> Option<Num> {
        match v {
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Num::Int(i),
                None => Num::Float(n.as_f64()?),
            }),
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            _ => None,
        }
    }

    pub(super) fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub(super) fn into_value(self) -> Result<Value, EvalError> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| EvalError::Value(format!("result {f} is not a finite number"))),
        }
    }
}

pub(super) fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

pub(super) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Python-style `str()` rendering.
pub(super) fn display(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match Num::from_value(v) {
            Some(Num::Float(f)) => format!("{f:?}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn bad_operand(op: &str, v: &Value) -> EvalError {
    EvalError::Type(format!("bad operand type for {op}: '{}'", type_name(v)))
}

fn unsupported(op: &str, a: &Value, b: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        type_name(a),
        type_name(b)
    ))
}

fn dict_key(v: Value) -> Result<String, EvalError> {
    match v {
        Value::String(s) => Ok(s),
        Value::Number(_) | Value::Bool(_) | Value::Null => Ok(display(&v)),
        other => Err(EvalError::Type(format!(
            "unhashable type: '{}'",
            type_name(&other)
        ))),
    }
}

fn normalize_index(i: i64, len: usize) -> Result<usize, EvalError> {
    let len_i = i64::try_from(len).map_err(|_| EvalError::Overflow)?;
    let idx = if i < 0 { i + len_i } else { i };
    if idx < 0 || idx >= len_i {
        return Err(EvalError::Index(i));
    }
    usize::try_from(idx).map_err(|_| EvalError::Index(i))
}

fn subscript(container: Value, index: Value) -> Result<Value, EvalError> {
    match (container, index) {
        (Value::Array(items), idx) => match Num::from_value(&idx) {
            Some(Num::Int(i)) if !idx.is_boolean() => {
                let at = normalize_index(i, items.len())?;
                Ok(items[at].clone())
            }
            _ => Err(EvalError::Type(format!(
                "list indices must be integers, not {}",
                type_name(&idx)
            ))),
        },
        (Value::String(s), idx) => match Num::from_value(&idx) {
            Some(Num::Int(i)) if !idx.is_boolean() => {
                let chars: Vec<char> = s.chars().collect();
                let at = normalize_index(i, chars.len())?;
                Ok(Value::String(chars[at].to_string()))
            }
            _ => Err(EvalError::Type(format!(
                "string indices must be integers, not {}",
                type_name(&idx)
            ))),
        },
        (Value::Object(map), key) => {
            let key = dict_key(key)?;
            map.get(&key).cloned().ok_or(EvalError::Key(key))
        }
        (other, _) => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            type_name(&other)
        ))),
    }
}

fn binary(op: BinOp, a: Value, b: Value) -> Result<Value, EvalError> {
    match (op, &a, &b) {
        (BinOp::Add, Value::String(x), Value::String(y)) => {
            return Ok(Value::String(format!("{x}{y}")))
        }
        (BinOp::Add, Value::Array(x), Value::Array(y)) => {
            let mut out = x.clone();
            out.extend(y.iter().cloned());
            return Ok(Value::Array(out));
        }
        (BinOp::Mul, Value::String(_) | Value::Array(_), Value::Number(_))
        | (BinOp::Mul, Value::Number(_), Value::String(_) | Value::Array(_)) => {
            return repeat(&a, &b);
        }
        _ => {}
    }

    let symbol = match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
    };
    let (x, y) = match (Num::from_value(&a), Num::from_value(&b)) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(unsupported(symbol, &a, &b)),
    };

    let result = match (x, y) {
        (Num::Int(x), Num::Int(y)) => int_op(op, x, y)?,
        _ => float_op(op, x.as_f64(), y.as_f64())?,
    };
    result.into_value()
}

/// Cells a sequence `+` or `*` would build; zero for numeric operators.
fn built_cells(op: BinOp, a: &Value, b: &Value) -> usize {
    match (op, a, b) {
        (BinOp::Add, Value::String(_), Value::String(_))
        | (BinOp::Add, Value::Array(_), Value::Array(_)) => {
            cells(a).saturating_add(cells(b))
        }
        (BinOp::Mul, Value::String(_) | Value::Array(_), Value::Number(n))
        | (BinOp::Mul, Value::Number(n), Value::String(_) | Value::Array(_)) => {
            let seq = if a.is_number() { b } else { a };
            let times = n.as_u64().and_then(|t| usize::try_from(t).ok()).unwrap_or(0);
            cells(seq).saturating_mul(times)
        }
        _ => 0,
    }
}

/// Size of a value counting one cell per scalar, container and string byte,
/// nested contents included. Stops counting once past [`MAX_BUILT_CELLS`].
fn cells(v: &Value) -> usize {
    let mut total = 0usize;
    let mut pending = vec![v];
    while let Some(v) = pending.pop() {
        if total > MAX_BUILT_CELLS {
            break;
        }
        match v {
            Value::String(s) => total += s.len().max(1),
            Value::Array(items) => {
                total += 1;
                pending.extend(items);
            }
            Value::Object(map) => {
                total += 1;
                for (k, v) in map {
                    total += k.len();
                    pending.push(v);
                }
            }
            _ => total += 1,
        }
    }
    total
}

fn repeat(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (seq, count) = match (a, b) {
        (Value::Number(_), seq) => (seq, a),
        (seq, _) => (seq, b),
    };
    let n = match Num::from_value(count) {
        Some(Num::Int(n)) => usize::try_from(n.max(0)).map_err(|_| EvalError::Overflow)?,
        _ => {
            return Err(EvalError::Type(
                "can't multiply sequence by non-int".to_string(),
            ))
        }
    };
    match seq {
        Value::String(s) => Ok(Value::String(s.repeat(n))),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len().saturating_mul(n));
            for _ in 0..n {
                out.extend(items.iter().cloned());
            }
            Ok(Value::Array(out))
        }
        _ => Err(unsupported("*", a, b)),
    }
}

fn int_op(op: BinOp, x: i64, y: i64) -> Result<Num, EvalError> {
    let checked = |r: Option<i64>| r.map(Num::Int).ok_or(EvalError::Overflow);
    match op {
        BinOp::Add => checked(x.checked_add(y)),
        BinOp::Sub => checked(x.checked_sub(y)),
        BinOp::Mul => checked(x.checked_mul(y)),
        BinOp::Div => float_op(op, x as f64, y as f64),
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(EvalError::ZeroDivision);
            }
            let q = x.checked_div(y).ok_or(EvalError::Overflow)?;
            // floor toward negative infinity
            if x % y != 0 && ((x < 0) != (y < 0)) {
                Ok(Num::Int(q - 1))
            } else {
                Ok(Num::Int(q))
            }
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(EvalError::ZeroDivision);
            }
            let r = x.checked_rem(y).ok_or(EvalError::Overflow)?;
            if r != 0 && ((r < 0) != (y < 0)) {
                Ok(Num::Int(r + y))
            } else {
                Ok(Num::Int(r))
            }
        }
        BinOp::Pow => {
            if y < 0 {
                return float_op(op, x as f64, y as f64);
            }
            let exp = u32::try_from(y).map_err(|_| EvalError::Overflow)?;
            checked(x.checked_pow(exp))
        }
    }
}

fn float_op(op: BinOp, x: f64, y: f64) -> Result<Num, EvalError> {
    let r = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            x - y * (x / y).floor()
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            x.powf(y)
        }
    };
    Ok(Num::Float(r))
}

/// Equality with numeric cross-type comparison (`1 == 1.0`).
pub(super) fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| equals(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| equals(v, other)))
        }
        _ => match (Num::from_value(a), Num::from_value(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        },
    }
}

/// Ordering for `<`, `sorted`, `min`, `max`.
pub(super) fn compare(a: &Value, b: &Value) -> Result<Ordering, EvalError> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare(l, r)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => match (Num::from_value(a), Num::from_value(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(x.cmp(&y)),
            (Some(x), Some(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .ok_or_else(|| EvalError::Value("cannot order NaN".to_string())),
            _ => Err(EvalError::Type(format!(
                "'<' not supported between instances of '{}' and '{}'",
                type_name(a),
                type_name(b)
            ))),
        },
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match container {
        Value::String(s) => match item {
            Value::String(needle) => Ok(s.contains(needle.as_str())),
            other => Err(EvalError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                type_name(other)
            ))),
        },
        Value::Array(items) => Ok(items.iter().any(|v| equals(v, item))),
        Value::Object(map) => Ok(map.contains_key(&dict_key(item.clone())?)),
        other => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            type_name(other)
        ))),
    }
}

fn compare_op(op: CmpOp, a: &Value, b: &Value) -> Result<bool, EvalError> {
    Ok(match op {
        CmpOp::Eq => equals(a, b),
        CmpOp::Ne => !equals(a, b),
        CmpOp::Lt => compare(a, b)? == Ordering::Less,
        CmpOp::Le => compare(a, b)? != Ordering::Greater,
        CmpOp::Gt => compare(a, b)? == Ordering::Greater,
        CmpOp::Ge => compare(a, b)? != Ordering::Less,
        CmpOp::In => contains(b, a)?,
        CmpOp::NotIn => !contains(b, a)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;
    use serde_json::json;

    fn run(src: &str) -> Result<Value, EvalError> {
        run_with(src, json!({}))
    }

    fn run_with(src: &str, ctx: Value) -> Result<Value, EvalError> {
        let expr = parse(src).unwrap();
        let ctx = ctx.as_object().cloned().unwrap_or_default();
        evaluate(&expr, &ctx)
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(run("1 + 2 * 3").unwrap(), json!(7));
        assert_eq!(run("2 ** 10").unwrap(), json!(1024));
        assert_eq!(run("7 // 2").unwrap(), json!(3));
        assert_eq!(run("-7 // 2").unwrap(), json!(-4));
        assert_eq!(run("-7 % 3").unwrap(), json!(2));
    }

    #[test]
    fn test_true_division_is_float() {
        assert_eq!(run("7 / 2").unwrap(), json!(3.5));
        assert_eq!(run("4 / 2").unwrap(), json!(2.0));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert_eq!(run("1 / 0").unwrap_err(), EvalError::ZeroDivision);
        assert_eq!(run("1 // 0").unwrap_err(), EvalError::ZeroDivision);
        assert_eq!(run("1 % 0").unwrap_err(), EvalError::ZeroDivision);
    }

    #[test]
    fn test_overflow_is_error_not_panic() {
        assert_eq!(
            run("9223372036854775807 + 1").unwrap_err(),
            EvalError::Overflow
        );
    }

    #[test]
    fn test_context_variables_and_field_access() {
        let ctx = json!({"row": {"quantity": 4, "name": "widget"}, "items": [10, 20, 30]});
        assert_eq!(run_with("row.quantity * 2", ctx.clone()).unwrap(), json!(8));
        assert_eq!(run_with("row['name']", ctx.clone()).unwrap(), json!("widget"));
        assert_eq!(run_with("items[-1]", ctx).unwrap(), json!(30));
    }

    #[test]
    fn test_unknown_name_is_reported() {
        assert_eq!(
            run("secret").unwrap_err().to_string(),
            "name 'secret' is not defined"
        );
    }

    #[test]
    fn test_comparisons_and_chaining() {
        assert_eq!(run("1 < 2 < 3").unwrap(), json!(true));
        assert_eq!(run("1 < 3 < 2").unwrap(), json!(false));
        assert_eq!(run("1 == 1.0").unwrap(), json!(true));
        assert_eq!(run("'ab' in 'cabd'").unwrap(), json!(true));
        assert_eq!(run("4 not in [1, 2]").unwrap(), json!(true));
    }

    #[test]
    fn test_boolean_ops_short_circuit() {
        // right side would fail with an unknown name if evaluated
        assert_eq!(run("False and missing").unwrap(), json!(false));
        assert_eq!(run("True or missing").unwrap(), json!(true));
        assert_eq!(run("0 or 'fallback'").unwrap(), json!("fallback"));
    }

    #[test]
    fn test_sequence_ops() {
        assert_eq!(run("[1] + [2]").unwrap(), json!([1, 2]));
        assert_eq!(run("'ab' * 2").unwrap(), json!("abab"));
        assert_eq!(run("{'a': 1}['a']").unwrap(), json!(1));
    }

    #[test]
    fn test_nested_repetition_counts_inner_values() {
        let err = run("[[1] * 10000] * 1000").unwrap_err();
        assert!(err.to_string().contains("would build more than"), "{err}");
        assert_eq!(run("len([[1] * 100] * 100)").unwrap(), json!(100));
    }

    #[test]
    fn test_build_budget_spans_the_whole_expression() {
        assert_eq!(run("len('a' * 600000)").unwrap(), json!(600000));
        assert!(run("len('a' * 600000 + 'b' * 600000)").is_err());
        assert!(run("len(('ab' * 300000) + ('ab' * 300000))").is_err());
    }

    #[test]
    fn test_concatenation_of_large_context_values_is_bounded() {
        let ctx = json!({"rows": vec![json!({"sku": "A"}); 400_000]});
        assert!(run_with("rows + rows", ctx.clone()).is_err());
        assert_eq!(run_with("len(rows)", ctx).unwrap(), json!(400_000));
    }

    #[test]
    fn test_type_errors_are_reported() {
        let err = run("'a' + 1").unwrap_err();
        assert!(err.to_string().contains("unsupported operand"));
        assert!(run("[1][5]").is_err());
        assert!(run("{'a': 1}['b']").is_err());
    }

    #[test]
    fn test_import_node_never_evaluates() {
        let err = run("import os").unwrap_err();
        assert!(matches!(err, EvalError::Forbidden(_)));
    }
}
