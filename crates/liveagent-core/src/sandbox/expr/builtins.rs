//! The pure builtins an expression may call.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::eval::{compare, display, truthy, type_name, EvalError, Num};

/// Names callable from an expression. Anything else is rejected at validation.
pub const SAFE_BUILTINS: &[&str] = &[
    "len",
    "str",
    "int",
    "float",
    "bool",
    "list",
    "dict",
    "tuple",
    "sum",
    "min",
    "max",
    "abs",
    "round",
    "sorted",
    "enumerate",
    "zip",
];

pub(super) fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    match name {
        "len" => {
            let [v] = exactly::<1>(name, args)?;
            let n = match &v {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => {
                    return Err(EvalError::Type(format!(
                        "object of type '{}' has no len()",
                        type_name(other)
                    )))
                }
            };
            Ok(Value::from(n))
        }
        "str" => match optional(name, args)? {
            None => Ok(Value::String(String::new())),
            Some(v) => Ok(Value::String(display(&v))),
        },
        "int" => match optional(name, args)? {
            None => Ok(Value::from(0)),
            Some(v) => to_int(&v).map(Value::from),
        },
        "float" => match optional(name, args)? {
            None => Num::Float(0.0).into_value(),
            Some(v) => Num::Float(to_float(&v)?).into_value(),
        },
        "bool" => match optional(name, args)? {
            None => Ok(Value::Bool(false)),
            Some(v) => Ok(Value::Bool(truthy(&v))),
        },
        "list" | "tuple" => match optional(name, args)? {
            None => Ok(Value::Array(Vec::new())),
            Some(v) => Ok(Value::Array(iterate(&v)?)),
        },
        "dict" => match optional(name, args)? {
            None => Ok(Value::Object(Map::new())),
            Some(Value::Object(map)) => Ok(Value::Object(map)),
            Some(v) => {
                let mut map = Map::new();
                for pair in iterate(&v)? {
                    match pair {
                        Value::Array(kv) if kv.len() == 2 => {
                            map.insert(display(&kv[0]), kv[1].clone());
                        }
                        _ => {
                            return Err(EvalError::Value(
                                "dictionary update sequence element must have length 2"
                                    .to_string(),
                            ))
                        }
                    }
                }
                Ok(Value::Object(map))
            }
        },
        "sum" => {
            let (iterable, start) = match args.len() {
                1 | 2 => {
                    let mut it = args.into_iter();
                    let iterable = it.next().unwrap_or(Value::Null);
                    let start = it.next().unwrap_or(Value::from(0));
                    (iterable, start)
                }
                n => return Err(arity(name, "1 or 2", n)),
            };
            let mut acc = Num::from_value(&start).ok_or_else(|| {
                EvalError::Type(format!("sum() start must be a number, not '{}'", type_name(&start)))
            })?;
            for item in iterate(&iterable)? {
                let n = Num::from_value(&item).ok_or_else(|| {
                    EvalError::Type(format!(
                        "unsupported operand type(s) for +: 'int' and '{}'",
                        type_name(&item)
                    ))
                })?;
                acc = match (acc, n) {
                    (Num::Int(a), Num::Int(b)) => {
                        Num::Int(a.checked_add(b).ok_or(EvalError::Overflow)?)
                    }
                    (a, b) => Num::Float(a.as_f64() + b.as_f64()),
                };
            }
            acc.into_value()
        }
        "min" | "max" => {
            let candidates = match args.len() {
                0 => return Err(arity(name, "at least 1", 0)),
                1 => iterate(&args[0])?,
                _ => args,
            };
            let want = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut it = candidates.into_iter();
            let mut best = it
                .next()
                .ok_or_else(|| EvalError::Value(format!("{name}() arg is an empty sequence")))?;
            for item in it {
                if compare(&item, &best)? == want {
                    best = item;
                }
            }
            Ok(best)
        }
        "abs" => {
            let [v] = exactly::<1>(name, args)?;
            match Num::from_value(&v) {
                Some(Num::Int(i)) => i.checked_abs().map(Value::from).ok_or(EvalError::Overflow),
                Some(Num::Float(f)) => Num::Float(f.abs()).into_value(),
                None => Err(EvalError::Type(format!(
                    "bad operand type for abs(): '{}'",
                    type_name(&v)
                ))),
            }
        }
        "round" => round(args),
        "sorted" => {
            let [v] = exactly::<1>(name, args)?;
            let mut items = iterate(&v)?;
            let mut failure = None;
            items.sort_by(|a, b| match compare(a, b) {
                Ok(ord) => ord,
                Err(e) => {
                    failure.get_or_insert(e);
                    Ordering::Equal
                }
            });
            match failure {
                Some(e) => Err(e),
                None => Ok(Value::Array(items)),
            }
        }
        "enumerate" => {
            let (iterable, start) = match args.len() {
                1 | 2 => {
                    let mut it = args.into_iter();
                    let iterable = it.next().unwrap_or(Value::Null);
                    let start = match it.next() {
                        Some(v) => to_int(&v)?,
                        None => 0,
                    };
                    (iterable, start)
                }
                n => return Err(arity(name, "1 or 2", n)),
            };
            let mut out = Vec::new();
            for (i, item) in iterate(&iterable)?.into_iter().enumerate() {
                let offset = i64::try_from(i).map_err(|_| EvalError::Overflow)?;
                let index = start.checked_add(offset).ok_or(EvalError::Overflow)?;
                out.push(Value::Array(vec![Value::from(index), item]));
            }
            Ok(Value::Array(out))
        }
        "zip" => {
            let columns = args
                .iter()
                .map(iterate)
                .collect::<Result<Vec<_>, _>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::Array(
                (0..rows)
                    .map(|r| Value::Array(columns.iter().map(|c| c[r].clone()).collect()))
                    .collect(),
            ))
        }
        other => Err(EvalError::Forbidden(format!("call to '{other}'"))),
    }
}

fn arity(name: &str, expected: &str, got: usize) -> EvalError {
    EvalError::Type(format!(
        "{name}() takes {expected} argument(s) ({got} given)"
    ))
}

fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], EvalError> {
    let got = args.len();
    args.try_into()
        .map_err(|_| arity(name, &N.to_string(), got))
}

fn optional(name: &str, args: Vec<Value>) -> Result<Option<Value>, EvalError> {
    if args.len() > 1 {
        return Err(arity(name, "at most 1", args.len()));
    }
    Ok(args.into_iter().next())
}

/// Items of an iterable value: list elements, string characters, dict keys.
fn iterate(v: &Value) -> Result<Vec<Value>, EvalError> {
    match v {
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Object(map) => Ok(map.keys().cloned().map(Value::String).collect()),
        other => Err(EvalError::Type(format!(
            "'{}' object is not iterable",
            type_name(other)
        ))),
    }
}

fn to_int(v: &Value) -> Result<i64, EvalError> {
    match (v, Num::from_value(v)) {
        (_, Some(Num::Int(i))) => Ok(i),
        (_, Some(Num::Float(f))) => {
            let t = f.trunc();
            if t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64 {
                Ok(t as i64)
            } else {
                Err(EvalError::Overflow)
            }
        }
        (Value::String(s), None) => s.trim().parse::<i64>().map_err(|_| {
            EvalError::Value(format!("invalid literal for int() with base 10: '{s}'"))
        }),
        (other, None) => Err(EvalError::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            type_name(other)
        ))),
    }
}

fn to_float(v: &Value) -> Result<f64, EvalError> {
    match (v, Num::from_value(v)) {
        (_, Some(n)) => Ok(n.as_f64()),
        (Value::String(s), None) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::Value(format!("could not convert string to float: '{s}'"))),
        (other, None) => Err(EvalError::Type(format!(
            "float() argument must be a string or a number, not '{}'",
            type_name(other)
        ))),
    }
}

/// `round(x)` rounds half to even and returns an int; `round(x, n)` keeps
/// the input's numeric kind.
fn round(args: Vec<Value>) -> Result<Value, EvalError> {
    let (v, digits) = match args.len() {
        1 | 2 => {
            let mut it = args.into_iter();
            let v = it.next().unwrap_or(Value::Null);
            let digits = it.next().map(|d| to_int(&d)).transpose()?;
            (v, digits)
        }
        n => return Err(arity("round", "1 or 2", n)),
    };
    let num = Num::from_value(&v).ok_or_else(|| {
        EvalError::Type(format!(
            "type {} doesn't define __round__ method",
            type_name(&v)
        ))
    })?;
    match (num, digits) {
        (Num::Int(i), _) => Ok(Value::from(i)),
        (Num::Float(f), None) => to_int(&Value::from(f.round_ties_even())).map(Value::from),
        (Num::Float(f), Some(d)) => {
            let d = i32::try_from(d).map_err(|_| EvalError::Overflow)?;
            let scale = 10f64.powi(d);
            Num::Float((f * scale).round_ties_even() / scale).into_value()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call_json(name: &str, args: Value) -> Result<Value, EvalError> {
        let args = match args {
            Value::Array(a) => a,
            other => vec![other],
        };
        call(name, args)
    }

    #[test]
    fn test_len_counts_chars_items_and_keys() {
        assert_eq!(call_json("len", json!(["héllo"])).unwrap(), json!(5));
        assert_eq!(call_json("len", json!([[1, 2, 3]])).unwrap(), json!(3));
        assert_eq!(call_json("len", json!([{"a": 1}])).unwrap(), json!(1));
        assert!(call_json("len", json!([5])).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call_json("str", json!([1.5])).unwrap(), json!("1.5"));
        assert_eq!(call_json("str", json!([null])).unwrap(), json!("None"));
        assert_eq!(call_json("int", json!(["  42 "])).unwrap(), json!(42));
        assert_eq!(call_json("int", json!([3.9])).unwrap(), json!(3));
        assert_eq!(call_json("float", json!(["2.5"])).unwrap(), json!(2.5));
        assert_eq!(call_json("bool", json!([[]])).unwrap(), json!(false));
        assert!(call_json("int", json!(["abc"])).is_err());
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(call_json("sum", json!([[1, 2, 3]])).unwrap(), json!(6));
        assert_eq!(call_json("sum", json!([[1, 2.5]])).unwrap(), json!(3.5));
        assert_eq!(call_json("min", json!([[4, 2, 8]])).unwrap(), json!(2));
        assert_eq!(call_json("max", json!([4, 9, 8])).unwrap(), json!(9));
        assert!(call_json("max", json!([[]])).is_err());
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(call_json("round", json!([2.5])).unwrap(), json!(2));
        assert_eq!(call_json("round", json!([3.5])).unwrap(), json!(4));
        assert_eq!(call_json("round", json!([1.234, 2])).unwrap(), json!(1.23));
    }

    #[test]
    fn test_sorted_enumerate_zip() {
        assert_eq!(
            call_json("sorted", json!([["b", "a", "c"]])).unwrap(),
            json!(["a", "b", "c"])
        );
        assert!(call_json("sorted", json!([[1, "a"]])).is_err());
        assert_eq!(
            call_json("enumerate", json!([["x", "y"], 1])).unwrap(),
            json!([[1, "x"], [2, "y"]])
        );
        assert_eq!(
            call_json("zip", json!([[1, 2, 3], ["a", "b"]])).unwrap(),
            json!([[1, "a"], [2, "b"]])
        );
    }

    #[test]
    fn test_dict_from_pairs() {
        assert_eq!(
            call_json("dict", json!([[["a", 1], ["b", 2]]])).unwrap(),
            json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn test_arity_is_checked() {
        let err = call_json("len", json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("takes 1 argument"));
    }
}
