//! Evaluator for parsed embedded script blocks.
//!
//! Values are `serde_json::Value`s converted the way PHP converts scalars.
//! Only the allow-listed functions below can be called.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use super::EvalError;
use super::parser::{BinaryOp, Expr, ExprKind, Stmt};
use crate::AssetResolver;
use crate::asset_functions::url_wrapper;

/// What a block is allowed to see of the outside world.
pub(crate) struct Capabilities<'a> {
    pub assets: &'a Arc<dyn AssetResolver>,
    pub variables: &'a Map<String, Value>,
    pub production: bool,
}

/// Evaluates the blocks of one file. Variables live as long as the interpreter.
pub(crate) struct Interpreter<'a> {
    caps: Capabilities<'a>,
    scope: HashMap<String, Value>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(caps: Capabilities<'a>) -> Self {
        Self {
            caps,
            scope: HashMap::new(),
        }
    }

    /// Runs `statements` and returns everything they echoed.
    pub(crate) fn run(&mut self, statements: &[Stmt]) -> Result<String, EvalError> {
        let mut output = String::new();

        for stmt in statements {
            match stmt {
                Stmt::Echo(values) => {
                    for expr in values {
                        let value = self.eval(expr)?;
                        output.push_str(&to_text(&value, expr.line)?);
                    }
                }
                Stmt::Assign { name, value } => {
                    let value = self.eval(value)?;
                    self.scope.insert(name.clone(), value);
                }
                Stmt::Expr(expr) => {
                    self.eval(expr)?;
                }
            }
        }

        Ok(output)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        let line = expr.line;

        match &expr.kind {
            ExprKind::Str(s) => Ok(Value::String(s.clone())),
            ExprKind::Int(i) => Ok(Value::from(*i)),
            ExprKind::Float(f) => float(*f, line),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Var(name) => self
                .scope
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::new(format!("undefined variable ${}", name), line)),
            ExprKind::Array(items) => self.array(items, line),
            ExprKind::Neg(operand) => {
                let value = self.eval(operand)?;
                match to_number(&value, line)? {
                    Num::Int(i) => match i.checked_neg() {
                        Some(n) => Ok(Value::from(n)),
                        None => float(-(i as f64), line),
                    },
                    Num::Float(f) => float(-f, line),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, &lhs, &rhs, line)
            }
            ExprKind::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, &args, line)
            }
        }
    }

    fn array(&self, items: &[(Option<Expr>, Expr)], line: usize) -> Result<Value, EvalError> {
        if items.iter().all(|(key, _)| key.is_none()) {
            let values = items
                .iter()
                .map(|(_, value)| self.eval(value))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::Array(values));
        }

        let mut map = Map::new();
        let mut next_index: i64 = 0;
        for (key, value) in items {
            let key = match key {
                Some(key) => {
                    let key = self.eval(key)?;
                    if let Some(i) = key.as_i64() {
                        next_index = next_index.max(i.saturating_add(1));
                    }
                    to_text(&key, line)?
                }
                None => {
                    let index = next_index;
                    next_index = next_index
                        .checked_add(1)
                        .ok_or_else(|| EvalError::new("array index overflow", line))?;
                    index.to_string()
                }
            };
            map.insert(key, self.eval(value)?);
        }
        Ok(Value::Object(map))
    }

    fn call(&self, name: &str, args: &[Value], line: usize) -> Result<Value, EvalError> {
        let lowered = name.to_ascii_lowercase();

        match lowered.as_str() {
            "asset_path" | "asset_url" => {
                arity(&lowered, args, 1, 1, line)?;
                let Value::String(asset) = &args[0] else {
                    return Err(EvalError::new(
                        format!("{}() expects a string argument", lowered),
                        line,
                    ));
                };
                let path = self.caps.assets.resolve(asset).map_err(|_| {
                    EvalError::new(format!("{}(): missing asset '{}'", lowered, asset), line)
                })?;
                if lowered == "asset_url" {
                    Ok(Value::String(url_wrapper(&path)))
                } else {
                    Ok(Value::String(path))
                }
            }
            "config" => {
                arity(&lowered, args, 1, 2, line)?;
                let key = to_text(&args[0], line)?;
                Ok(lookup(self.caps.variables, &key)
                    .cloned()
                    .or_else(|| args.get(1).cloned())
                    .unwrap_or(Value::Null))
            }
            "is_production" => {
                arity(&lowered, args, 0, 0, line)?;
                Ok(Value::Bool(self.caps.production))
            }
            "json_encode" => {
                arity(&lowered, args, 1, 1, line)?;
                serde_json::to_string(&args[0])
                    .map(Value::String)
                    .map_err(|e| EvalError::new(format!("json_encode(): {}", e), line))
            }
            "strtoupper" => {
                arity(&lowered, args, 1, 1, line)?;
                Ok(Value::String(to_text(&args[0], line)?.to_uppercase()))
            }
            "strtolower" => {
                arity(&lowered, args, 1, 1, line)?;
                Ok(Value::String(to_text(&args[0], line)?.to_lowercase()))
            }
            "trim" => {
                arity(&lowered, args, 1, 1, line)?;
                Ok(Value::String(to_text(&args[0], line)?.trim().to_string()))
            }
            "count" => {
                arity(&lowered, args, 1, 1, line)?;
                match &args[0] {
                    Value::Array(items) => Ok(Value::from(items.len())),
                    Value::Object(map) => Ok(Value::from(map.len())),
                    other => Err(EvalError::new(
                        format!("count(): argument must be an array, {} given", type_name(other)),
                        line,
                    )),
                }
            }
            "implode" => {
                arity(&lowered, args, 2, 2, line)?;
                let separator = to_text(&args[0], line)?;
                let parts = match &args[1] {
                    Value::Array(items) => items
                        .iter()
                        .map(|v| to_text(v, line))
                        .collect::<Result<Vec<_>, _>>()?,
                    Value::Object(map) => map
                        .values()
                        .map(|v| to_text(v, line))
                        .collect::<Result<Vec<_>, _>>()?,
                    other => {
                        return Err(EvalError::new(
                            format!(
                                "implode(): argument #2 must be an array, {} given",
                                type_name(other)
                            ),
                            line,
                        ));
                    }
                };
                Ok(Value::String(parts.join(&separator)))
            }
            _ => Err(EvalError::new(
                format!("call to undefined function {}()", name),
                line,
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value, line: usize) -> Result<Value, EvalError> {
    if op == BinaryOp::Concat {
        let mut text = to_text(lhs, line)?;
        text.push_str(&to_text(rhs, line)?);
        return Ok(Value::String(text));
    }

    let a = to_number(lhs, line)?;
    let b = to_number(rhs, line)?;

    if op == BinaryOp::Div {
        if b.as_f64() == 0.0 {
            return Err(EvalError::new("division by zero", line));
        }
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) if x.checked_rem(y) == Some(0) => match x.checked_div(y) {
                Some(n) => Ok(Value::from(n)),
                None => float(a.as_f64() / b.as_f64(), line),
            },
            _ => float(a.as_f64() / b.as_f64(), line),
        };
    }

    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            _ => x.checked_mul(y),
        };
        if let Some(n) = exact {
            return Ok(Value::from(n));
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        _ => x * y,
    };
    float(result, line)
}

fn float(f: f64, line: usize) -> Result<Value, EvalError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| EvalError::new("arithmetic result is not a finite number", line))
}

fn to_number(value: &Value, line: usize) -> Result<Num, EvalError> {
    match value {
        Value::Null => Ok(Num::Int(0)),
        Value::Bool(b) => Ok(Num::Int(i64::from(*b))),
        Value::Number(n) => Ok(n
            .as_i64()
            .map(Num::Int)
            .unwrap_or_else(|| Num::Float(n.as_f64().unwrap_or(0.0)))),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Ok(Num::Int(i))
            } else if let Ok(f) = trimmed.parse::<f64>()
                && f.is_finite()
            {
                Ok(Num::Float(f))
            } else {
                Err(EvalError::new(
                    format!("unsupported operand: non-numeric string \"{}\"", s),
                    line,
                ))
            }
        }
        other => Err(EvalError::new(
            format!("unsupported operand type {}", type_name(other)),
            line,
        )),
    }
}

/// String conversion used by `echo` and `.`.
fn to_text(value: &Value, line: usize) -> Result<String, EvalError> {
    match value {
        Value::Null | Value::Bool(false) => Ok(String::new()),
        Value::Bool(true) => Ok("1".to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => f.to_string(),
            _ => n.to_string(),
        }),
        Value::Array(_) | Value::Object(_) => {
            Err(EvalError::new("array to string conversion", line))
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "array",
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize, line: usize) -> Result<(), EvalError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{} to {}", min, max)
    };
    Err(EvalError::new(
        format!(
            "{}() expects {} argument(s), {} given",
            name,
            expected,
            args.len()
        ),
        line,
    ))
}

/// Looks up `key` directly, then as a dotted path into nested objects.
fn lookup<'v>(variables: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    if let Some(value) = variables.get(key) {
        return Some(value);
    }

    let mut parts = key.split('.');
    let mut current = variables.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedded::lexer::Lexer;
    use crate::embedded::parser::Parser;
    use crate::resolver::test_support::assets;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn run_with(source: &str, production: bool) -> Result<String, EvalError> {
        let assets = assets(&[("logo.svg", "/img/logo.svg")]);
        let variables = json!({
            "app": { "name": "Kiln" },
            "debug": true,
            "api.base": "/api",
        });
        let variables = variables.as_object().unwrap();

        let statements = Parser::new(Lexer::new(source).tokenize()?).parse()?;
        let mut interpreter = Interpreter::new(Capabilities {
            assets: &assets,
            variables,
            production,
        });
        interpreter.run(&statements)
    }

    fn run(source: &str) -> Result<String, EvalError> {
        run_with(source, false)
    }

    #[rstest]
    #[case("echo 'a' . 'b';", "ab")]
    #[case("echo 1 + 2 * 3;", "7")]
    #[case("echo (1 + 2) * 3;", "9")]
    #[case("echo 7 / 2;", "3.5")]
    #[case("echo 6 / 3;", "2")]
    #[case("echo -2 - -3;", "1")]
    #[case("echo 'n=' . 1 + 2;", "n=3")]
    #[case("echo '5' + 1;", "6")]
    #[case("echo true, false, null;", "1")]
    #[case("echo 1.5 * 2;", "3")]
    #[case("echo 'v' . 2.5;", "v2.5")]
    fn test_expressions(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source).unwrap(), expected);
    }

    #[test]
    fn test_variables_persist_between_runs() {
        let assets = assets(&[]);
        let variables = Map::new();
        let mut interpreter = Interpreter::new(Capabilities {
            assets: &assets,
            variables: &variables,
            production: false,
        });

        let first = Parser::new(Lexer::new("$x = 'kept';").tokenize().unwrap())
            .parse()
            .unwrap();
        let second = Parser::new(Lexer::new("echo $x;").tokenize().unwrap())
            .parse()
            .unwrap();

        assert_eq!(interpreter.run(&first).unwrap(), "");
        assert_eq!(interpreter.run(&second).unwrap(), "kept");
    }

    #[rstest]
    #[case("echo asset_path('logo.svg');", "/img/logo.svg")]
    #[case("echo asset_url('logo.svg');", "url(/img/logo.svg)")]
    #[case("echo config('app.name');", "Kiln")]
    #[case("echo config('api.base');", "/api")]
    #[case("echo config('missing', 'fallback');", "fallback")]
    #[case("echo STRTOUPPER('abc');", "ABC")]
    #[case("echo strtolower('ABC');", "abc")]
    #[case("echo trim('  x  ');", "x")]
    #[case("echo count([1, 2, 3]);", "3")]
    #[case("echo implode(', ', ['a', 'b']);", "a, b")]
    #[case("echo json_encode(['a' => 1, 'b' => [true, null]]);", r#"{"a":1,"b":[true,null]}"#)]
    #[case("echo json_encode(['x', 'y']);", r#"["x","y"]"#)]
    #[case("echo json_encode(config('app'));", r#"{"name":"Kiln"}"#)]
    fn test_functions(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(run(source).unwrap(), expected);
    }

    #[test]
    fn test_is_production() {
        assert_eq!(run_with("echo is_production() . '';", false).unwrap(), "");
        assert_eq!(run_with("echo is_production();", true).unwrap(), "1");
    }

    #[rstest]
    #[case("echo $nope;", "undefined variable $nope")]
    #[case("echo 1 / 0;", "division by zero")]
    #[case("echo exec('ls');", "call to undefined function exec()")]
    #[case("echo strtoupper();", "strtoupper() expects 1 argument(s), 0 given")]
    #[case("echo asset_path('nope.svg');", "asset_path(): missing asset 'nope.svg'")]
    #[case("echo [1];", "array to string conversion")]
    #[case("echo 'a' * 2;", "unsupported operand: non-numeric string \"a\"")]
    #[case("echo count('a');", "count(): argument must be an array, string given")]
    #[case("echo json_encode([9223372036854775807 => 'a', 'b']);", "array index overflow")]
    fn test_errors(#[case] source: &str, #[case] message: &str) {
        assert_eq!(run(source).unwrap_err().message, message);
    }

    #[test]
    fn test_error_line_is_expression_line() {
        let err = run("$a = 1;\n$b = 2;\necho $a /\n  0;").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_int_overflow_falls_back_to_float() {
        assert_eq!(
            run("echo (-9223372036854775807 - 1) / -1;").unwrap(),
            "9223372036854775808"
        );
        assert_eq!(run("echo 9223372036854775807 + 1;").unwrap(), "9223372036854775808");
    }
}
