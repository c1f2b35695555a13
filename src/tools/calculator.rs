//! `calc(op, a, b)`.
//!
//! Domain failures (bad operands, unknown operations, division by zero) are
//! ordinary outcomes rendered as explanatory text, never errors.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::parser::{value_text, Arguments};
use crate::tool::Tool;

pub struct Calculator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl CalcOp {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(CalcOp::Add),
            "sub" => Some(CalcOp::Sub),
            "mul" => Some(CalcOp::Mul),
            "div" => Some(CalcOp::Div),
            _ => None,
        }
    }
}

/// An argument after numeric coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Invalid(String),
}

impl Operand {
    /// Missing operands count as zero.
    pub fn coerce(value: Option<&Value>) -> Self {
        match value {
            None => Operand::Number(0.0),
            Some(Value::Number(number)) => number
                .as_f64()
                .map(Operand::Number)
                .unwrap_or_else(|| Operand::Invalid(format!("number out of range: {number}"))),
            Some(Value::Bool(flag)) => Operand::Number(if *flag { 1.0 } else { 0.0 }),
            Some(Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .map(Operand::Number)
                .unwrap_or_else(|_| {
                    Operand::Invalid(format!("could not convert string to float: '{text}'"))
                }),
            Some(Value::Null) => Operand::Invalid("expected a number, found null".into()),
            Some(Value::Array(_)) => Operand::Invalid("expected a number, found array".into()),
            Some(Value::Object(_)) => Operand::Invalid("expected a number, found object".into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalcArgs {
    pub op: String,
    pub a: Operand,
    pub b: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalcOutcome {
    Value(f64),
    DivisionByZero,
    InvalidOperand(String),
    UnknownOp(String),
}

impl fmt::Display for CalcOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcOutcome::Value(value) => f.write_str(&format_float(*value)),
            CalcOutcome::DivisionByZero => f.write_str("Error: division by zero"),
            CalcOutcome::InvalidOperand(detail) => write!(f, "Calc error: {detail}"),
            CalcOutcome::UnknownOp(op) => write!(f, "Unknown op: {op}"),
        }
    }
}

/// Operands are checked before the operation, `a` before `b`.
pub fn evaluate(args: &CalcArgs) -> CalcOutcome {
    let (x, y) = match (&args.a, &args.b) {
        (Operand::Invalid(detail), _) | (_, Operand::Invalid(detail)) => {
            return CalcOutcome::InvalidOperand(detail.clone())
        }
        (Operand::Number(x), Operand::Number(y)) => (*x, *y),
    };
    match CalcOp::from_name(&args.op) {
        Some(CalcOp::Add) => CalcOutcome::Value(x + y),
        Some(CalcOp::Sub) => CalcOutcome::Value(x - y),
        Some(CalcOp::Mul) => CalcOutcome::Value(x * y),
        Some(CalcOp::Div) if y == 0.0 => CalcOutcome::DivisionByZero,
        Some(CalcOp::Div) => CalcOutcome::Value(x / y),
        None => CalcOutcome::UnknownOp(args.op.clone()),
    }
}

/// Renders a float the way it reads in a conversational reply: integral values
/// keep a trailing `.0`, very large or small magnitudes use an `e+NN`/`e-NN` exponent.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.into();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let scientific = format!("{value:e}");
        if let Some((mantissa, exponent)) = scientific.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                let sign = if exponent < 0 { '-' } else { '+' };
                return format!("{mantissa}e{sign}{:02}", exponent.abs());
            }
        }
        return scientific;
    }
    let plain = value.to_string();
    if plain.contains('.') {
        plain
    } else {
        format!("{plain}.0")
    }
}

#[async_trait]
impl Tool for Calculator {
    type Args = CalcArgs;
    type Output = CalcOutcome;

    fn name(&self) -> &'static str {
        "calc"
    }

    fn signature(&self) -> &'static str {
        "calc(op, a, b)"
    }

    fn description(&self) -> &'static str {
        "op in [add, sub, mul, div]; a and b are numbers."
    }

    fn parse_args(&self, arguments: &Arguments) -> Result<CalcArgs> {
        let op = arguments.get("op").cloned().map(value_text).unwrap_or_default();
        Ok(CalcArgs {
            op,
            a: Operand::coerce(arguments.get("a")),
            b: Operand::coerce(arguments.get("b")),
        })
    }

    async fn call(&self, args: CalcArgs) -> Result<CalcOutcome> {
        Ok(evaluate(&args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn calc(raw: Value) -> CalcOutcome {
        let args = Calculator.parse_args(raw.as_object().unwrap()).unwrap();
        evaluate(&args)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(calc(json!({"op":"add","a":2,"b":3})).to_string(), "5.0");
        assert_eq!(calc(json!({"op":"sub","a":2,"b":3.5})).to_string(), "-1.5");
        assert_eq!(calc(json!({"op":"mul","a":"4","b":2.5})).to_string(), "10.0");
        assert_eq!(calc(json!({"op":"div","a":1,"b":4})).to_string(), "0.25");
        assert_eq!(calc(json!({"op":"add","a":0.1,"b":0.2})).to_string(), "0.30000000000000004");
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(calc(json!({"op":"div","a":4,"b":0})), CalcOutcome::DivisionByZero);
        assert_eq!(
            calc(json!({"op":"div","a":4,"b":-0.0})).to_string(),
            "Error: division by zero"
        );
    }

    #[test]
    fn unknown_ops_are_echoed_verbatim() {
        assert_eq!(calc(json!({"op":"pow","a":2,"b":3})).to_string(), "Unknown op: pow");
        assert_eq!(calc(json!({"op":"ADD","a":2,"b":3})).to_string(), "Unknown op: ADD");
        assert_eq!(calc(json!({"a":2,"b":3})).to_string(), "Unknown op: ");
    }

    #[test]
    fn non_string_ops_render_like_tool_names() {
        assert_eq!(calc(json!({"op":true,"a":1,"b":1})).to_string(), "Unknown op: true");
        assert_eq!(calc(json!({"op":null})).to_string(), "Unknown op: null");
        assert_eq!(calc(json!({"op":["add"]})).to_string(), r#"Unknown op: ["add"]"#);
    }

    #[test]
    fn bad_operands_win_over_bad_ops() {
        assert_eq!(
            calc(json!({"op":"pow","a":"two","b":3})).to_string(),
            "Calc error: could not convert string to float: 'two'"
        );
        assert_eq!(
            calc(json!({"op":"add","a":1,"b":null})).to_string(),
            "Calc error: expected a number, found null"
        );
    }

    #[test]
    fn missing_operands_default_to_zero() {
        assert_eq!(calc(json!({"op":"add"})).to_string(), "0.0");
        assert_eq!(calc(json!({"op":"div","a":3})), CalcOutcome::DivisionByZero);
        assert_eq!(calc(json!({"op":"add","a":true,"b":false})).to_string(), "1.0");
    }

    #[test]
    fn float_rendering() {
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(123456.0), "123456.0");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }
}
