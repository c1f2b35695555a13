//! Recognizes tool requests in raw model output.
//!
//! The system prompt asks the model to answer either in prose or with a bare
//! JSON object of the form `{"tool": "<name>", "args": {...}}`. Prose is the
//! common case, so failing to parse is a normal negative result.

use serde_json::{Map, Value};

/// Raw tool arguments as emitted by the model.
pub type Arguments = Map<String, Value>;

/// A structured tool request parsed from one model response.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub arguments: Arguments,
}

impl Invocation {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Text of a value that should have been a string; other values keep their JSON form.
pub(crate) fn value_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Returns the invocation encoded in `raw`, if any.
pub fn parse_invocation(raw: &str) -> Option<Invocation> {
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(raw) else {
        return None;
    };
    let name = value_text(object.remove("tool")?);
    let arguments = match object.remove("args") {
        Some(Value::Object(arguments)) => arguments,
        _ => Arguments::new(),
    };
    Some(Invocation { name, arguments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prose_and_non_objects_are_not_invocations() {
        for raw in [
            "",
            "   ",
            "Hi there! How can I help?",
            "[1, 2, 3]",
            "[{\"tool\": \"calc\"}]",
            "42",
            "null",
            "\"get_time\"",
            "{\"args\": {\"zone\": \"UTC\"}}",
            "{\"tool\": \"calc\"",
            "Sure: {\"tool\": \"calc\"}",
        ] {
            assert_eq!(parse_invocation(raw), None, "input: {raw:?}");
        }
    }

    #[test]
    fn parses_name_and_arguments() {
        let call = parse_invocation(r#"{"tool":"calc","args":{"op":"add","a":2,"b":3}}"#).unwrap();

        assert_eq!(call.name, "calc");
        assert_eq!(call.arguments.get("op"), Some(&json!("add")));
        assert_eq!(call.arguments.len(), 3);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let call = parse_invocation("\n  {\"tool\": \"get_time\"}\n").unwrap();
        assert_eq!(call.name, "get_time");
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn non_object_args_become_empty() {
        for raw in [
            r#"{"tool":"get_time","args":null}"#,
            r#"{"tool":"get_time","args":["UTC"]}"#,
            r#"{"tool":"get_time","args":"UTC"}"#,
        ] {
            let call = parse_invocation(raw).unwrap();
            assert!(call.arguments.is_empty(), "input: {raw}");
        }
    }

    #[test]
    fn non_string_tool_names_are_stringified() {
        assert_eq!(parse_invocation(r#"{"tool":7}"#).unwrap().name, "7");
        assert_eq!(parse_invocation(r#"{"tool":null}"#).unwrap().name, "null");
        assert_eq!(parse_invocation(r#"{"tool":true}"#).unwrap().name, "true");
    }
}
