use boa_engine::{Context as BoaContext, JsError, JsObject, JsString, JsValue};
use evald_ipc::ExecutionFailure;
use regex::Regex;
use std::sync::LazyLock;

/// Name reported when user code throws something that is not an error object
pub const UNCAUGHT_VALUE: &str = "Uncaught";

/// `Name: message` on the first line of an engine error
static ERROR_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\w*Error): (.*)$").ok());

/// Parse an engine error string such as `ReferenceError: y is not defined`
/// into its name and message.
pub fn parse_js_error(error_message: &str) -> ExecutionFailure {
    let first_line = error_message.lines().next().unwrap_or_default();

    let parsed = ERROR_LINE.as_ref().and_then(|pattern| {
        pattern
            .captures(first_line)
            .map(|captures| (captures[1].to_string(), captures[2].to_string()))
    });

    let failure = match parsed {
        Some((ename, evalue)) => ExecutionFailure::new(ename, evalue),
        None => ExecutionFailure::new("Error", error_message.trim()),
    };

    failure.with_traceback(traceback_lines(error_message))
}

/// Describe an error thrown while evaluating user code.
///
/// Thrown objects are read through their `name`, `message` and `stack`
/// properties so subclasses keep their own name; everything else goes
/// through the engine's error text.
pub fn describe_js_error(error: &JsError, context: &mut BoaContext) -> ExecutionFailure {
    if let Some(value) = error.as_opaque() {
        return match value.as_object() {
            Some(object) => describe_thrown_object(object, context),
            None => ExecutionFailure::new(UNCAUGHT_VALUE, value.display().to_string()),
        };
    }

    parse_js_error(&error.to_string())
}

fn describe_thrown_object(object: &JsObject, context: &mut BoaContext) -> ExecutionFailure {
    let name = string_property(object, "name", context);
    let message = string_property(object, "message", context);

    if name.is_none() && message.is_none() {
        let shown = JsValue::from(object.clone()).display().to_string();
        return ExecutionFailure::new(UNCAUGHT_VALUE, shown);
    }

    let failure = ExecutionFailure::new(
        name.unwrap_or_else(|| "Error".to_string()),
        message.unwrap_or_default(),
    );

    match string_property(object, "stack", context) {
        Some(stack) if !stack.trim().is_empty() => {
            let extra: Vec<String> = traceback_lines(&stack)
                .into_iter()
                .filter(|line| !failure.traceback.contains(line))
                .collect();
            let mut traceback = failure.traceback.clone();
            traceback.extend(extra);
            failure.with_traceback(traceback)
        }
        _ => failure,
    }
}

fn string_property(object: &JsObject, key: &str, context: &mut BoaContext) -> Option<String> {
    let value = object.get(JsString::from(key), context).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }

    value
        .to_string(context)
        .ok()
        .map(|text| text.to_std_string_escaped())
}

fn traceback_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_line_pattern_is_shared() {
        assert!(ERROR_LINE.is_some());
        for _ in 0..3 {
            assert_eq!(parse_js_error("TypeError: x is null").ename, "TypeError");
        }
    }

    #[test]
    fn test_parse_reference_error() {
        let failure = parse_js_error("ReferenceError: y is not defined");
        assert_eq!(failure.ename, "ReferenceError");
        assert_eq!(failure.evalue, "y is not defined");
        assert_eq!(failure.traceback, vec!["ReferenceError: y is not defined"]);
    }

    #[test]
    fn test_parse_multiline_error_keeps_all_lines() {
        let failure = parse_js_error("SyntaxError: unexpected token\n    at line 1, col 3\n");
        assert_eq!(failure.ename, "SyntaxError");
        assert_eq!(failure.evalue, "unexpected token");
        assert_eq!(failure.traceback.len(), 2);
    }

    #[test]
    fn test_parse_unrecognized_text() {
        let failure = parse_js_error("something odd happened");
        assert_eq!(failure.ename, "Error");
        assert_eq!(failure.evalue, "something odd happened");
    }
}
