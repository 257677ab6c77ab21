//! Persistent JavaScript evaluation context

use boa_engine::{Context as BoaContext, JsObject, JsValue, Source};
use evald_ipc::{Action, ExecutionFailure, Outcome, WorkerRequest};
use tracing::{debug, trace};

use crate::console::register_console;
use crate::error_handling::describe_js_error;
use crate::render::render_value;
use crate::JsEvalError;

/// Collects string property names along the prototype chain, first-seen
/// order, as a JSON string. Builtins are captured up front so user code that
/// reassigns `Object` or `JSON` cannot break completion.
const PROPERTY_NAMES_HELPER: &str = r#"
(() => {
    const ownNames = Object.getOwnPropertyNames;
    const protoOf = Object.getPrototypeOf;
    const box = Object;
    const stringify = JSON.stringify;
    return function (value) {
        if (value === undefined || value === null) {
            return "[]";
        }
        const seen = new Set();
        const names = [];
        for (let obj = box(value); obj !== null; obj = protoOf(obj)) {
            for (const name of ownNames(obj)) {
                if (!seen.has(name)) {
                    seen.add(name);
                    names.push(name);
                }
            }
        }
        return stringify(names);
    };
})()
"#;

/// A JavaScript context whose global state survives between requests
pub struct JsEvaluator {
    context: BoaContext,
    property_names: JsObject,
}

impl JsEvaluator {
    /// Create an evaluator with `console` registered
    pub fn new() -> Result<Self, JsEvalError> {
        let mut context = BoaContext::default();
        register_console(&mut context)?;

        let helper = context
            .eval(Source::from_bytes(PROPERTY_NAMES_HELPER))
            .map_err(|e| JsEvalError::HelperCompile(e.to_string()))?;
        let property_names = helper
            .as_callable()
            .cloned()
            .ok_or_else(|| JsEvalError::HelperCompile("helper is not callable".to_string()))?;

        Ok(Self {
            context,
            property_names,
        })
    }

    /// Handle one worker request
    pub fn evaluate(&mut self, request: &WorkerRequest) -> Outcome {
        debug!(action = %request.action(), "Evaluating request");
        match request.action() {
            Action::Run => self.run(request.code()),
            Action::GetAllPropertyNames => self.property_names(request.code()),
        }
    }

    /// Evaluate code and render the completion value
    pub fn run(&mut self, code: &str) -> Outcome {
        match self.context.eval(Source::from_bytes(code)) {
            Ok(value) => render_value(&value),
            Err(error) => {
                let failure = describe_js_error(&error, &mut self.context);
                trace!(ename = %failure.ename, "Evaluation threw");
                Outcome::Error(failure)
            }
        }
    }

    /// Evaluate code and list the property names of the resulting value
    pub fn property_names(&mut self, code: &str) -> Outcome {
        let value = match self.context.eval(Source::from_bytes(code)) {
            Ok(value) => value,
            Err(error) => return Outcome::Error(describe_js_error(&error, &mut self.context)),
        };

        let listed = match self
            .property_names
            .call(&JsValue::undefined(), &[value], &mut self.context)
        {
            Ok(listed) => listed,
            Err(error) => return Outcome::Error(describe_js_error(&error, &mut self.context)),
        };

        let json = match listed.to_string(&mut self.context) {
            Ok(json) => json.to_std_string_escaped(),
            Err(error) => return Outcome::Error(describe_js_error(&error, &mut self.context)),
        };

        match serde_json::from_str::<Vec<String>>(&json) {
            Ok(names) => Outcome::Names(names),
            Err(e) => Outcome::Error(ExecutionFailure::new("InternalError", e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evald_ipc::TEXT_PLAIN;

    fn text_plain(outcome: &Outcome) -> String {
        match outcome {
            Outcome::Mime(mime) => mime.get(TEXT_PLAIN).cloned().unwrap_or_default(),
            other => panic!("expected mime outcome, got {:?}", other),
        }
    }

    fn failure(outcome: Outcome) -> ExecutionFailure {
        match outcome {
            Outcome::Error(failure) => failure,
            other => panic!("expected error outcome, got {:?}", other),
        }
    }

    fn names(outcome: Outcome) -> Vec<String> {
        match outcome {
            Outcome::Names(names) => names,
            other => panic!("expected names outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_bindings_persist_between_runs() {
        let mut evaluator = JsEvaluator::new().unwrap();

        let first = evaluator.run("let x = 41;");
        assert!(!first.is_error());
        assert_eq!(text_plain(&first), "undefined");

        let second = evaluator.run("x + 1;");
        assert_eq!(text_plain(&second), "42");
    }

    #[test]
    fn test_strings_render_quoted() {
        let mut evaluator = JsEvaluator::new().unwrap();

        let outcome = evaluator.run("'still runs'");
        assert_eq!(text_plain(&outcome), "\"still runs\"");
        match outcome {
            Outcome::Mime(mime) => assert_eq!(
                mime.get(evald_ipc::TEXT_HTML).map(String::as_str),
                Some("<pre>&quot;still runs&quot;</pre>")
            ),
            other => panic!("expected mime outcome, got {:?}", other),
        }

        assert_eq!(text_plain(&evaluator.run("'1'")), "\"1\"");
        assert_eq!(text_plain(&evaluator.run("1")), "1");
    }

    #[test]
    fn test_unbound_name_is_reference_error() {
        let mut evaluator = JsEvaluator::new().unwrap();
        let error = failure(evaluator.run("y;"));
        assert_eq!(error.ename, "ReferenceError");
        assert!(!error.traceback.is_empty());
    }

    #[test]
    fn test_syntax_error() {
        let mut evaluator = JsEvaluator::new().unwrap();
        let error = failure(evaluator.run("let = ;"));
        assert_eq!(error.ename, "SyntaxError");
    }

    #[test]
    fn test_thrown_errors_keep_their_name() {
        let mut evaluator = JsEvaluator::new().unwrap();

        let error = failure(evaluator.run("throw new TypeError('bad input');"));
        assert_eq!(error.ename, "TypeError");
        assert_eq!(error.evalue, "bad input");

        let error = failure(evaluator.run(
            "class QuotaError extends Error { constructor(m) { super(m); this.name = 'QuotaError'; } }\n\
             throw new QuotaError('over quota');",
        ));
        assert_eq!(error.ename, "QuotaError");
        assert_eq!(error.evalue, "over quota");
    }

    #[test]
    fn test_thrown_primitive() {
        let mut evaluator = JsEvaluator::new().unwrap();
        let error = failure(evaluator.run("throw 7;"));
        assert_eq!(error.ename, "Uncaught");
        assert_eq!(error.evalue, "7");
    }

    #[test]
    fn test_failed_run_keeps_earlier_state() {
        let mut evaluator = JsEvaluator::new().unwrap();
        evaluator.run("var total = 10;");
        assert!(evaluator.run("missing();").is_error());
        assert_eq!(text_plain(&evaluator.run("total * 2")), "20");
    }

    #[test]
    fn test_property_names_walk_prototype_chain() {
        let mut evaluator = JsEvaluator::new().unwrap();

        let listed = names(evaluator.property_names("({ alpha: 1, beta: 2 })"));
        assert_eq!(&listed[..2], &["alpha".to_string(), "beta".to_string()]);
        assert!(listed.contains(&"hasOwnProperty".to_string()));

        let listed = names(evaluator.property_names("[1, 2, 3]"));
        assert!(listed.contains(&"length".to_string()));
        assert!(listed.contains(&"push".to_string()));
        let unique: std::collections::HashSet<_> = listed.iter().collect();
        assert_eq!(unique.len(), listed.len());
    }

    #[test]
    fn test_property_names_of_primitives() {
        let mut evaluator = JsEvaluator::new().unwrap();
        assert!(names(evaluator.property_names("undefined")).is_empty());
        assert!(names(evaluator.property_names("null")).is_empty());
        assert!(names(evaluator.property_names("'abc'")).contains(&"length".to_string()));
    }

    #[test]
    fn test_property_names_survive_user_overrides() {
        let mut evaluator = JsEvaluator::new().unwrap();
        evaluator.run("var JSON = undefined;");
        let listed = names(evaluator.property_names("({ kept: true })"));
        assert_eq!(listed.first().map(String::as_str), Some("kept"));
    }

    #[test]
    fn test_property_names_of_failing_code() {
        let mut evaluator = JsEvaluator::new().unwrap();
        let error = failure(evaluator.property_names("notDefinedAnywhere"));
        assert_eq!(error.ename, "ReferenceError");
    }

    #[test]
    fn test_evaluate_dispatches_on_action() {
        let mut evaluator = JsEvaluator::new().unwrap();
        let run = evaluator.evaluate(&WorkerRequest::new(Action::Run, "'a' + 'b'"));
        assert!(matches!(run, Outcome::Mime(_)));

        let listed = evaluator.evaluate(&WorkerRequest::new(Action::GetAllPropertyNames, "Math"));
        assert!(names(listed).contains(&"floor".to_string()));
    }
}
