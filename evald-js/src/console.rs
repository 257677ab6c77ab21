//! Minimal `console` global writing to the worker's stdout and stderr

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{
    js_string, Context as BoaContext, JsNativeError, JsResult, JsValue, NativeFunction,
};
use std::io::Write;

use crate::JsEvalError;

/// Register `console.{log,info,debug,warn,error}` in the global object
pub fn register_console(context: &mut BoaContext) -> Result<(), JsEvalError> {
    let console = ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(write_stdout), js_string!("log"), 0)
        .function(NativeFunction::from_fn_ptr(write_stdout), js_string!("info"), 0)
        .function(NativeFunction::from_fn_ptr(write_stdout), js_string!("debug"), 0)
        .function(NativeFunction::from_fn_ptr(write_stderr), js_string!("warn"), 0)
        .function(NativeFunction::from_fn_ptr(write_stderr), js_string!("error"), 0)
        .build();

    context
        .register_global_property(js_string!("console"), console, Attribute::all())
        .map_err(|e| JsEvalError::GlobalRegistration {
            name: "console".to_string(),
            message: e.to_string(),
        })
}

fn write_stdout(_this: &JsValue, args: &[JsValue], context: &mut BoaContext) -> JsResult<JsValue> {
    let line = format_arguments(args, context);
    writeln!(std::io::stdout().lock(), "{}", line)
        .map_err(|e| JsNativeError::error().with_message(e.to_string()))?;
    Ok(JsValue::undefined())
}

fn write_stderr(_this: &JsValue, args: &[JsValue], context: &mut BoaContext) -> JsResult<JsValue> {
    let line = format_arguments(args, context);
    writeln!(std::io::stderr().lock(), "{}", line)
        .map_err(|e| JsNativeError::error().with_message(e.to_string()))?;
    Ok(JsValue::undefined())
}

/// Strings print raw, everything else uses the engine's display form
fn format_arguments(args: &[JsValue], context: &mut BoaContext) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_string() {
                arg.to_string(context)
                    .map(|text| text.to_std_string_escaped())
                    .unwrap_or_default()
            } else {
                arg.display().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    #[test]
    fn test_format_arguments() {
        let mut context = BoaContext::default();
        let args = [JsValue::from(js_string!("count:")), JsValue::from(3)];
        assert_eq!(format_arguments(&args, &mut context), "count: 3");
    }

    #[test]
    fn test_console_is_callable_from_script() {
        let mut context = BoaContext::default();
        register_console(&mut context).unwrap();

        let result = context
            .eval(Source::from_bytes("typeof console.log + ' ' + typeof console.error"))
            .unwrap();
        assert_eq!(
            result.to_string(&mut context).unwrap().to_std_string_escaped(),
            "function function"
        );
    }
}
