//! JavaScript evaluator for evald worker processes
//!
//! This crate wraps a single Boa context that lives for the whole life of a
//! worker, so bindings made by one snippet are visible to the next. It turns
//! evaluation outcomes into the protocol shapes defined in `evald-ipc`.

pub mod console;
pub mod error_handling;
pub mod evaluator;
pub mod render;

pub use error_handling::{describe_js_error, parse_js_error};
pub use evaluator::JsEvaluator;
pub use render::{escape_html, render_value};

use thiserror::Error;

/// Errors raised while preparing the evaluator itself.
///
/// Errors thrown by user code are never reported through this type; they
/// become `Outcome::Error` payloads.
#[derive(Error, Debug)]
pub enum JsEvalError {
    #[error("Failed to register global '{name}': {message}")]
    GlobalRegistration { name: String, message: String },

    #[error("Failed to compile helper script: {0}")]
    HelperCompile(String),
}
