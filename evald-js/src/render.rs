//! Rendering of evaluated values into MIME bundles

use boa_engine::JsValue;
use evald_ipc::Outcome;

/// Render a value as `text/plain` and `text/html`. Strings keep their
/// quotes so `"1"` and `1` stay distinguishable.
pub fn render_value(value: &JsValue) -> Outcome {
    let text = value.display().to_string();
    let html = format!("<pre>{}</pre>", escape_html(&text));
    Outcome::rendered(text, html)
}

/// Escape text for embedding in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
