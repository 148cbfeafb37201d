use once_cell::sync::Lazy;
use regex::Regex;

use super::TemplateFunctions;

// {{name}} or {{name arg1 arg2}}
static TEMPLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)((?:\s+[^\s{}]+)*)\s*\}\}").expect("Invalid regex"));

/// Expand `{{name args...}}` placeholders with template functions.
///
/// Unknown function names are left untouched.
pub fn render_template(text: &str, functions: &TemplateFunctions) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }

    TEMPLATE_REGEX
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            match functions.get(name) {
                Some(function) => {
                    let args: Vec<&str> = caps[2].split_whitespace().collect();
                    function(&args)
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
