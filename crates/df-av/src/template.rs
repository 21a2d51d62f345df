//! Variable substitution for command argument templates.

use std::collections::HashMap;
use std::path::Path;

/// Variable substitution context for command templates.
///
/// Supports variable substitution in strings using the `{varname}` syntax.
/// Substitution is a single left-to-right pass: inserted values are never
/// scanned again, and unknown variables are left as written.
///
/// # Example
///
/// ```
/// use df_av::TemplateContext;
/// use std::path::Path;
///
/// let ctx = TemplateContext::new()
///     .with_path("input", Path::new("/work/talk.srt"))
///     .with_var("service", "siliconflow");
///
/// assert_eq!(ctx.substitute("-i={input}"), "-i=/work/talk.srt");
/// assert_eq!(ctx.substitute("{service}"), "siliconflow");
/// assert_eq!(ctx.substitute("{unknown}"), "{unknown}");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty template context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom variable.
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    /// Add a path variable.
    pub fn with_path(mut self, key: &str, path: &Path) -> Self {
        self.vars
            .insert(key.to_string(), path.to_string_lossy().into_owned());
        self
    }

    /// Substitute variables in a string.
    pub fn substitute(&self, template: &str) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let key = &after[..close];
                    match self.vars.get(key) {
                        Some(value) => result.push_str(value),
                        None => {
                            result.push('{');
                            result.push_str(key);
                            result.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    result.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Substitute variables in a list of strings.
    pub fn substitute_all(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.substitute(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute() {
        let ctx = TemplateContext::new()
            .with_path("input", Path::new("/work/My Talk.srt"))
            .with_path("output", Path::new("/work/My Talk.zh.srt"));

        assert_eq!(ctx.substitute("{input}"), "/work/My Talk.srt");
        assert_eq!(
            ctx.substitute_all(&["-i".into(), "{input}".into(), "-o".into(), "{output}".into()]),
            vec!["-i", "/work/My Talk.srt", "-o", "/work/My Talk.zh.srt"]
        );
    }

    #[test]
    fn test_custom_var() {
        let ctx = TemplateContext::new()
            .with_var("service", "siliconflow")
            .with_var("voice", "zh-CN-XiaoxiaoNeural");

        assert_eq!(
            ctx.substitute("{service}:{voice}"),
            "siliconflow:zh-CN-XiaoxiaoNeural"
        );
    }

    #[test]
    fn inserted_values_are_not_rescanned() {
        let ctx = TemplateContext::new()
            .with_var("input", "{output}")
            .with_var("output", "/etc/passwd");
        assert_eq!(ctx.substitute("{input}"), "{output}");
    }

    #[test]
    fn unknown_and_unclosed_are_literal() {
        let ctx = TemplateContext::new().with_var("a", "1");
        assert_eq!(ctx.substitute("{b}{a}"), "{b}1");
        assert_eq!(ctx.substitute("x{a"), "x{a");
    }
}
