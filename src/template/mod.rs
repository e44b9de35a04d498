//! Tag name and comment templating
//!
//! Templates are literal strings with `${...}` references resolved against
//! a per-module context: `${env['NAME']}` (build environment),
//! `${sys['NAME']}` (process properties) and `${repoURL[i]}` (the module's
//! repository URL split on `/`, negative indices counting from the end).
//! Evaluation is pure substitution: no control flow, no function calls, no
//! I/O, no way out of the declared namespace. An unresolved reference is a
//! hard error, never a best-effort partial string.

use std::collections::HashMap;

use thiserror::Error;

use crate::util::urls;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown template variable '{0}'")]
    UnknownVariable(String),
    #[error("No value for {var}['{key}']")]
    MissingKey { var: String, key: String },
    #[error("repoURL index {index} out of range (URL has {len} segments)")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("Malformed reference '${{{0}}}'")]
    BadReference(String),
    #[error("Unterminated '${{' in template")]
    Unterminated,
}

/// Variables visible to template evaluation. Environment and system
/// properties are shared across a run; the URL segments vary per module.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    env: HashMap<String, String>,
    sys: HashMap<String, String>,
    repo_url_segments: Vec<String>,
}

impl TemplateContext {
    pub fn new(
        env: HashMap<String, String>,
        sys: HashMap<String, String>,
        repo_url_segments: Vec<String>,
    ) -> Self {
        Self {
            env,
            sys,
            repo_url_segments,
        }
    }

    /// Context for one module: shared env/sys plus that module's URL
    /// segments.
    pub fn for_module(
        env: &HashMap<String, String>,
        sys: &HashMap<String, String>,
        module_url: &str,
    ) -> Self {
        Self {
            env: env.clone(),
            sys: sys.clone(),
            repo_url_segments: urls::path_segments(module_url),
        }
    }

    fn lookup_env(&self, key: &str) -> Result<&str, TemplateError> {
        Self::lookup(&self.env, "env", key)
    }

    fn lookup_sys(&self, key: &str) -> Result<&str, TemplateError> {
        Self::lookup(&self.sys, "sys", key)
    }

    fn lookup<'a>(
        map: &'a HashMap<String, String>,
        var: &str,
        key: &str,
    ) -> Result<&'a str, TemplateError> {
        map.get(key)
            .map(String::as_str)
            .ok_or_else(|| TemplateError::MissingKey {
                var: var.to_string(),
                key: key.to_string(),
            })
    }

    fn lookup_segment(&self, index: i64) -> Result<&str, TemplateError> {
        let len = self.repo_url_segments.len();
        let resolved = if index < 0 {
            index + len as i64
        } else {
            index
        };
        usize::try_from(resolved)
            .ok()
            .and_then(|i| self.repo_url_segments.get(i))
            .map(String::as_str)
            .ok_or(TemplateError::IndexOutOfRange { index, len })
    }
}

/// Evaluate a template against a context. The result is trimmed of
/// leading/trailing whitespace; an empty result is legal. Deterministic for
/// a fixed context.
pub fn evaluate(template: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        if let Some(stripped) = after.strip_prefix('{') {
            let end = stripped.find('}').ok_or(TemplateError::Unterminated)?;
            out.push_str(&resolve(&stripped[..end], context)?);
            rest = &stripped[end + 1..];
        } else {
            // A '$' not opening a reference is a literal.
            out.push('$');
            rest = after;
        }
    }
    out.push_str(rest);

    Ok(out.trim().to_string())
}

/// Resolve a single `${...}` reference body.
fn resolve(expr: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    let expr = expr.trim();

    let (name, subscript) = match expr.find('[') {
        Some(open) => {
            let Some(body) = expr[open..]
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
            else {
                return Err(TemplateError::BadReference(expr.to_string()));
            };
            (expr[..open].trim_end(), Some(body.trim()))
        }
        None => (expr, None),
    };

    match (name, subscript) {
        ("env" | "sys", Some(body)) => {
            let key = unquote(body)
                .ok_or_else(|| TemplateError::BadReference(expr.to_string()))?;
            let value = if name == "env" {
                context.lookup_env(key)?
            } else {
                context.lookup_sys(key)?
            };
            Ok(value.to_string())
        }
        ("env" | "sys", None) => Err(TemplateError::BadReference(expr.to_string())),
        ("repoURL", Some(body)) => {
            let index: i64 = body
                .parse()
                .map_err(|_| TemplateError::BadReference(expr.to_string()))?;
            Ok(context.lookup_segment(index)?.to_string())
        }
        // Bare repoURL renders the whole segment list, matching the
        // original list binding.
        ("repoURL", None) => Ok(format!("[{}]", context.repo_url_segments.join(", "))),
        (other, _) => Err(TemplateError::UnknownVariable(other.to_string())),
    }
}

fn unquote(s: &str) -> Option<&str> {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}
