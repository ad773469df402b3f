//! `${name}` / `${secrets.x}` interpolation for tenant-supplied check
//! settings, plus the DNS-subdomain validation secret names must satisfy
//! and the JS-expression codegen a downstream compiler consumes.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_.-]+)\}").unwrap());

/// RFC 1123-style DNS subdomain: lowercase alphanumerics and `-`, each
/// label starting and ending with an alphanumeric, dot-separated, max 253
/// characters total.
static SECRET_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

#[derive(Debug, thiserror::Error)]
pub enum InterpolationError {
    #[error("unresolved variable: {0}")]
    UnresolvedVariable(String),
    #[error("invalid secret name: {0}")]
    InvalidSecretName(String),
}

/// Validates a secret name against the DNS-subdomain rule real agents use
/// to keep tenant-supplied names safe as identifiers elsewhere (label
/// names, remote names).
pub fn validate_secret_name(name: &str) -> Result<(), InterpolationError> {
    if name.is_empty() || name.len() > 253 || !SECRET_NAME_PATTERN.is_match(name) {
        return Err(InterpolationError::InvalidSecretName(name.to_string()));
    }
    Ok(())
}

/// Resolves every `${name}` and `${secrets.x}` reference in `template`.
/// Plain variables are looked up in `vars`; `secrets.x` references are
/// looked up in `secrets` after validating `x` as a secret name.
pub fn interpolate(
    template: &str,
    vars: &HashMap<String, String>,
    secrets: &HashMap<String, String>,
) -> Result<String, InterpolationError> {
    let mut err = None;
    let resolved = VARIABLE_PATTERN.replace_all(template, |caps: &regex::Captures| {
        let reference = &caps[1];
        match reference.strip_prefix("secrets.") {
            Some(secret_name) => {
                if let Err(e) = validate_secret_name(secret_name) {
                    err = Some(e);
                    return String::new();
                }
                match secrets.get(secret_name) {
                    Some(value) => value.clone(),
                    None => {
                        err = Some(InterpolationError::UnresolvedVariable(reference.to_string()));
                        String::new()
                    }
                }
            }
            None => match vars.get(reference) {
                Some(value) => value.clone(),
                // backwards-compatible: an unresolved plain variable is left
                // literal in the output rather than erroring.
                None => caps[0].to_string(),
            },
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(resolved.into_owned()),
    }
}

/// Generates a JS expression equivalent to `interpolate`'s substitution,
/// for a downstream code generator that embeds the template in a script
/// rather than resolving it ahead of time. Each reference becomes a
/// `vars["..."]` lookup (or `await secrets.get("...")` for a secret),
/// joined with string concatenation,
/// and every literal segment is escaped for inclusion in a double-quoted
/// JS string.
pub fn to_js_expression(template: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut last_end = 0;

    for caps in VARIABLE_PATTERN.captures_iter(template) {
        let whole = caps.get(0).unwrap();
        if whole.start() > last_end {
            parts.push(js_string_literal(&template[last_end..whole.start()]));
        }
        let reference = &caps[1];
        let expr = match reference.strip_prefix("secrets.") {
            Some(name) => format!("await secrets.get({})", js_string_literal(name)),
            None => format!("vars[{}]", js_string_literal(reference)),
        };
        parts.push(expr);
        last_end = whole.end();
    }
    if last_end < template.len() {
        parts.push(js_string_literal(&template[last_end..]));
    }
    if parts.is_empty() {
        return "\"\"".to_string();
    }
    parts.join(" + ")
}

fn js_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '=' => out.push_str("\\u003d"),
            '>' => out.push_str("\\u003e"),
            '<' => out.push_str("\\u003c"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn interpolates_plain_variable() {
        let vars = map(&[("target", "example.com")]);
        let secrets = HashMap::new();
        let out = interpolate("ping ${target}", &vars, &secrets).unwrap();
        assert_eq!(out, "ping example.com");
    }

    #[test]
    fn interpolates_secret_reference() {
        let vars = HashMap::new();
        let secrets = map(&[("api-key", "s3cr3t")]);
        let out = interpolate("Authorization: Bearer ${secrets.api-key}", &vars, &secrets).unwrap();
        assert_eq!(out, "Authorization: Bearer s3cr3t");
    }

    #[test]
    fn unresolved_variable_is_left_literal() {
        let vars = HashMap::new();
        let secrets = HashMap::new();
        let out = interpolate("${missing}", &vars, &secrets).unwrap();
        assert_eq!(out, "${missing}");
    }

    #[test]
    fn unresolved_secret_value_is_an_error() {
        let vars = HashMap::new();
        let secrets = HashMap::new();
        let err = interpolate("${secrets.missing-key}", &vars, &secrets).unwrap_err();
        assert!(matches!(err, InterpolationError::UnresolvedVariable(_)));
    }

    #[test]
    fn invalid_secret_name_is_rejected() {
        let vars = HashMap::new();
        let secrets = HashMap::new();
        let err = interpolate("${secrets.Not_Valid}", &vars, &secrets).unwrap_err();
        assert!(matches!(err, InterpolationError::InvalidSecretName(_)));
    }

    #[test]
    fn secret_name_validation_accepts_dns_subdomains() {
        assert!(validate_secret_name("api-key").is_ok());
        assert!(validate_secret_name("api.key.v2").is_ok());
        assert!(validate_secret_name("Api-Key").is_err());
        assert!(validate_secret_name("-leading-dash").is_err());
        assert!(validate_secret_name("").is_err());
    }

    #[test]
    fn js_codegen_escapes_and_concatenates() {
        let expr = to_js_expression("value=${x} say \"hi\"");
        assert_eq!(expr, "\"value\\u003d\" + vars[\"x\"] + \" say \\\"hi\\\"\"");
    }

    #[test]
    fn js_codegen_escapes_html_sensitive_characters() {
        let expr = to_js_expression("<a href=\"x\">b & c > d</a>");
        assert_eq!(
            expr,
            "\"\\u003ca href\\u003d\\\"x\\\"\\u003eb \\u0026 c \\u003e d\\u003c/a\\u003e\""
        );
    }

    #[test]
    fn js_codegen_handles_secret_reference() {
        let expr = to_js_expression("${secrets.token}");
        assert_eq!(expr, "await secrets.get(\"token\")");
    }

    #[test]
    fn js_codegen_handles_no_variables() {
        assert_eq!(to_js_expression("plain text"), "\"plain text\"");
    }
}
