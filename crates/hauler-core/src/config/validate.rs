use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A single check applied to the value found at a dotted field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Present, not `null`, and not an empty string.
    Exists,
    IsNumber,
    /// A string parsing as an absolute `http`/`https` URL.
    IsUrl,
}

/// Field rules checked by [`validate`], in reporting order.
pub const VALIDATION_RULES: &[(&str, Rule)] = &[
    ("server.url", Rule::Exists),
    ("server.url", Rule::IsUrl),
    ("server.token", Rule::Exists),
    ("server.timeoutSeconds", Rule::IsNumber),
    ("runner.timeoutSeconds", Rule::IsNumber),
    ("runner.checkIntervalSeconds", Rule::IsNumber),
    ("runner.concurrency", Rule::IsNumber),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// Outcome of [`validate`]: `{"ok": true}` or `{"ok": false, "errors": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub(crate) fn single(field: &str, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            errors: vec![FieldError {
                field: field.to_string(),
                reason: reason.into(),
            }],
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            return f.write_str("ok");
        }
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.reason)?;
        }
        Ok(())
    }
}

/// Check `value` against [`VALIDATION_RULES`].
///
/// Only the first failing rule per field is reported.
pub fn validate(value: &Value) -> ValidationReport {
    let mut errors: Vec<FieldError> = Vec::new();
    for (field, rule) in VALIDATION_RULES {
        if errors.iter().any(|e| e.field == *field) {
            continue;
        }
        if let Err(reason) = check(lookup(value, field), *rule) {
            errors.push(FieldError {
                field: field.to_string(),
                reason,
            });
        }
    }
    ValidationReport {
        ok: errors.is_empty(),
        errors,
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

fn check(value: Option<&Value>, rule: Rule) -> Result<(), String> {
    match rule {
        Rule::Exists => match value {
            None | Some(Value::Null) => Err("is required".into()),
            Some(Value::String(s)) if s.trim().is_empty() => Err("must not be empty".into()),
            Some(_) => Ok(()),
        },
        Rule::IsNumber => match value {
            None | Some(Value::Number(_)) => Ok(()),
            Some(_) => Err("must be a number".into()),
        },
        Rule::IsUrl => match value {
            None => Ok(()),
            Some(Value::String(s)) => match url::Url::parse(s) {
                Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Ok(()),
                Ok(u) => Err(format!("unsupported url scheme '{}'", u.scheme())),
                Err(e) => Err(format!("invalid url: {e}")),
            },
            Some(_) => Err("must be a url string".into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "server": {"url": "https://coordinator.local", "token": "t", "timeoutSeconds": 30},
            "runner": {"timeoutSeconds": 600, "checkIntervalSeconds": 10, "concurrency": 1}
        })
    }

    #[test]
    fn accepts_complete_config() {
        let report = validate(&valid());
        assert!(report.ok);
        assert_eq!(serde_json::to_value(&report).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn reports_missing_and_mistyped_fields() {
        let mut v = valid();
        v["server"]["token"] = json!("");
        v["runner"]["concurrency"] = json!("four");
        let report = validate(&v);
        assert!(!report.ok);
        assert_eq!(
            report.errors,
            vec![
                FieldError {
                    field: "server.token".into(),
                    reason: "must not be empty".into()
                },
                FieldError {
                    field: "runner.concurrency".into(),
                    reason: "must be a number".into()
                },
            ]
        );
    }

    #[test]
    fn one_error_per_field() {
        let mut v = valid();
        v["server"]["url"] = Value::Null;
        let report = validate(&v);
        let url_errors = report.errors.iter().filter(|e| e.field == "server.url").count();
        assert_eq!(url_errors, 1);
        assert_eq!(report.to_string(), "server.url: is required");
    }

    #[test]
    fn rejects_non_http_urls() {
        for bad in ["not a url", "ftp://host/x"] {
            let mut v = valid();
            v["server"]["url"] = json!(bad);
            assert!(!validate(&v).ok, "{bad} should be rejected");
        }
    }
}
