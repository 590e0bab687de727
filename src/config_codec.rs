//! Config codec (C4).
//!
//! Per spec §4.4 + §9 design note: JSON stays at the boundary, but every
//! executor decodes its blob into a typed, `#[serde(deny_unknown_fields)]`
//! struct immediately — unknown fields are rejected at decode time so a
//! user typo surfaces as a validation error rather than being silently
//! ignored. This module holds the declarative validation helpers shared by
//! every executor's typed config, the way the teacher's
//! `StorageConfig::validate` checks its own fields but generalized into
//! reusable predicates.

use crate::error::ConfigError;

/// One failed validation rule, named by the field path it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: String,
    pub rule: String,
}

/// Accumulates validation failures; `into_result` surfaces the first one,
/// matching §4.4 ("the dispatcher surfaces the first").
#[derive(Debug, Default)]
pub struct Validator {
    failures: Vec<ValidationFailure>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: impl Into<String>, rule: impl Into<String>) {
        self.failures.push(ValidationFailure {
            field: field.into(),
            rule: rule.into(),
        });
    }

    pub fn require_non_empty(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, "required");
        }
    }

    pub fn require_some<T>(&mut self, field: &str, value: &Option<T>) {
        if value.is_none() {
            self.fail(field, "required");
        }
    }

    pub fn range_u64(&mut self, field: &str, value: u64, min: u64, max: u64) {
        if value < min || value > max {
            self.fail(field, format!("must be between {min} and {max}"));
        }
    }

    pub fn port(&mut self, field: &str, value: u16) {
        if value == 0 {
            self.fail(field, "must be between 1 and 65535");
        }
    }

    pub fn url(&mut self, field: &str, value: &str) {
        if url::Url::parse(value).is_err() {
            self.fail(field, "must be a well-formed URL");
        }
    }

    /// Conditional rule: if `gate` holds, every field in `required` must be
    /// `Some` (e.g. "basic auth -> user+pass required").
    pub fn require_when(&mut self, gate: bool, requirements: &[(&str, bool)]) {
        if !gate {
            return;
        }
        for (field, present) in requirements {
            if !present {
                self.fail(*field, "required when this mode is selected");
            }
        }
    }

    pub fn into_result(self) -> Result<(), ConfigError> {
        match self.failures.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(ConfigError::InvalidConfig {
                field: first.field,
                rule: first.rule,
            }),
        }
    }
}

/// Decode an opaque config blob into a typed, unknown-fields-rejected
/// struct. Round-trip law (§8): decoding a stored blob twice yields the
/// same errors both times, since this is a pure function of its input.
pub fn decode<T: serde::de::DeserializeOwned>(blob: &serde_json::Value) -> Result<T, ConfigError> {
    serde_json::from_value(blob.clone()).map_err(|e| ConfigError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_surfaces_first_failure_only() {
        let mut v = Validator::new();
        v.require_non_empty("host", "");
        v.port("port", 0);
        let err = v.into_result().unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidConfig {
                field: "host".into(),
                rule: "required".into(),
            }
        );
    }

    #[test]
    fn validator_passes_when_clean() {
        let mut v = Validator::new();
        v.require_non_empty("host", "example.com");
        v.port("port", 443);
        assert!(v.into_result().is_ok());
    }

    #[test]
    fn require_when_flags_missing_conditional_fields() {
        let mut v = Validator::new();
        v.require_when(true, &[("domain", false), ("workstation", true)]);
        let err = v.into_result().unwrap_err();
        assert_eq!(err, ConfigError::InvalidConfig {
            field: "domain".into(),
            rule: "required when this mode is selected".into(),
        });
    }
}
