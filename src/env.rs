// ABOUTME: Evaluation environment - flat variable bindings plus the resource limits they're checked against

use crate::config::EvalLimits;
use crate::error::EvalError;
use crate::value::Value;
use std::collections::HashMap;

const RESERVED_NAMES: &[&str] = &["null", "true", "false", "eval", "and", "or", "not", "if"];

/// `{ variables: name→value, limits }` (spec §3 "Evaluation Environment").
/// Bindings are read-only for the duration of one expression's evaluation;
/// the orchestrator is the only caller that mutates one between steps.
#[derive(Debug, Clone)]
pub struct Environment {
    variables: HashMap<String, Value>,
    pub limits: EvalLimits,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            variables: HashMap::new(),
            limits: EvalLimits::default(),
        }
    }

    pub fn with_limits(limits: EvalLimits) -> Self {
        Environment {
            variables: HashMap::new(),
            limits,
        }
    }

    /// Binds `name` to `value`, validating the name's shape and checking it
    /// isn't reserved, and enforcing `maxVariables` on genuinely new names.
    pub fn define(&mut self, name: impl Into<String>, value: Value) -> Result<(), EvalError> {
        let name = name.into();
        validate_variable_name(&name)?;
        if !self.variables.contains_key(&name) && self.variables.len() >= self.limits.max_variables
        {
            return Err(EvalError::SecurityViolation {
                reason: format!("variable count exceeds limit of {}", self.limits.max_variables),
            });
        }
        self.variables.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.variables.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

/// Variable names must match `[A-Za-z_][A-Za-z0-9_]*` and not collide with a
/// reserved name, case-insensitively (spec §4.6).
pub fn validate_variable_name(name: &str) -> Result<(), EvalError> {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let body_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !starts_ok || !body_ok {
        return Err(EvalError::SecurityViolation {
            reason: format!("'{name}' is not a valid variable name"),
        });
    }
    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(EvalError::SecurityViolation {
            reason: format!("'{name}' is a reserved name"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get_round_trips_a_value() {
        let mut env = Environment::new();
        env.define("x", Value::Number(42.0)).unwrap();
        assert_eq!(env.get("x"), Some(Value::Number(42.0)));
    }

    #[test]
    fn undefined_variable_is_none() {
        let env = Environment::new();
        assert_eq!(env.get("missing"), None);
    }

    #[test]
    fn rejects_reserved_names() {
        let mut env = Environment::new();
        let err = env.define("eval", Value::Number(1.0)).unwrap_err();
        assert_eq!(err.code(), "EVAL010");
    }

    #[test]
    fn rejects_malformed_variable_names() {
        let mut env = Environment::new();
        assert!(env.define("9x", Value::Number(1.0)).is_err());
        assert!(env.define("x-y", Value::Number(1.0)).is_err());
    }

    #[test]
    fn enforces_max_variables() {
        let mut env = Environment::with_limits(EvalLimits {
            max_variables: 1,
            ..EvalLimits::default()
        });
        env.define("a", Value::Number(1.0)).unwrap();
        let err = env.define("b", Value::Number(2.0)).unwrap_err();
        assert_eq!(err.code(), "EVAL010");
    }

    #[test]
    fn redefining_an_existing_variable_does_not_count_twice() {
        let mut env = Environment::with_limits(EvalLimits {
            max_variables: 1,
            ..EvalLimits::default()
        });
        env.define("a", Value::Number(1.0)).unwrap();
        assert!(env.define("a", Value::Number(2.0)).is_ok());
    }
}
