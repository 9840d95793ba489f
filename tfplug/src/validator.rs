//! Attribute validators run by [`Block::validate`](crate::schema::Block::validate)

use crate::types::{AttributePath, Diagnostic, Dynamic};

/// Validator performs validation on a configured (non-null, known) value
pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>);
}

/// Accepts strings from a fixed allow-list, case-sensitively
pub struct OneOf {
    allowed: Vec<String>,
}

impl OneOf {
    pub fn new(allowed: &[&str]) -> Self {
        Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Validator for OneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else {
            return;
        };
        if !self.allowed.iter().any(|a| a == s) {
            diagnostics.push(
                Diagnostic::error(
                    format!("Invalid value for {}", path),
                    format!("expected {} to be one of {:?}, got {}", path, self.allowed, s),
                )
                .with_attribute(path.clone()),
            );
        }
    }
}

/// Inclusive numeric bounds
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRange {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("value must be between {} and {}", min, max),
            (Some(min), None) => format!("value must be at least {}", min),
            (None, Some(max)) => format!("value must be at most {}", max),
            (None, None) => "any number".to_string(),
        }
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(n) = value.as_number() else {
            return;
        };
        let below = self.min.is_some_and(|min| n < min);
        let above = self.max.is_some_and(|max| n > max);
        if below || above {
            diagnostics.push(
                Diagnostic::error(
                    format!("Invalid value for {}", path),
                    format!("{}, got {}", self.description(), n),
                )
                .with_attribute(path.clone()),
            );
        }
    }
}
