//! Static default values for optional attributes

use crate::types::Dynamic;

/// Provides the value used when an attribute is left unset
pub trait DefaultValue: Send + Sync {
    fn description(&self) -> String;

    fn default_value(&self) -> Dynamic;
}

pub struct StaticBool(pub bool);

impl DefaultValue for StaticBool {
    fn description(&self) -> String {
        format!("defaults to {}", self.0)
    }

    fn default_value(&self) -> Dynamic {
        Dynamic::Bool(self.0)
    }
}
