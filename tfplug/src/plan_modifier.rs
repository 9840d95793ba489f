//! Plan modifiers attached to schema attributes

use crate::types::Dynamic;

pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;

    /// Whether moving from `prior` to `planned` forces a new resource
    fn requires_replace(&self, prior: &Dynamic, planned: &Dynamic) -> bool;
}

/// Any change to the attribute destroys and recreates the resource.
/// Unknown planned values are not treated as changes.
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this value forces a new resource".to_string()
    }

    fn requires_replace(&self, prior: &Dynamic, planned: &Dynamic) -> bool {
        !planned.is_unknown() && prior != planned
    }
}
