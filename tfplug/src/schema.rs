//! Schema types and builders for tfplug
//!
//! A schema describes the attributes and nested blocks of a provider, resource or
//! data source. Besides being declarative, a [`Block`] can check a configuration
//! against itself, fill in defaults and report which changes force replacement.

use crate::defaults::DefaultValue;
use crate::plan_modifier::PlanModifier;
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use crate::validator::Validator;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    pub fn nested_block(&self, type_name: &str) -> Option<&NestedBlock> {
        self.block
            .block_types
            .iter()
            .find(|b| b.type_name == type_name)
    }
}

/// Block represents a configuration block
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub deprecated: bool,
}

impl Block {
    /// Checks required attributes, attribute validators and nested block
    /// cardinality. Unknown values are skipped.
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.validate_at(&config.value, &AttributePath::root(), &mut diagnostics);
        diagnostics
    }

    fn validate_at(&self, value: &Dynamic, base: &AttributePath, diags: &mut Vec<Diagnostic>) {
        for attr in &self.attributes {
            let path = base.clone().attribute(&attr.name);
            let attr_value = value.get(&attr.name).unwrap_or(&Dynamic::Null);

            if attr_value.is_unknown() {
                continue;
            }

            if attr_value.is_null() {
                if attr.required {
                    diags.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!("The argument \"{}\" is required", path),
                        )
                        .with_attribute(path),
                    );
                }
                continue;
            }

            if !attr.required && !attr.optional {
                diags.push(
                    Diagnostic::error(
                        "Invalid configuration",
                        format!("\"{}\" is computed and cannot be set", path),
                    )
                    .with_attribute(path),
                );
                continue;
            }

            for validator in &attr.validators {
                validator.validate(attr_value, &path, diags);
            }
        }

        for nested in &self.block_types {
            let path = base.clone().attribute(&nested.type_name);
            let items: Vec<&Dynamic> = match value.get(&nested.type_name) {
                None | Some(Dynamic::Null) => Vec::new(),
                Some(Dynamic::List(items)) => items.iter().collect(),
                Some(single @ Dynamic::Map(_)) => vec![single],
                Some(_) => continue,
            };

            let count = items.len() as i64;
            if count < nested.min_items {
                diags.push(
                    Diagnostic::error(
                        "Insufficient blocks",
                        format!(
                            "At least {} \"{}\" blocks are required",
                            nested.min_items, nested.type_name
                        ),
                    )
                    .with_attribute(path.clone()),
                );
            }
            if nested.max_items > 0 && count > nested.max_items {
                diags.push(
                    Diagnostic::error(
                        "Too many blocks",
                        format!(
                            "No more than {} \"{}\" blocks are allowed",
                            nested.max_items, nested.type_name
                        ),
                    )
                    .with_attribute(path.clone()),
                );
            }

            for (idx, item) in items.into_iter().enumerate() {
                let item_path = if nested.nesting == NestingMode::Single {
                    path.clone()
                } else {
                    path.clone().index(idx as i64)
                };
                nested.block.validate_at(item, &item_path, diags);
            }
        }
    }

    /// Replaces null attributes with their schema defaults, including those
    /// inside nested block items
    pub fn apply_defaults(&self, config: &mut DynamicValue) {
        if config.is_null() {
            return;
        }
        self.apply_defaults_at(&mut config.value);
    }

    fn apply_defaults_at(&self, value: &mut Dynamic) {
        let Dynamic::Map(object) = value else {
            return;
        };

        for attr in &self.attributes {
            let Some(default) = &attr.default else {
                continue;
            };
            let slot = object.entry(attr.name.clone()).or_insert(Dynamic::Null);
            if slot.is_null() {
                tracing::trace!("Defaulting {} ({})", attr.name, default.description());
                *slot = default.default_value();
            }
        }

        for nested in &self.block_types {
            match object.get_mut(&nested.type_name) {
                Some(Dynamic::List(items)) => {
                    for item in items {
                        nested.block.apply_defaults_at(item);
                    }
                }
                Some(single @ Dynamic::Map(_)) => nested.block.apply_defaults_at(single),
                _ => {}
            }
        }
    }

    /// Paths of top-level attributes whose change between `prior` and `planned`
    /// requires destroying and recreating the resource
    pub fn requires_replace(
        &self,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Vec<AttributePath> {
        if prior.is_null() {
            return Vec::new();
        }

        self.attributes
            .iter()
            .filter(|attr| {
                let prior_value = prior.value.get(&attr.name).unwrap_or(&Dynamic::Null);
                let planned_value = planned.value.get(&attr.name).unwrap_or(&Dynamic::Null);
                attr.plan_modifiers
                    .iter()
                    .any(|m| m.requires_replace(prior_value, planned_value))
            })
            .map(|attr| AttributePath::new(&attr.name))
            .collect()
    }
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub deprecated: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn DefaultValue>>,
}

// Validators and modifiers are trait objects, so Debug is written out by hand
impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("validators", &self.validators.len())
            .field("plan_modifiers", &self.plan_modifiers.len())
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// NestedBlock represents a nested configuration block
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    /// Zero means unbounded
    pub max_items: i64,
}

/// NestingMode defines how nested blocks are structured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingMode {
    Single,
    List,
    Set,
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                deprecated: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(Arc::new(validator));
        self
    }

    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.attribute.plan_modifiers.push(Arc::new(modifier));
        self
    }

    /// Defaults imply the attribute is computed when left unset
    pub fn default(mut self, default: impl DefaultValue + 'static) -> Self {
        self.attribute.default = Some(Arc::new(default));
        self.attribute.computed = true;
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// Builds a nested block definition (`variable { ... }`, `email { ... }`)
pub struct NestedBlockBuilder {
    nested: NestedBlock,
}

impl NestedBlockBuilder {
    pub fn new(type_name: &str, nesting: NestingMode) -> Self {
        Self {
            nested: NestedBlock {
                type_name: type_name.to_string(),
                block: Block::default(),
                nesting,
                min_items: 0,
                max_items: 0,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.nested.block.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.nested.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.nested.block.block_types.push(block);
        self
    }

    pub fn min_items(mut self, min: i64) -> Self {
        self.nested.min_items = min;
        self
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.nested.max_items = max;
        self
    }

    pub fn build(self) -> NestedBlock {
        self.nested
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block::default(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticBool;
    use crate::plan_modifier::RequiresReplace;
    use crate::validator::OneOf;

    fn sample_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Test resource schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bucket_id", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("verify_ssl", AttributeType::Bool)
                    .optional()
                    .default(StaticBool(true))
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("variable", NestingMode::Set)
                    .attribute(
                        AttributeBuilder::new("source", AttributeType::String)
                            .required()
                            .validator(OneOf::new(&["response_json", "response_text"]))
                            .build(),
                    )
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("email", NestingMode::List)
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("notify_all", AttributeType::Bool)
                            .optional()
                            .default(StaticBool(false))
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn schema_builder_collects_attributes_and_blocks() {
        let schema = sample_schema();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.block.attributes.len(), 3);
        assert!(schema.nested_block("variable").is_some());
        assert!(schema.attribute("verify_ssl").unwrap().computed);
    }

    #[test]
    fn validate_reports_missing_required_and_bad_enum() {
        let schema = sample_schema();
        let config = DynamicValue::new(Dynamic::object([(
            "variable",
            Dynamic::List(vec![Dynamic::object([(
                "source",
                Dynamic::from("response_body"),
            )])]),
        )]));

        let diags = schema.block.validate(&config);
        assert_eq!(diags.len(), 2);
        assert!(diags[0].detail.contains("bucket_id"));
        assert_eq!(
            diags[1].attribute.as_ref().unwrap().to_string(),
            "variable[0].source"
        );
    }

    #[test]
    fn validate_rejects_setting_computed_attribute() {
        let schema = sample_schema();
        let config = DynamicValue::new(Dynamic::object([
            ("bucket_id", Dynamic::from("b1")),
            ("id", Dynamic::from("x")),
        ]));

        let diags = schema.block.validate(&config);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("computed"));
    }

    #[test]
    fn validate_enforces_max_items() {
        let schema = sample_schema();
        let config = DynamicValue::new(Dynamic::object([
            ("bucket_id", Dynamic::from("b1")),
            (
                "email",
                Dynamic::List(vec![Dynamic::Map(HashMap::new()), Dynamic::Map(HashMap::new())]),
            ),
        ]));

        let diags = schema.block.validate(&config);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Too many blocks");
    }

    #[test]
    fn apply_defaults_only_fills_null() {
        let schema = sample_schema();

        let mut unset = DynamicValue::new(Dynamic::object([("bucket_id", Dynamic::from("b1"))]));
        schema.block.apply_defaults(&mut unset);
        assert!(unset.get_bool(&AttributePath::new("verify_ssl")).unwrap());

        let mut set = DynamicValue::new(Dynamic::object([("verify_ssl", Dynamic::from(false))]));
        schema.block.apply_defaults(&mut set);
        assert!(!set.get_bool(&AttributePath::new("verify_ssl")).unwrap());
    }

    #[test]
    fn apply_defaults_reaches_nested_block_items() {
        let schema = sample_schema();
        let mut config = DynamicValue::new(Dynamic::object([
            ("bucket_id", Dynamic::from("b1")),
            ("email", Dynamic::List(vec![Dynamic::Map(HashMap::new())])),
        ]));

        schema.block.apply_defaults(&mut config);

        let notify_all = AttributePath::new("email").index(0).attribute("notify_all");
        assert!(!config.get_bool(&notify_all).unwrap());

        let mut absent = DynamicValue::null();
        schema.block.apply_defaults(&mut absent);
        assert!(absent.is_null());
    }

    #[test]
    fn requires_replace_flags_changed_ownership() {
        let schema = sample_schema();
        let prior = DynamicValue::new(Dynamic::object([
            ("bucket_id", Dynamic::from("b1")),
            ("verify_ssl", Dynamic::from(true)),
        ]));
        let planned = DynamicValue::new(Dynamic::object([
            ("bucket_id", Dynamic::from("b2")),
            ("verify_ssl", Dynamic::from(false)),
        ]));

        let paths = schema.block.requires_replace(&prior, &planned);
        assert_eq!(paths, vec![AttributePath::new("bucket_id")]);
        assert!(schema
            .block
            .requires_replace(&DynamicValue::null(), &planned)
            .is_empty());
    }
}
