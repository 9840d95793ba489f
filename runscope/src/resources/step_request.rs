//! Request step resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticBool;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode, SchemaBuilder,
};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::OneOf;

use super::import::StepImportId;
use super::structure::*;
use super::{
    cancellable, delete_diagnostics, extract_provider_data, not_configured, read_response,
    state_id,
};
use crate::api::step::{Step, StepGetOpts, StepRequestOpts, StepUriOpts};
use crate::api::{ApiError, Client};
use crate::RunscopeProviderData;

#[derive(Default)]
pub struct StepRequestResource {
    provider_data: Option<RunscopeProviderData>,
}

impl StepRequestResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_step(
        &self,
        ctx: &Context,
        client: &Client,
        opts: &StepGetOpts,
    ) -> Result<DynamicValue, ApiError> {
        let step = cancellable(ctx, client.steps().get_request(opts)).await?;
        Ok(flatten_request_step(&opts.uri, &step))
    }
}

pub(crate) fn step_uri_opts(config: &DynamicValue) -> StepUriOpts {
    StepUriOpts {
        bucket_id: get_string(config, "bucket_id"),
        test_id: get_string(config, "test_id"),
    }
}

pub(crate) fn step_get_opts(state: &DynamicValue) -> StepGetOpts {
    StepGetOpts {
        uri: step_uri_opts(state),
        id: state_id(state),
    }
}

pub(crate) fn expand_step_request_opts(config: &DynamicValue) -> StepRequestOpts {
    StepRequestOpts {
        method: get_string(config, "method"),
        url: get_string(config, "url"),
        variables: expand_step_variables(&get_items(config, "variable")),
        assertions: expand_step_assertions(&get_items(config, "assertion")),
        headers: expand_step_headers(&get_items(config, "header")),
        auth: expand_step_auth(&get_items(config, "auth")),
        body: get_string(config, "body"),
        form: expand_step_form(&get_items(config, "form_parameter")),
        scripts: expand_string_list(&get_items(config, "scripts")),
        before_scripts: expand_string_list(&get_items(config, "before_scripts")),
        note: get_string(config, "note"),
        skipped: get_bool(config, "skipped"),
    }
}

pub(crate) fn flatten_request_step(uri: &StepUriOpts, step: &Step) -> DynamicValue {
    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::from(step.id.as_str())),
        ("bucket_id", Dynamic::from(uri.bucket_id.as_str())),
        ("test_id", Dynamic::from(uri.test_id.as_str())),
        ("method", Dynamic::from(step.method.as_str())),
        ("url", Dynamic::from(step.url.as_str())),
        ("variable", flatten_step_variables(&step.variables)),
        ("assertion", flatten_step_assertions(&step.assertions)),
        ("header", flatten_step_headers(&step.headers)),
        ("auth", flatten_step_auth(&step.auth)),
        ("body", flatten_string(&step.body)),
        ("form_parameter", flatten_form_parameters(&step.form)),
        ("scripts", flatten_string_list(&step.scripts)),
        ("before_scripts", flatten_string_list(&step.before_scripts)),
        ("note", flatten_string(&step.note)),
        ("skipped", Dynamic::from(step.skipped)),
    ]))
}

pub(crate) fn variable_block(description: &str) -> NestedBlock {
    NestedBlockBuilder::new("variable", NestingMode::Set)
        .description(description)
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("Name of the extracted variable")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("property", AttributeType::String)
                .description("The property to extract")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("source", AttributeType::String)
                .description("Where the property is read from, e.g. response_json")
                .required()
                .validator(OneOf::new(STEP_SOURCES))
                .build(),
        )
        .build()
}

pub(crate) fn assertion_block(description: &str) -> NestedBlock {
    NestedBlockBuilder::new("assertion", NestingMode::List)
        .description(description)
        .attribute(
            AttributeBuilder::new("source", AttributeType::String)
                .required()
                .validator(OneOf::new(STEP_SOURCES))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("property", AttributeType::String)
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("comparison", AttributeType::String)
                .description("The comparison type, e.g. equal or has_key")
                .required()
                .validator(OneOf::new(STEP_COMPARISONS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("value", AttributeType::String)
                .optional()
                .build(),
        )
        .build()
}

pub(crate) fn owner_attributes(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("bucket_id", AttributeType::String)
                .description("The bucket of the test this step belongs to")
                .required()
                .plan_modifier(RequiresReplace)
                .build(),
        )
        .attribute(
            AttributeBuilder::new("test_id", AttributeType::String)
                .description("The test this step belongs to")
                .required()
                .plan_modifier(RequiresReplace)
                .build(),
        )
}

/// Resolves `bucket/test/step` or `bucket/test#position` into importable state
pub(crate) async fn import_step_state(
    ctx: &Context,
    provider_data: Option<&RunscopeProviderData>,
    request: ImportResourceStateRequest,
) -> ImportResourceStateResponse {
    let invalid = |detail: String| ImportResourceStateResponse {
        imported_resources: vec![],
        diagnostics: vec![Diagnostic::error("Invalid import ID", detail)],
    };

    let import_id = match request.id.parse::<StepImportId>() {
        Ok(id) => id,
        Err(e) => return invalid(e.to_string()),
    };

    let Some(provider_data) = provider_data else {
        return ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![not_configured()],
        };
    };

    match import_id.resolve(ctx, &provider_data.client).await {
        Ok(address) => ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: request.type_name,
                state: DynamicValue::new(Dynamic::object([
                    ("id", Dynamic::from(address.step_id)),
                    ("bucket_id", Dynamic::from(address.bucket_id)),
                    ("test_id", Dynamic::from(address.test_id)),
                ])),
            }],
            diagnostics: vec![],
        },
        Err(e) => invalid(e.to_string()),
    }
}

#[async_trait]
impl Resource for StepRequestResource {
    fn type_name(&self) -> &str {
        "runscope_step"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = owner_attributes(SchemaBuilder::new().version(0))
            .description("Manages an HTTP request step of a Runscope test")
            .attribute(
                AttributeBuilder::new("method", AttributeType::String)
                    .description("HTTP method, e.g. GET")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("body", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("scripts", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Scripts run after the request")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "before_scripts",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("Scripts run before the request")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("note", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("skipped", AttributeType::Bool)
                    .description("Skip this step when the test runs")
                    .optional()
                    .default(StaticBool(false))
                    .build(),
            )
            .block(variable_block("Variables to extract from the response"))
            .block(assertion_block("Assertions on the response"))
            .block(
                NestedBlockBuilder::new("header", NestingMode::Set)
                    .attribute(
                        AttributeBuilder::new("header", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("value", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("auth", NestingMode::Set)
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("username", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("auth_type", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("password", AttributeType::String)
                            .required()
                            .sensitive()
                            .build(),
                    )
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("form_parameter", NestingMode::Set)
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("value", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(
        &self,
        ctx: Context,
        request: CreateResourceRequest,
    ) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![not_configured()],
            };
        };
        let client = &provider_data.client;

        let uri = step_uri_opts(&request.planned_state);
        let opts = expand_step_request_opts(&request.planned_state);

        let step = match cancellable(&ctx, client.steps().create_request(&uri, &opts)).await {
            Ok(step) => step,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error(
                        "Failed to create step",
                        format!("API error: {}", e),
                    )],
                }
            }
        };
        tracing::info!("Created request step {} in test {}", step.id, uri.test_id);

        let get = StepGetOpts {
            uri,
            id: step.id.clone(),
        };
        match self.read_step(&ctx, client, &get).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => CreateResourceResponse {
                new_state: flatten_request_step(&get.uri, &step),
                diagnostics: vec![Diagnostic::warning(
                    "Failed to refresh step after create",
                    format!("API error: {}", e),
                )],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
            };
        };

        let opts = step_get_opts(&request.current_state);
        let result = self.read_step(&ctx, &provider_data.client, &opts).await;
        read_response(result, request.current_state, "step")
    }

    async fn update(
        &self,
        ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };
        let client = &provider_data.client;

        let opts = step_get_opts(&request.prior_state);
        let body = expand_step_request_opts(&request.planned_state);
        if let Err(e) = cancellable(&ctx, client.steps().update_request(&opts, &body)).await {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error(
                    "Failed to update step",
                    format!("API error: {}", e),
                )],
            };
        }
        tracing::debug!("Updated request step {}", opts.id);

        match self.read_step(&ctx, client, &opts).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::warning(
                    "Failed to refresh step after update",
                    format!("API error: {}", e),
                )],
            },
        }
    }

    async fn delete(
        &self,
        ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let opts = step_get_opts(&request.prior_state);
        let result = cancellable(&ctx, provider_data.client.steps().delete(&opts)).await;
        DeleteResourceResponse {
            diagnostics: delete_diagnostics(result, "step"),
        }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_step_state(&ctx, self.provider_data.as_ref(), request).await
    }
}

#[async_trait]
impl ResourceWithConfigure for StepRequestResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        match extract_provider_data(request.provider_data) {
            Ok(data) => {
                self.provider_data = Some(data);
                ConfigureResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}
