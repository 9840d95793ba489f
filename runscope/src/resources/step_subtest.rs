//! Subtest step resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticBool;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

use super::step_request::{
    assertion_block, import_step_state, owner_attributes, step_get_opts, step_uri_opts,
    variable_block,
};
use super::structure::*;
use super::{cancellable, delete_diagnostics, extract_provider_data, not_configured, read_response};
use crate::api::step::{Step, StepGetOpts, StepSubtestOpts, StepUriOpts};
use crate::api::{ApiError, Client};
use crate::RunscopeProviderData;

#[derive(Default)]
pub struct StepSubtestResource {
    provider_data: Option<RunscopeProviderData>,
}

impl StepSubtestResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_step(
        &self,
        ctx: &Context,
        client: &Client,
        opts: &StepGetOpts,
    ) -> Result<DynamicValue, ApiError> {
        let step = cancellable(ctx, client.steps().get_subtest(opts)).await?;
        Ok(flatten_subtest_step(&opts.uri, &step))
    }
}

fn expand_step_subtest_opts(config: &DynamicValue) -> StepSubtestOpts {
    StepSubtestOpts {
        bucket_key: get_string(config, "source_bucket_id"),
        test_uuid: get_string(config, "source_test_id"),
        environment_uuid: get_string(config, "source_environment_id"),
        use_parent_environment: get_bool(config, "use_parent_environment"),
        variables: expand_step_variables(&get_items(config, "variable")),
        assertions: expand_step_assertions(&get_items(config, "assertion")),
    }
}

fn flatten_subtest_step(uri: &StepUriOpts, step: &Step) -> DynamicValue {
    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::from(step.id.as_str())),
        ("bucket_id", Dynamic::from(uri.bucket_id.as_str())),
        ("test_id", Dynamic::from(uri.test_id.as_str())),
        ("source_bucket_id", Dynamic::from(step.bucket_key.as_str())),
        ("source_test_id", Dynamic::from(step.test_uuid.as_str())),
        (
            "source_environment_id",
            flatten_string(&step.environment_uuid),
        ),
        (
            "use_parent_environment",
            Dynamic::from(step.use_parent_environment),
        ),
        ("variable", flatten_step_variables(&step.variables)),
        ("assertion", flatten_step_assertions(&step.assertions)),
    ]))
}

#[async_trait]
impl Resource for StepSubtestResource {
    fn type_name(&self) -> &str {
        "runscope_step_subtest"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = owner_attributes(SchemaBuilder::new().version(0))
            .description("Manages a step that runs another Runscope test")
            .attribute(
                AttributeBuilder::new("source_bucket_id", AttributeType::String)
                    .description("Bucket of the test to run")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_test_id", AttributeType::String)
                    .description("The test to run")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_environment_id", AttributeType::String)
                    .description("Environment of the subtest run")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("use_parent_environment", AttributeType::Bool)
                    .description("Run the subtest in the calling test's environment")
                    .optional()
                    .default(StaticBool(false))
                    .build(),
            )
            .block(variable_block("Variables to extract from the subtest result"))
            .block(assertion_block("Assertions on the subtest result"))
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
        let opts = expand_step_subtest_opts(&request.planned_state);

        let step = match cancellable(&ctx, client.steps().create_subtest(&uri, &opts)).await {
            Ok(step) => step,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error(
                        "Failed to create subtest step",
                        format!("API error: {}", e),
                    )],
                }
            }
        };
        tracing::info!(
            "Created subtest step {} in test {} running {}",
            step.id,
            uri.test_id,
            opts.test_uuid
        );

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
                new_state: flatten_subtest_step(&get.uri, &step),
                diagnostics: vec![Diagnostic::warning(
                    "Failed to refresh subtest step after create",
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
        read_response(result, request.current_state, "subtest step")
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
        let body = expand_step_subtest_opts(&request.planned_state);
        if let Err(e) = cancellable(&ctx, client.steps().update_subtest(&opts, &body)).await {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error(
                    "Failed to update subtest step",
                    format!("API error: {}", e),
                )],
            };
        }

        match self.read_step(&ctx, client, &opts).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::warning(
                    "Failed to refresh subtest step after update",
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
            diagnostics: delete_diagnostics(result, "subtest step"),
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
impl ResourceWithConfigure for StepSubtestResource {
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
