//! Environment resource implementation
//!
//! One resource type covers both shared environments (owned by a bucket) and
//! test environments; `test_id` decides which.

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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberRange, OneOf};

use super::import::parse_environment_import_id;
use super::structure::*;
use super::{
    cancellable, delete_diagnostics, extract_provider_data, not_configured, read_response,
    state_id,
};
use crate::api::environment::{Environment, EnvironmentGetOpts, EnvironmentUriOpts};
use crate::api::{ApiError, Client};
use crate::RunscopeProviderData;

#[derive(Default)]
pub struct EnvironmentResource {
    provider_data: Option<RunscopeProviderData>,
}

impl EnvironmentResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_environment(
        &self,
        ctx: &Context,
        client: &Client,
        opts: &EnvironmentGetOpts,
    ) -> Result<DynamicValue, ApiError> {
        let environment = cancellable(ctx, client.environments().get(opts)).await?;
        Ok(flatten_environment(&opts.uri, &environment))
    }
}

fn uri_opts(config: &DynamicValue) -> EnvironmentUriOpts {
    let test_id = get_string(config, "test_id");
    EnvironmentUriOpts {
        bucket_id: get_string(config, "bucket_id"),
        test_id: (!test_id.is_empty()).then_some(test_id),
    }
}

fn get_opts(state: &DynamicValue) -> EnvironmentGetOpts {
    EnvironmentGetOpts {
        uri: uri_opts(state),
        id: state_id(state),
    }
}

fn expand_environment(config: &DynamicValue) -> Environment {
    Environment {
        id: String::new(),
        name: get_string(config, "name"),
        script: get_string(config, "script"),
        preserve_cookies: get_bool(config, "preserve_cookies"),
        initial_variables: expand_string_map(config.value.get("initial_variables")),
        integrations: expand_string_list(&get_items(config, "integrations")),
        regions: expand_string_list(&get_items(config, "regions")),
        remote_agents: expand_remote_agents(&get_items(config, "remote_agent")),
        retry_on_failure: get_bool(config, "retry_on_failure"),
        verify_ssl: get_bool(config, "verify_ssl"),
        webhooks: expand_string_list(&get_items(config, "webhooks")),
        emails: expand_emails(&get_items(config, "email")),
    }
}

fn flatten_environment(uri: &EnvironmentUriOpts, environment: &Environment) -> DynamicValue {
    let test_id = uri.test_id.as_deref().unwrap_or_default();
    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::from(environment.id.as_str())),
        ("bucket_id", Dynamic::from(uri.bucket_id.as_str())),
        ("test_id", flatten_string(test_id)),
        ("name", Dynamic::from(environment.name.as_str())),
        ("script", flatten_string(&environment.script)),
        ("preserve_cookies", Dynamic::from(environment.preserve_cookies)),
        (
            "initial_variables",
            flatten_string_map(&environment.initial_variables),
        ),
        ("integrations", flatten_string_set(&environment.integrations)),
        ("regions", flatten_string_set(&environment.regions)),
        ("remote_agent", flatten_remote_agents(&environment.remote_agents)),
        ("retry_on_failure", Dynamic::from(environment.retry_on_failure)),
        ("verify_ssl", Dynamic::from(environment.verify_ssl)),
        ("webhooks", flatten_string_set(&environment.webhooks)),
        ("email", flatten_emails(&environment.emails)),
    ]))
}

fn string_set() -> AttributeType {
    AttributeType::Set(Box::new(AttributeType::String))
}

#[async_trait]
impl Resource for EnvironmentResource {
    fn type_name(&self) -> &str {
        "runscope_environment"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a shared or test-specific Runscope environment")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bucket_id", AttributeType::String)
                    .description("The bucket owning the environment")
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("test_id", AttributeType::String)
                    .description("The owning test. Leave unset for a shared environment.")
                    .optional()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("script", AttributeType::String)
                    .description("Initial script run before every test")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("preserve_cookies", AttributeType::Bool)
                    .optional()
                    .default(StaticBool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "initial_variables",
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("integrations", string_set())
                    .description("Ids of integrations enabled for runs in this environment")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("regions", string_set())
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("retry_on_failure", AttributeType::Bool)
                    .optional()
                    .default(StaticBool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("verify_ssl", AttributeType::Bool)
                    .optional()
                    .default(StaticBool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("webhooks", string_set())
                    .optional()
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("remote_agent", NestingMode::Set)
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("uuid", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("email", NestingMode::List)
                    .description("Email notification settings")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("notify_all", AttributeType::Bool)
                            .description("Notify every team member")
                            .optional()
                            .default(StaticBool(false))
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("notify_on", AttributeType::String)
                            .optional()
                            .validator(OneOf::new(EMAIL_NOTIFY_ON))
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("notify_threshold", AttributeType::Number)
                            .description("Consecutive failures before notifying")
                            .optional()
                            .validator(NumberRange {
                                min: Some(1.0),
                                max: Some(10.0),
                            })
                            .build(),
                    )
                    .block(
                        NestedBlockBuilder::new("recipient", NestingMode::Set)
                            .attribute(
                                AttributeBuilder::new("id", AttributeType::String)
                                    .optional()
                                    .build(),
                            )
                            .attribute(
                                AttributeBuilder::new("name", AttributeType::String)
                                    .optional()
                                    .build(),
                            )
                            .attribute(
                                AttributeBuilder::new("email", AttributeType::String)
                                    .optional()
                                    .build(),
                            )
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

        let uri = uri_opts(&request.planned_state);
        let body = expand_environment(&request.planned_state);
        let created = match cancellable(&ctx, client.environments().create(&uri, &body)).await {
            Ok(environment) => environment,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error(
                        "Failed to create environment",
                        format!("API error: {}", e),
                    )],
                }
            }
        };
        tracing::info!("Created environment {} at {}", created.id, uri.base_url());

        let opts = EnvironmentGetOpts {
            uri,
            id: created.id.clone(),
        };
        match self.read_environment(&ctx, client, &opts).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => CreateResourceResponse {
                new_state: flatten_environment(&opts.uri, &created),
                diagnostics: vec![Diagnostic::warning(
                    "Failed to refresh environment after create",
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

        let opts = get_opts(&request.current_state);
        let result = self
            .read_environment(&ctx, &provider_data.client, &opts)
            .await;
        read_response(result, request.current_state, "environment")
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

        let opts = get_opts(&request.prior_state);
        let body = expand_environment(&request.planned_state);
        if let Err(e) = cancellable(&ctx, client.environments().update(&opts, &body)).await {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error(
                    "Failed to update environment",
                    format!("API error: {}", e),
                )],
            };
        }
        tracing::debug!("Updated environment {}", opts.id);

        match self.read_environment(&ctx, client, &opts).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::warning(
                    "Failed to refresh environment after update",
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

        let opts = get_opts(&request.prior_state);
        let result = cancellable(&ctx, provider_data.client.environments().delete(&opts)).await;
        DeleteResourceResponse {
            diagnostics: delete_diagnostics(result, "environment"),
        }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = match parse_environment_import_id(&request.id) {
            Ok(id) => id,
            Err(e) => {
                return ImportResourceStateResponse {
                    imported_resources: vec![],
                    diagnostics: vec![Diagnostic::error("Invalid import ID", e.to_string())],
                }
            }
        };

        ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: request.type_name,
                state: DynamicValue::new(Dynamic::object([
                    ("id", Dynamic::from(id.environment_id)),
                    ("bucket_id", Dynamic::from(id.bucket_id)),
                    ("test_id", Dynamic::from(id.test_id)),
                ])),
            }],
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for EnvironmentResource {
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
