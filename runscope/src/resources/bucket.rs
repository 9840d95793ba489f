//! Bucket resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use super::structure::{flatten_string, get_string};
use super::{
    cancellable, delete_diagnostics, extract_provider_data, not_configured, read_response,
    state_id,
};
use crate::api::bucket::{Bucket, BucketCreateOpts, BucketGetOpts};
use crate::api::{ApiError, Client};
use crate::RunscopeProviderData;

#[derive(Default)]
pub struct BucketResource {
    provider_data: Option<RunscopeProviderData>,
}

impl BucketResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_bucket(
        &self,
        ctx: &Context,
        client: &Client,
        key: &str,
    ) -> Result<DynamicValue, ApiError> {
        let opts = BucketGetOpts {
            key: key.to_string(),
        };
        let bucket = cancellable(ctx, client.buckets().get(&opts)).await?;
        Ok(flatten_bucket(&bucket))
    }
}

pub(crate) fn flatten_bucket(bucket: &Bucket) -> DynamicValue {
    let team = bucket.team.clone().unwrap_or_default();
    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::from(bucket.key.as_str())),
        ("name", Dynamic::from(bucket.name.as_str())),
        ("team_uuid", flatten_string(&team.id)),
        ("default", Dynamic::from(bucket.default)),
        ("verify_ssl", Dynamic::from(bucket.verify_ssl)),
        ("trigger_url", flatten_string(&bucket.trigger_url)),
    ]))
}

#[async_trait]
impl Resource for BucketResource {
    fn type_name(&self) -> &str {
        "runscope_bucket"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a Runscope bucket. Buckets cannot be changed in place.")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The bucket key")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the bucket")
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("team_uuid", AttributeType::String)
                    .description("The team this bucket belongs to")
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("default", AttributeType::Bool)
                    .description("Whether this is the team's default bucket")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("verify_ssl", AttributeType::Bool)
                    .description("Whether requests in this bucket verify SSL certificates")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("trigger_url", AttributeType::String)
                    .description("URL that triggers all tests in the bucket")
                    .computed()
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

        let opts = BucketCreateOpts {
            name: get_string(&request.planned_state, "name"),
            team_uuid: get_string(&request.planned_state, "team_uuid"),
        };

        let bucket = match cancellable(&ctx, client.buckets().create(&opts)).await {
            Ok(bucket) => bucket,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![Diagnostic::error(
                        "Failed to create bucket",
                        format!("API error: {}", e),
                    )],
                }
            }
        };
        tracing::info!("Created bucket {} ({})", bucket.key, bucket.name);

        match self.read_bucket(&ctx, client, &bucket.key).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => CreateResourceResponse {
                new_state: flatten_bucket(&bucket),
                diagnostics: vec![Diagnostic::warning(
                    "Failed to refresh bucket after create",
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

        let key = state_id(&request.current_state);
        let result = self.read_bucket(&ctx, &provider_data.client, &key).await;
        read_response(result, request.current_state, "bucket")
    }

    /// Every configurable attribute forces replacement, so only computed
    /// attributes can differ here; refresh them.
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

        let key = state_id(&request.prior_state);
        match self.read_bucket(&ctx, &provider_data.client, &key).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error(
                    "Failed to update bucket",
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

        let opts = BucketGetOpts {
            key: state_id(&request.prior_state),
        };
        let result = cancellable(&ctx, provider_data.client.buckets().delete(&opts)).await;
        DeleteResourceResponse {
            diagnostics: delete_diagnostics(result, "bucket"),
        }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for BucketResource {
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
