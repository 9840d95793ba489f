//! Bucket data source implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::bucket::BucketGetOpts;
use crate::resources::bucket::flatten_bucket;
use crate::resources::cancellable;
use crate::resources::structure::get_string;
use crate::RunscopeProviderData;

#[derive(Default)]
pub struct BucketDataSource {
    provider_data: Option<RunscopeProviderData>,
}

impl BucketDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for BucketDataSource {
    fn type_name(&self) -> &str {
        "runscope_bucket"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Reads an existing Runscope bucket by key")
            .attribute(
                AttributeBuilder::new("key", AttributeType::String)
                    .description("The bucket key")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("team_uuid", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("default", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("verify_ssl", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("trigger_url", AttributeType::String)
                    .computed()
                    .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ));
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                };
            }
        };

        let key = get_string(&request.config, "key");
        let opts = BucketGetOpts { key: key.clone() };
        match cancellable(&ctx, provider_data.client.buckets().get(&opts)).await {
            Ok(bucket) => {
                let mut state = flatten_bucket(&bucket);
                if let Err(e) = state.set_string(&AttributePath::new("key"), key) {
                    diagnostics.push(Diagnostic::error("Failed to set key", e.to_string()));
                }
                ReadDataSourceResponse { state, diagnostics }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    format!("Failed to read bucket {}", key),
                    format!("API error: {}", e),
                ));
                ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for BucketDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];

        if let Some(data) = request.provider_data {
            if let Some(provider_data) = data.downcast_ref::<RunscopeProviderData>() {
                self.provider_data = Some(provider_data.clone());
            } else {
                tracing::error!("Failed to downcast provider data to RunscopeProviderData");
                diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract RunscopeProviderData from provider data",
                ));
            }
        } else {
            tracing::warn!("No provider data provided to bucket data source");
            diagnostics.push(Diagnostic::error(
                "No provider data",
                "No provider data was provided to the data source",
            ));
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}
