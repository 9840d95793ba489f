pub mod api;
pub mod data_sources;
pub mod provider_data;
pub mod resources;

pub use provider_data::RunscopeProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

pub const ACCESS_TOKEN_ENV: &str = "RUNSCOPE_ACCESS_TOKEN";
pub const API_URL_ENV: &str = "RUNSCOPE_API_URL";

#[derive(Default)]
pub struct RunscopeProvider {
    provider_data: Option<RunscopeProviderData>,
}

impl RunscopeProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A non-empty string attribute from the provider block, else the environment
fn config_or_env(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    config
        .get_string(&AttributePath::new(name))
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var(env).ok().filter(|s| !s.is_empty()))
}

#[async_trait]
impl Provider for RunscopeProvider {
    fn type_name(&self) -> &str {
        "runscope"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manage Runscope API tests, environments and buckets")
            .attribute(
                AttributeBuilder::new("access_token", AttributeType::String)
                    .description("Runscope access token. Can also be set with RUNSCOPE_ACCESS_TOKEN.")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_url", AttributeType::String)
                    .description("Runscope API URL. Can also be set with RUNSCOPE_API_URL.")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let access_token = config_or_env(&request.config, "access_token", ACCESS_TOKEN_ENV);
        let api_url = config_or_env(&request.config, "api_url", API_URL_ENV)
            .unwrap_or_else(|| api::DEFAULT_API_URL.to_string());

        let mut diagnostics = vec![];

        match access_token {
            Some(access_token) => match api::Client::new(&api_url, &access_token) {
                Ok(client) => {
                    tracing::info!("Configured Runscope provider against {}", client.base_url());
                    self.provider_data = Some(RunscopeProviderData::new(client));
                }
                Err(e) => {
                    diagnostics.push(Diagnostic::error(
                        "Failed to create API client",
                        e.to_string(),
                    ));
                }
            },
            None => {
                diagnostics.push(Diagnostic::error(
                    "access_token is required (set in provider config or RUNSCOPE_ACCESS_TOKEN env var)",
                    "",
                ));
            }
        }

        let provider_data = self
            .provider_data
            .clone()
            .map(|data| Arc::new(data) as Arc<dyn std::any::Any + Send + Sync>);

        ConfigureProviderResponse {
            diagnostics,
            provider_data,
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "runscope_bucket".to_string(),
            Box::new(|| Box::new(resources::BucketResource::new()) as Box<dyn ResourceWithConfigure>),
        );
        factories.insert(
            "runscope_test".to_string(),
            Box::new(|| Box::new(resources::TestResource::new()) as Box<dyn ResourceWithConfigure>),
        );
        factories.insert(
            "runscope_environment".to_string(),
            Box::new(|| {
                Box::new(resources::EnvironmentResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        factories.insert(
            "runscope_step".to_string(),
            Box::new(|| {
                Box::new(resources::StepRequestResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        factories.insert(
            "runscope_step_subtest".to_string(),
            Box::new(|| {
                Box::new(resources::StepSubtestResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "runscope_integration".to_string(),
            Box::new(|| {
                Box::new(data_sources::IntegrationDataSource::new())
                    as Box<dyn DataSourceWithConfigure>
            }),
        );
        factories.insert(
            "runscope_bucket".to_string(),
            Box::new(|| {
                Box::new(data_sources::BucketDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        factories
    }
}
