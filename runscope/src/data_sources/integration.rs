//! Integration data source implementation
//!
//! Looks up a team integration by type, optionally narrowed by `filter`
//! blocks. Filters are combined with AND; the values of one filter with OR.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::OneOf;

use crate::api::integration::Integration;
use crate::resources::cancellable;
use crate::resources::structure::{expand_string_list, get_items, get_string, item_list, item_string};
use crate::RunscopeProviderData;

const FILTER_NAMES: &[&str] = &["id", "type", "description"];

#[derive(Debug, Clone, PartialEq)]
struct IntegrationFilter {
    name: String,
    values: Vec<String>,
}

impl IntegrationFilter {
    fn matches(&self, integration: &Integration) -> bool {
        let field = match self.name.as_str() {
            "id" => &integration.uuid,
            "type" => &integration.integration_type,
            "description" => &integration.description,
            _ => return false,
        };
        self.values.iter().any(|v| v == field)
    }
}

fn expand_filters(config: &DynamicValue) -> Vec<IntegrationFilter> {
    get_items(config, "filter")
        .iter()
        .map(|item| IntegrationFilter {
            name: item_string(item, "name"),
            values: expand_string_list(item_list(item, "values")),
        })
        .collect()
}

fn find_integration<'a>(
    integrations: &'a [Integration],
    integration_type: &str,
    filters: &[IntegrationFilter],
) -> Option<&'a Integration> {
    integrations.iter().find(|i| {
        i.integration_type == integration_type && filters.iter().all(|f| f.matches(i))
    })
}

#[derive(Default)]
pub struct IntegrationDataSource {
    provider_data: Option<RunscopeProviderData>,
}

impl IntegrationDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for IntegrationDataSource {
    fn type_name(&self) -> &str {
        "runscope_integration"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Looks up a Runscope team integration")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The integration UUID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("team_uuid", AttributeType::String)
                    .description("The team whose integrations are searched")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("Integration type, e.g. slack")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("filter", NestingMode::Set)
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .validator(OneOf::new(FILTER_NAMES))
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new(
                            "values",
                            AttributeType::List(Box::new(AttributeType::String)),
                        )
                        .required()
                        .build(),
                    )
                    .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![Diagnostic::error(
                        "Provider not configured",
                        "Provider data was not properly configured",
                    )],
                };
            }
        };

        let team_uuid = get_string(&request.config, "team_uuid");
        let integration_type = get_string(&request.config, "type");
        let filters = expand_filters(&request.config);

        let integrations_api = provider_data.client.integrations();
        let list = integrations_api.list(&team_uuid);
        let integrations = match cancellable(&ctx, list).await {
            Ok(integrations) => integrations,
            Err(e) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![Diagnostic::error(
                        "Failed to list integrations",
                        format!("API error: {}", e),
                    )],
                };
            }
        };
        tracing::debug!(
            "Team {} has {} integrations, looking for type {}",
            team_uuid,
            integrations.len(),
            integration_type
        );

        let Some(found) = find_integration(&integrations, &integration_type, &filters) else {
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error(
                    "Integration not found",
                    format!(
                        "Unable to find any {} integration for team {} matching the filters",
                        integration_type, team_uuid
                    ),
                )],
            };
        };

        let filter = request.config.value.get("filter").cloned();
        let state = DynamicValue::new(Dynamic::object([
            ("id", Dynamic::from(found.uuid.as_str())),
            ("team_uuid", Dynamic::from(team_uuid)),
            ("type", Dynamic::from(found.integration_type.as_str())),
            ("description", Dynamic::from(found.description.as_str())),
            ("filter", filter.unwrap_or(Dynamic::Null)),
        ]));

        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for IntegrationDataSource {
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
            tracing::warn!("No provider data provided to integration data source");
            diagnostics.push(Diagnostic::error(
                "No provider data",
                "No provider data was provided to the data source",
            ));
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}
