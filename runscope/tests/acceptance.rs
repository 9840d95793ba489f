//! Live tests against the Runscope API
//!
//! Run with RUNSCOPE_ACCESS_TOKEN and RUNSCOPE_TEAM_ID set; the integration
//! filter test also needs RUNSCOPE_INTEGRATION_DESC. Without them every test
//! returns early.

use runscope::RunscopeProvider;
use serial_test::serial;
use std::any::Any;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::{ConfigureDataSourceRequest, ReadDataSourceRequest};
use tfplug::provider::ConfigureProviderRequest;
use tfplug::resource::{
    plan_new_state, ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest,
};
use tfplug::{
    AttributePath, DataSource, DataSourceWithConfigure, Dynamic, DynamicValue, Provider,
    Resource, ResourceWithConfigure,
};

struct Live {
    provider: RunscopeProvider,
    provider_data: Arc<dyn Any + Send + Sync>,
    team_id: String,
}

async fn live() -> Option<Live> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (Ok(_), Ok(team_id)) = (
        std::env::var("RUNSCOPE_ACCESS_TOKEN"),
        std::env::var("RUNSCOPE_TEAM_ID"),
    ) else {
        eprintln!("RUNSCOPE_ACCESS_TOKEN and RUNSCOPE_TEAM_ID must be set for acceptance tests");
        return None;
    };

    let mut provider = RunscopeProvider::new();
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::empty_object(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

    Some(Live {
        provider,
        provider_data: response.provider_data?,
        team_id,
    })
}

impl Live {
    async fn resource(&self, type_name: &str) -> Box<dyn ResourceWithConfigure> {
        let mut resource = self.provider.resources()[type_name]();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(self.provider_data.clone()),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    async fn data_source(&self, type_name: &str) -> Box<dyn DataSourceWithConfigure> {
        let mut data_source = self.provider.data_sources()[type_name]();
        let response = data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: Some(self.provider_data.clone()),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        data_source
    }
}

async fn create(
    resource: &dyn ResourceWithConfigure,
    pairs: Vec<(&str, Dynamic)>,
) -> DynamicValue {
    let config = DynamicValue::new(Dynamic::object(pairs));
    let planned_state = plan_new_state(resource, Context::new(), &config).await;
    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: resource.type_name().to_string(),
                planned_state,
                config,
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    response.new_state
}

async fn delete(resource: &dyn ResourceWithConfigure, state: DynamicValue) {
    let response = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: resource.type_name().to_string(),
                prior_state: state,
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
}

fn string_at(state: &DynamicValue, name: &str) -> String {
    state.get_string(&AttributePath::new(name)).unwrap()
}

#[tokio::test]
#[serial]
async fn bucket_test_and_step_lifecycle() {
    let Some(live) = live().await else {
        return;
    };

    let buckets = live.resource("runscope_bucket").await;
    let tests = live.resource("runscope_test").await;
    let steps = live.resource("runscope_step").await;
    let environments = live.resource("runscope_environment").await;

    let bucket = create(
        buckets.as_ref(),
        vec![
            ("name", Dynamic::from("terraform-provider-test")),
            ("team_uuid", Dynamic::from(live.team_id.as_str())),
        ],
    )
    .await;
    let bucket_id = string_at(&bucket, "id");

    let test = create(
        tests.as_ref(),
        vec![
            ("bucket_id", Dynamic::from(bucket_id.as_str())),
            ("name", Dynamic::from("provider acceptance")),
            ("description", Dynamic::from("created by acceptance tests")),
        ],
    )
    .await;
    let test_id = string_at(&test, "id");

    let environment = create(
        environments.as_ref(),
        vec![
            ("bucket_id", Dynamic::from(bucket_id.as_str())),
            ("test_id", Dynamic::from(test_id.as_str())),
            ("name", Dynamic::from("acceptance")),
        ],
    )
    .await;
    assert_eq!(string_at(&environment, "test_id"), test_id);
    assert!(environment.get_bool(&AttributePath::new("verify_ssl")).unwrap());

    let step = create(
        steps.as_ref(),
        vec![
            ("bucket_id", Dynamic::from(bucket_id.as_str())),
            ("test_id", Dynamic::from(test_id.as_str())),
            ("method", Dynamic::from("GET")),
            ("url", Dynamic::from("https://example.com")),
            (
                "assertion",
                Dynamic::List(vec![Dynamic::object([
                    ("source", Dynamic::from("response_status")),
                    ("comparison", Dynamic::from("equal_number")),
                    ("value", Dynamic::from("200")),
                ])]),
            ),
        ],
    )
    .await;

    let imported = steps
        .import_state(
            Context::new(),
            ImportResourceStateRequest {
                type_name: "runscope_step".to_string(),
                id: format!("{}/{}#1", bucket_id, test_id),
            },
        )
        .await;
    assert!(imported.diagnostics.is_empty(), "{:?}", imported.diagnostics);
    assert_eq!(
        string_at(&imported.imported_resources[0].state, "id"),
        string_at(&step, "id")
    );

    delete(steps.as_ref(), step).await;
    delete(environments.as_ref(), environment).await;
    delete(tests.as_ref(), test.clone()).await;

    let gone = tests
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "runscope_test".to_string(),
                current_state: test,
            },
        )
        .await;
    assert!(gone.new_state.is_none());

    delete(buckets.as_ref(), bucket).await;
}

#[tokio::test]
#[serial]
async fn integration_by_type() {
    let Some(live) = live().await else {
        return;
    };

    let integrations = live.data_source("runscope_integration").await;
    let read = integrations
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "runscope_integration".to_string(),
                config: DynamicValue::new(Dynamic::object([
                    ("team_uuid", Dynamic::from(live.team_id.as_str())),
                    ("type", Dynamic::from("slack")),
                ])),
            },
        )
        .await;

    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
    assert!(!string_at(&read.state, "id").is_empty());
    assert_eq!(string_at(&read.state, "type"), "slack");
}

#[tokio::test]
#[serial]
async fn integration_by_description_filter() {
    let Ok(description) = std::env::var("RUNSCOPE_INTEGRATION_DESC") else {
        eprintln!("RUNSCOPE_INTEGRATION_DESC should be set");
        return;
    };
    let Some(live) = live().await else {
        return;
    };

    let integrations = live.data_source("runscope_integration").await;
    let read = integrations
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "runscope_integration".to_string(),
                config: DynamicValue::new(Dynamic::object([
                    ("team_uuid", Dynamic::from(live.team_id.as_str())),
                    ("type", Dynamic::from("slack")),
                    (
                        "filter",
                        Dynamic::List(vec![
                            Dynamic::object([
                                ("name", Dynamic::from("type")),
                                ("values", Dynamic::from(vec!["slack".to_string()])),
                            ]),
                            Dynamic::object([
                                ("name", Dynamic::from("description")),
                                (
                                    "values",
                                    Dynamic::from(vec![
                                        description.clone(),
                                        "other test description".to_string(),
                                    ]),
                                ),
                            ]),
                        ]),
                    ),
                ])),
            },
        )
        .await;

    assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
    assert_eq!(string_at(&read.state, "description"), description);
}
