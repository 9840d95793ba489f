//! Test API implementation

use super::common::{deserialize_lenient_i64, deserialize_null_default, path_segment};
use super::step::Step;
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Test {
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub default_environment_id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub trigger_url: String,
    /// Unix seconds
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub steps: Vec<Step>,
}

/// Writable fields of a test
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestOpts {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_environment_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct TestUriOpts {
    pub bucket_id: String,
}

impl TestUriOpts {
    pub fn base_url(&self) -> String {
        format!("/buckets/{}/tests", path_segment(&self.bucket_id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestGetOpts {
    pub bucket_id: String,
    pub id: String,
}

impl TestGetOpts {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            TestUriOpts {
                bucket_id: self.bucket_id.clone()
            }
            .base_url(),
            path_segment(&self.id)
        )
    }
}

/// Tests API for test operations
pub struct TestsApi<'a> {
    client: &'a Client,
}

impl<'a> TestsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// POST /buckets/{bucket}/tests
    pub async fn create(&self, uri: &TestUriOpts, opts: &TestOpts) -> Result<Test, ApiError> {
        self.client.post(&uri.base_url(), opts).await
    }

    /// GET /buckets/{bucket}/tests/{id}
    pub async fn get(&self, opts: &TestGetOpts) -> Result<Test, ApiError> {
        self.client.get(&opts.url()).await
    }

    /// PUT /buckets/{bucket}/tests/{id}
    pub async fn update(&self, opts: &TestGetOpts, body: &TestOpts) -> Result<Test, ApiError> {
        self.client.put(&opts.url(), body).await
    }

    /// DELETE /buckets/{bucket}/tests/{id}
    pub async fn delete(&self, opts: &TestGetOpts) -> Result<(), ApiError> {
        self.client.delete(&opts.url()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, envelope};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn get_test_keeps_step_order() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/buckets/b1/tests/t1")
            .with_body(envelope(
                r#"{"id": "t1", "name": "smoke", "description": null, "created_at": 1588852420,
                    "default_environment_id": "e1",
                    "steps": [{"id": "s1", "step_type": "request"},
                              {"id": "s2", "step_type": "pause"},
                              {"id": "s3", "step_type": "subtest"}]}"#,
            ))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let test = client
            .tests()
            .get(&TestGetOpts {
                bucket_id: "b1".to_string(),
                id: "t1".to_string(),
            })
            .await
            .unwrap();

        let ids: Vec<&str> = test.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
        assert_eq!(test.description, "");
        assert_eq!(test.created_at, 1588852420);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_and_update_send_writable_fields() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/buckets/b1/tests")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "smoke",
                "description": "checks"
            })))
            .with_status(201)
            .with_body(envelope(r#"{"id": "t1", "name": "smoke", "description": "checks"}"#))
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/buckets/b1/tests/t1")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "smoke",
                "description": "checks",
                "default_environment_id": "e1"
            })))
            .with_body(envelope(r#"{"id": "t1", "name": "smoke", "default_environment_id": "e1"}"#))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let mut opts = TestOpts {
            name: "smoke".to_string(),
            description: "checks".to_string(),
            ..Default::default()
        };
        let created = client
            .tests()
            .create(
                &TestUriOpts {
                    bucket_id: "b1".to_string(),
                },
                &opts,
            )
            .await
            .unwrap();
        assert_eq!(created.id, "t1");

        opts.default_environment_id = "e1".to_string();
        let updated = client
            .tests()
            .update(
                &TestGetOpts {
                    bucket_id: "b1".to_string(),
                    id: created.id,
                },
                &opts,
            )
            .await
            .unwrap();
        assert_eq!(updated.default_environment_id, "e1");

        create.assert_async().await;
        update.assert_async().await;
    }
}
