//! Bucket API implementation

use super::common::{deserialize_null_default, path_segment};
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub default: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub verify_ssl: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub trigger_url: String,
    #[serde(default)]
    pub team: Option<Team>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
}

/// Request body for POST /buckets
#[derive(Debug, Clone, Serialize)]
pub struct BucketCreateOpts {
    pub name: String,
    pub team_uuid: String,
}

#[derive(Debug, Clone, Default)]
pub struct BucketGetOpts {
    pub key: String,
}

impl BucketGetOpts {
    pub fn url(&self) -> String {
        format!("/buckets/{}", path_segment(&self.key))
    }
}

/// Buckets API for bucket operations
pub struct BucketsApi<'a> {
    client: &'a Client,
}

impl<'a> BucketsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /buckets
    pub async fn list(&self) -> Result<Vec<Bucket>, ApiError> {
        self.client.get("/buckets").await
    }

    /// GET /buckets/{key}
    pub async fn get(&self, opts: &BucketGetOpts) -> Result<Bucket, ApiError> {
        self.client.get(&opts.url()).await
    }

    /// POST /buckets
    pub async fn create(&self, opts: &BucketCreateOpts) -> Result<Bucket, ApiError> {
        self.client.post("/buckets", opts).await
    }

    /// DELETE /buckets/{key}
    pub async fn delete(&self, opts: &BucketGetOpts) -> Result<(), ApiError> {
        self.client.delete(&opts.url()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, envelope};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn create_posts_name_and_team() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/buckets")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "api checks",
                "team_uuid": "team-1"
            })))
            .with_body(envelope(
                r#"{"key": "bkt1", "name": "api checks", "default": false, "verify_ssl": true,
                    "trigger_url": "https://api.runscope.com/radar/bucket/bkt1/trigger",
                    "team": {"id": "team-1", "name": "QA"}}"#,
            ))
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let bucket = client
            .buckets()
            .create(&BucketCreateOpts {
                name: "api checks".to_string(),
                team_uuid: "team-1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(bucket.key, "bkt1");
        assert!(bucket.verify_ssl);
        assert_eq!(bucket.team.unwrap().id, "team-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_and_delete_use_key_path() {
        let mut server = Server::new_async().await;
        let get = server
            .mock("GET", "/buckets/bkt1")
            .with_body(envelope(r#"{"key": "bkt1", "name": "b", "trigger_url": null}"#))
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/buckets/bkt1")
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let opts = BucketGetOpts {
            key: "bkt1".to_string(),
        };
        let bucket = client.buckets().get(&opts).await.unwrap();
        assert_eq!(bucket.name, "b");
        assert_eq!(bucket.trigger_url, "");
        client.buckets().delete(&opts).await.unwrap();

        get.assert_async().await;
        delete.assert_async().await;
    }
}
