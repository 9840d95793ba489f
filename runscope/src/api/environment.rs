//! Environment API implementation
//!
//! Environments belong either to a bucket (shared) or to a single test.

use super::common::{deserialize_lenient_i64, deserialize_null_default, path_segment};
use super::{ApiError, Client};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub script: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub preserve_cookies: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub initial_variables: BTreeMap<String, String>,
    /// Integration ids; the wire format is a list of `{"id": ...}` objects
    #[serde(default, with = "integration_refs")]
    pub integrations: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub regions: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub remote_agents: Vec<RemoteAgent>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub retry_on_failure: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub verify_ssl: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub webhooks: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub emails: Emails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteAgent {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub uuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Emails {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub notify_all: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub notify_on: String,
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub notify_threshold: i64,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub recipients: Vec<Recipient>,
}

impl Emails {
    /// True when nothing about email notification has been configured
    pub fn is_default(&self) -> bool {
        !self.notify_all
            && self.notify_on.is_empty()
            && self.notify_threshold == 0
            && self.recipients.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub email: String,
}

mod integration_refs {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct IntegrationRef {
        id: String,
    }

    pub fn serialize<S: Serializer>(ids: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        ids.iter()
            .map(|id| IntegrationRef { id: id.clone() })
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let refs = Option::<Vec<IntegrationRef>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(refs.into_iter().map(|r| r.id).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentUriOpts {
    pub bucket_id: String,
    /// Set for test-specific environments
    pub test_id: Option<String>,
}

impl EnvironmentUriOpts {
    pub fn base_url(&self) -> String {
        match self.test_id.as_deref().filter(|t| !t.is_empty()) {
            None => format!("/buckets/{}/environments", path_segment(&self.bucket_id)),
            Some(test_id) => format!(
                "/buckets/{}/test/{}/environments",
                path_segment(&self.bucket_id),
                path_segment(test_id)
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentGetOpts {
    pub uri: EnvironmentUriOpts,
    pub id: String,
}

impl EnvironmentGetOpts {
    pub fn url(&self) -> String {
        format!("{}/{}", self.uri.base_url(), path_segment(&self.id))
    }
}

/// Environments API for shared and test environments
pub struct EnvironmentsApi<'a> {
    client: &'a Client,
}

impl<'a> EnvironmentsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// POST {base}/environments
    pub async fn create(
        &self,
        uri: &EnvironmentUriOpts,
        environment: &Environment,
    ) -> Result<Environment, ApiError> {
        self.client.post(&uri.base_url(), environment).await
    }

    /// GET {base}/environments/{id}
    pub async fn get(&self, opts: &EnvironmentGetOpts) -> Result<Environment, ApiError> {
        self.client.get(&opts.url()).await
    }

    /// PUT {base}/environments/{id}
    pub async fn update(
        &self,
        opts: &EnvironmentGetOpts,
        environment: &Environment,
    ) -> Result<Environment, ApiError> {
        self.client.put(&opts.url(), environment).await
    }

    /// DELETE {base}/environments/{id}
    pub async fn delete(&self, opts: &EnvironmentGetOpts) -> Result<(), ApiError> {
        self.client.delete(&opts.url()).await
    }
}
