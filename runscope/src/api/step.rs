//! Test step API implementation
//!
//! A step is either an HTTP request or a subtest invocation; other step types
//! (pauses, conditions, ...) are only ever seen inside a test's step list.

use super::common::{deserialize_lenient_string, deserialize_null_default, path_segment};
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STEP_TYPE_REQUEST: &str = "request";
pub const STEP_TYPE_SUBTEST: &str = "subtest";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub property: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub source: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub property: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub comparison: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepAuth {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub auth_type: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub password: String,
}

impl StepAuth {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.auth_type.is_empty() && self.password.is_empty()
    }
}

/// A step as returned by the API. Fields that do not apply to the step's
/// type are left at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Step {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub step_type: String,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub method: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub auth: StepAuth,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub body: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub form: BTreeMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub scripts: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub before_scripts: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub note: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub skipped: bool,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub bucket_key: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub test_uuid: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub environment_uuid: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub use_parent_environment: bool,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub variables: Vec<Variable>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub assertions: Vec<Assertion>,
}

/// Writable fields of a request step
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepRequestOpts {
    pub method: String,
    pub url: String,
    pub variables: Vec<Variable>,
    pub assertions: Vec<Assertion>,
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "StepAuth::is_empty")]
    pub auth: StepAuth,
    pub body: String,
    pub form: BTreeMap<String, Vec<String>>,
    pub scripts: Vec<String>,
    pub before_scripts: Vec<String>,
    pub note: String,
    pub skipped: bool,
}

impl From<&Step> for StepRequestOpts {
    fn from(step: &Step) -> Self {
        Self {
            method: step.method.clone(),
            url: step.url.clone(),
            variables: step.variables.clone(),
            assertions: step.assertions.clone(),
            headers: step.headers.clone(),
            auth: step.auth.clone(),
            body: step.body.clone(),
            form: step.form.clone(),
            scripts: step.scripts.clone(),
            before_scripts: step.before_scripts.clone(),
            note: step.note.clone(),
            skipped: step.skipped,
        }
    }
}

/// Writable fields of a subtest step
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepSubtestOpts {
    pub bucket_key: String,
    pub test_uuid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_uuid: String,
    pub use_parent_environment: bool,
    pub variables: Vec<Variable>,
    pub assertions: Vec<Assertion>,
}

impl From<&Step> for StepSubtestOpts {
    fn from(step: &Step) -> Self {
        Self {
            bucket_key: step.bucket_key.clone(),
            test_uuid: step.test_uuid.clone(),
            environment_uuid: step.environment_uuid.clone(),
            use_parent_environment: step.use_parent_environment,
            variables: step.variables.clone(),
            assertions: step.assertions.clone(),
        }
    }
}

/// Request body: the writable fields tagged with their step type
#[derive(Serialize)]
struct StepBody<'a, T: Serialize> {
    step_type: &'static str,
    #[serde(flatten)]
    opts: &'a T,
}

#[derive(Debug, Clone, Default)]
pub struct StepUriOpts {
    pub bucket_id: String,
    pub test_id: String,
}

impl StepUriOpts {
    pub fn base_url(&self) -> String {
        format!(
            "/buckets/{}/tests/{}/steps",
            path_segment(&self.bucket_id),
            path_segment(&self.test_id)
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepGetOpts {
    pub uri: StepUriOpts,
    pub id: String,
}

impl StepGetOpts {
    pub fn url(&self) -> String {
        format!("{}/{}", self.uri.base_url(), path_segment(&self.id))
    }
}

/// Steps API for step operations
pub struct StepsApi<'a> {
    client: &'a Client,
}

impl<'a> StepsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// POST /buckets/{bucket}/tests/{test}/steps with a request step
    pub async fn create_request(
        &self,
        uri: &StepUriOpts,
        opts: &StepRequestOpts,
    ) -> Result<Step, ApiError> {
        self.create(uri, STEP_TYPE_REQUEST, opts).await
    }

    /// POST /buckets/{bucket}/tests/{test}/steps with a subtest step
    pub async fn create_subtest(
        &self,
        uri: &StepUriOpts,
        opts: &StepSubtestOpts,
    ) -> Result<Step, ApiError> {
        self.create(uri, STEP_TYPE_SUBTEST, opts).await
    }

    /// GET /buckets/{bucket}/tests/{test}/steps/{id}
    pub async fn get_request(&self, opts: &StepGetOpts) -> Result<Step, ApiError> {
        self.get(opts, STEP_TYPE_REQUEST).await
    }

    /// GET /buckets/{bucket}/tests/{test}/steps/{id}
    pub async fn get_subtest(&self, opts: &StepGetOpts) -> Result<Step, ApiError> {
        self.get(opts, STEP_TYPE_SUBTEST).await
    }

    /// PUT /buckets/{bucket}/tests/{test}/steps/{id}
    pub async fn update_request(
        &self,
        opts: &StepGetOpts,
        body: &StepRequestOpts,
    ) -> Result<Step, ApiError> {
        self.update(opts, STEP_TYPE_REQUEST, body).await
    }

    /// PUT /buckets/{bucket}/tests/{test}/steps/{id}
    pub async fn update_subtest(
        &self,
        opts: &StepGetOpts,
        body: &StepSubtestOpts,
    ) -> Result<Step, ApiError> {
        self.update(opts, STEP_TYPE_SUBTEST, body).await
    }

    /// DELETE /buckets/{bucket}/tests/{test}/steps/{id}
    pub async fn delete(&self, opts: &StepGetOpts) -> Result<(), ApiError> {
        self.client.delete(&opts.url()).await
    }

    /// The API answers a POST with the test's whole step list; the new step is last
    async fn create<T: Serialize>(
        &self,
        uri: &StepUriOpts,
        step_type: &'static str,
        opts: &T,
    ) -> Result<Step, ApiError> {
        let body = StepBody { step_type, opts };
        let steps: Vec<Step> = self.client.post(&uri.base_url(), &body).await?;
        steps.into_iter().last().ok_or_else(|| {
            ApiError::Parse("step list returned after create is empty".to_string())
        })
    }

    async fn get(&self, opts: &StepGetOpts, expected_type: &str) -> Result<Step, ApiError> {
        let step: Step = self.client.get(&opts.url()).await?;
        check_step_type(&step, expected_type)?;
        Ok(step)
    }

    async fn update<T: Serialize>(
        &self,
        opts: &StepGetOpts,
        step_type: &'static str,
        body: &T,
    ) -> Result<Step, ApiError> {
        let body = StepBody {
            step_type,
            opts: body,
        };
        self.client.put(&opts.url(), &body).await
    }
}

fn check_step_type(step: &Step, expected: &str) -> Result<(), ApiError> {
    if !step.step_type.is_empty() && step.step_type != expected {
        return Err(ApiError::Parse(format!(
            "step {} is a {} step, expected {}",
            step.id, step.step_type, expected
        )));
    }
    Ok(())
}
