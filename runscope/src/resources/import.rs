//! Composite import identifiers
//!
//! Imported objects are addressed through their owners: a step through its
//! bucket and test, an environment through its bucket and optionally its test.

use super::cancellable;
use crate::api::test::TestGetOpts;
use crate::api::Client;
use std::str::FromStr;
use tfplug::context::Context;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportIdError {
    #[error("step ID for import should be in format bucket_id/test_id/step_id or bucket_id/test_id#step_position")]
    MalformedStepId,

    #[error("step_position should be a positive integer number")]
    InvalidStepPosition,

    #[error("test {test_id} contains only {count} steps")]
    StepPositionOutOfRange { test_id: String, count: usize },

    #[error("couldn't read test: {0}")]
    TestRead(String),

    #[error("test ID for import should be in format bucket_id/test_id")]
    MalformedTestId,

    #[error("environment ID for import should be in format bucket_id/environment_id or bucket_id/test_id/environment_id")]
    MalformedEnvironmentId,
}

/// A step import ID before it is resolved against the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepImportId {
    /// `bucket_id/test_id/step_id`
    Explicit {
        bucket_id: String,
        test_id: String,
        step_id: String,
    },
    /// `bucket_id/test_id#step_position`, 1-based
    Position {
        bucket_id: String,
        test_id: String,
        position: usize,
    },
}

/// Fully resolved step address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepAddress {
    pub bucket_id: String,
    pub test_id: String,
    pub step_id: String,
}

fn non_empty(parts: &[&str]) -> bool {
    parts.iter().all(|p| !p.is_empty())
}

impl FromStr for StepImportId {
    type Err = ImportIdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = id.split('/').collect();

        match parts.as_slice() {
            [bucket_id, test_id, step_id] if non_empty(&parts) => Ok(StepImportId::Explicit {
                bucket_id: bucket_id.to_string(),
                test_id: test_id.to_string(),
                step_id: step_id.to_string(),
            }),
            [bucket_id, rest] => {
                let (test_id, position) = match rest.split('#').collect::<Vec<_>>().as_slice() {
                    [test_id, position] if !bucket_id.is_empty() && !test_id.is_empty() => {
                        (test_id.to_string(), *position)
                    }
                    _ => return Err(ImportIdError::MalformedStepId),
                };

                let position = position
                    .parse::<i64>()
                    .ok()
                    .filter(|p| *p >= 1)
                    .ok_or(ImportIdError::InvalidStepPosition)?;

                Ok(StepImportId::Position {
                    bucket_id: bucket_id.to_string(),
                    test_id,
                    position: position as usize,
                })
            }
            _ => Err(ImportIdError::MalformedStepId),
        }
    }
}

impl StepImportId {
    /// Turns a position into a concrete step id by reading the owning test
    pub async fn resolve(self, ctx: &Context, client: &Client) -> Result<StepAddress, ImportIdError> {
        match self {
            StepImportId::Explicit {
                bucket_id,
                test_id,
                step_id,
            } => Ok(StepAddress {
                bucket_id,
                test_id,
                step_id,
            }),
            StepImportId::Position {
                bucket_id,
                test_id,
                position,
            } => {
                let opts = TestGetOpts {
                    bucket_id: bucket_id.clone(),
                    id: test_id.clone(),
                };
                let test = cancellable(ctx, client.tests().get(&opts))
                    .await
                    .map_err(|e| ImportIdError::TestRead(e.to_string()))?;

                let step = test.steps.get(position - 1).ok_or_else(|| {
                    ImportIdError::StepPositionOutOfRange {
                        test_id: test_id.clone(),
                        count: test.steps.len(),
                    }
                })?;

                tracing::debug!(
                    "Resolved step position {} of test {} to step {}",
                    position,
                    test_id,
                    step.id
                );

                Ok(StepAddress {
                    step_id: step.id.clone(),
                    bucket_id,
                    test_id,
                })
            }
        }
    }
}

/// `bucket_id/test_id`
pub fn parse_test_import_id(id: &str) -> Result<(String, String), ImportIdError> {
    match id.split('/').collect::<Vec<_>>().as_slice() {
        [bucket_id, test_id] if !bucket_id.is_empty() && !test_id.is_empty() => {
            Ok((bucket_id.to_string(), test_id.to_string()))
        }
        _ => Err(ImportIdError::MalformedTestId),
    }
}

/// Parsed environment import ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentImportId {
    pub bucket_id: String,
    pub test_id: Option<String>,
    pub environment_id: String,
}

/// `bucket_id/environment_id` or `bucket_id/test_id/environment_id`
pub fn parse_environment_import_id(id: &str) -> Result<EnvironmentImportId, ImportIdError> {
    let parts: Vec<&str> = id.split('/').collect();
    if !non_empty(&parts) {
        return Err(ImportIdError::MalformedEnvironmentId);
    }
    match parts.as_slice() {
        [bucket_id, environment_id] => Ok(EnvironmentImportId {
            bucket_id: bucket_id.to_string(),
            test_id: None,
            environment_id: environment_id.to_string(),
        }),
        [bucket_id, test_id, environment_id] => Ok(EnvironmentImportId {
            bucket_id: bucket_id.to_string(),
            test_id: Some(test_id.to_string()),
            environment_id: environment_id.to_string(),
        }),
        _ => Err(ImportIdError::MalformedEnvironmentId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, envelope};
    use mockito::Server;

    #[test]
    fn parses_explicit_step_id() {
        assert_eq!(
            "b1/t1/s1".parse::<StepImportId>().unwrap(),
            StepImportId::Explicit {
                bucket_id: "b1".to_string(),
                test_id: "t1".to_string(),
                step_id: "s1".to_string(),
            }
        );
    }

    #[test]
    fn parses_step_position() {
        assert_eq!(
            "b1/t1#2".parse::<StepImportId>().unwrap(),
            StepImportId::Position {
                bucket_id: "b1".to_string(),
                test_id: "t1".to_string(),
                position: 2,
            }
        );
    }

    #[test]
    fn rejects_malformed_step_ids() {
        for id in ["b1", "b1/t1", "b1/t1/s1/x", "b1/t1#1#2", "/t1#1", "b1//s1", ""] {
            assert_eq!(
                id.parse::<StepImportId>().unwrap_err(),
                ImportIdError::MalformedStepId,
                "{}",
                id
            );
        }
    }

    #[test]
    fn rejects_non_positive_positions() {
        for id in ["b1/t1#0", "b1/t1#-1", "b1/t1#two", "b1/t1#"] {
            let err = id.parse::<StepImportId>().unwrap_err();
            assert_eq!(err, ImportIdError::InvalidStepPosition, "{}", id);
            assert_eq!(
                err.to_string(),
                "step_position should be a positive integer number"
            );
        }
    }

    #[test]
    fn malformed_step_message() {
        assert_eq!(
            ImportIdError::MalformedStepId.to_string(),
            "step ID for import should be in format bucket_id/test_id/step_id or bucket_id/test_id#step_position"
        );
    }

    const TEST_WITH_STEPS: &str = r#"{"id": "t1", "name": "smoke",
        "steps": [{"id": "s1", "step_type": "request"},
                  {"id": "s2", "step_type": "request"},
                  {"id": "s3", "step_type": "subtest"}]}"#;

    #[tokio::test]
    async fn position_resolves_to_same_address_as_explicit_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/buckets/b1/tests/t1")
            .with_body(envelope(TEST_WITH_STEPS))
            .create_async()
            .await;
        let client = create_test_client(&server.url());

        let by_position = "b1/t1#2"
            .parse::<StepImportId>()
            .unwrap()
            .resolve(&Context::new(), &client)
            .await
            .unwrap();
        let explicit = "b1/t1/s2"
            .parse::<StepImportId>()
            .unwrap()
            .resolve(&Context::new(), &client)
            .await
            .unwrap();

        assert_eq!(by_position.step_id, "s2");
        assert_eq!(by_position, explicit);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn position_past_last_step_fails() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/buckets/b1/tests/t1")
            .with_body(envelope(TEST_WITH_STEPS))
            .create_async()
            .await;
        let client = create_test_client(&server.url());

        let err = "b1/t1#4"
            .parse::<StepImportId>()
            .unwrap()
            .resolve(&Context::new(), &client)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "test t1 contains only 3 steps");
    }

    #[tokio::test]
    async fn failed_test_read_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/buckets/b1/tests/t1")
            .with_status(404)
            .with_body(r#"{"error": {"status": 404, "message": "test not found"}}"#)
            .create_async()
            .await;
        let client = create_test_client(&server.url());

        let err = "b1/t1#1"
            .parse::<StepImportId>()
            .unwrap()
            .resolve(&Context::new(), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportIdError::TestRead(_)));
        assert!(err.to_string().starts_with("couldn't read test: "));
        assert!(err.to_string().contains("test not found"));
    }

    #[tokio::test]
    async fn cancelled_context_skips_test_read() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/buckets/b1/tests/t1")
            .with_body(envelope(TEST_WITH_STEPS))
            .expect(0)
            .create_async()
            .await;
        let client = create_test_client(&server.url());

        let ctx = Context::new();
        ctx.cancel();
        let err = "b1/t1#1"
            .parse::<StepImportId>()
            .unwrap()
            .resolve(&ctx, &client)
            .await
            .unwrap_err();

        assert_eq!(err, ImportIdError::TestRead("Request cancelled".to_string()));
        mock.assert_async().await;
    }

    #[test]
    fn parses_test_import_id() {
        assert_eq!(
            parse_test_import_id("b1/t1").unwrap(),
            ("b1".to_string(), "t1".to_string())
        );
        assert_eq!(
            parse_test_import_id("b1").unwrap_err(),
            ImportIdError::MalformedTestId
        );
        assert!(parse_test_import_id("b1/t1/x").is_err());
    }

    #[test]
    fn parses_environment_import_ids() {
        let shared = parse_environment_import_id("b1/e1").unwrap();
        assert_eq!(shared.test_id, None);
        assert_eq!(shared.environment_id, "e1");

        let test = parse_environment_import_id("b1/t1/e1").unwrap();
        assert_eq!(test.test_id.as_deref(), Some("t1"));
        assert_eq!(test.environment_id, "e1");

        assert_eq!(
            parse_environment_import_id("b1").unwrap_err(),
            ImportIdError::MalformedEnvironmentId
        );
        assert!(parse_environment_import_id("b1//e1").is_err());
    }
}
