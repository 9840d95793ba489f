//! Team integration API implementation

use super::common::{deserialize_null_default, path_segment};
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub uuid: String,
    #[serde(alias = "type", default, deserialize_with = "deserialize_null_default")]
    pub integration_type: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub description: String,
}

/// Integrations API for team integration lookups
pub struct IntegrationsApi<'a> {
    client: &'a Client,
}

impl<'a> IntegrationsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /teams/{team}/integrations
    pub async fn list(&self, team_uuid: &str) -> Result<Vec<Integration>, ApiError> {
        self.client
            .get(&format!("/teams/{}/integrations", path_segment(team_uuid)))
            .await
    }
}
