//! Resource implementations

pub mod bucket;
pub mod environment;
pub mod import;
pub mod step_request;
pub mod step_subtest;
pub mod structure;

pub use bucket::BucketResource;
pub use environment::EnvironmentResource;
pub use step_request::StepRequestResource;
pub use step_subtest::StepSubtestResource;
pub use test::TestResource;

use crate::api::ApiError;
use crate::RunscopeProviderData;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::resource::ReadResourceResponse;
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

/// Downcasts the opaque provider data handed to configure hooks
pub(crate) fn extract_provider_data(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> Result<RunscopeProviderData, Diagnostic> {
    let data = provider_data.ok_or_else(|| {
        Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        )
    })?;

    data.downcast_ref::<RunscopeProviderData>()
        .cloned()
        .ok_or_else(|| {
            Diagnostic::error(
                "Invalid provider data",
                "Failed to extract RunscopeProviderData from provider data",
            )
        })
}

/// Runs an API call unless Terraform cancels the request or its deadline
/// passes first
pub(crate) async fn cancellable<T>(
    ctx: &Context,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    if ctx.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    tokio::select! {
        result = call => result,
        _ = ctx.cancelled() => {
            tracing::warn!("API call abandoned, request was cancelled");
            Err(ApiError::Cancelled)
        }
    }
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

/// The `id` attribute, empty when absent
pub(crate) fn state_id(state: &DynamicValue) -> String {
    state.get_string(&AttributePath::new("id")).unwrap_or_default()
}

/// Maps the outcome of a refresh onto a read response: a 404 removes the
/// resource from state, any other error keeps the prior state.
pub(crate) fn read_response(
    result: Result<DynamicValue, ApiError>,
    current_state: DynamicValue,
    what: &str,
) -> ReadResourceResponse {
    match result {
        Ok(state) => ReadResourceResponse {
            new_state: Some(state),
            diagnostics: vec![],
        },
        Err(e) if e.is_not_found() => {
            tracing::info!("{} {} no longer exists, removing from state", what, state_id(&current_state));
            ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
            }
        }
        Err(e) => ReadResourceResponse {
            new_state: Some(current_state),
            diagnostics: vec![Diagnostic::error(
                format!("Failed to read {}", what),
                format!("API error: {}", e),
            )],
        },
    }
}

/// Delete treats an already-missing object as deleted
pub(crate) fn delete_diagnostics(result: Result<(), ApiError>, what: &str) -> Vec<Diagnostic> {
    match result {
        Ok(()) => vec![],
        Err(e) if e.is_not_found() => {
            tracing::debug!("{} already deleted", what);
            vec![]
        }
        Err(e) => vec![Diagnostic::error(
            format!("Failed to delete {}", what),
            format!("API error: {}", e),
        )],
    }
}
