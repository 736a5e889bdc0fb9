//! Assignment Service
//!
//! Registers a new horse against an unassigned tracker. The unassigned pool is
//! never mutated locally; a successful assignment asks the poller to refetch.

use crate::api::types::{AssignHorseRequest, HorseDetails};
use crate::api::HerdApi;
use crate::error::{AppError, Result};
use crate::models::HorseStatus;
use crate::poller::RefreshHandle;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Operator input for an assignment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentForm {
    pub device_id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status: Option<HorseStatus>,
}

/// Result of an assignment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub success: bool,
    pub device_id: String,
    pub message: String,
    /// Issuance number of the refresh cycle started afterwards, if any
    pub refresh_sequence: Option<u64>,
}

/// Assignment service for business logic
pub struct AssignmentService;

impl AssignmentService {
    /// Validate the form, POST it and trigger a refresh on success
    pub async fn assign(
        api: &dyn HerdApi,
        refresh: Option<&RefreshHandle>,
        form: AssignmentForm,
    ) -> Result<AssignmentResult> {
        let request = Self::validate(form)?;
        info!(
            "AssignmentService::assign - device {} -> {}",
            request.device_id, request.horse_details.name
        );

        if let Err(e) = api.assign_horse(&request).await {
            error!("Assignment of device {} failed: {}", request.device_id, e);
            return Err(AppError::Assignment(format!(
                "could not assign device {}: {}",
                request.device_id, e
            )));
        }

        let refresh_sequence = refresh.and_then(RefreshHandle::refresh_now);

        Ok(AssignmentResult {
            success: true,
            message: format!(
                "Assigned {} to device {}",
                request.horse_details.name, request.device_id
            ),
            device_id: request.device_id,
            refresh_sequence,
        })
    }

    /// Build the request body; no request is issued for an invalid form
    pub fn validate(form: AssignmentForm) -> Result<AssignHorseRequest> {
        let device_id = form.device_id.trim();
        if device_id.is_empty() {
            return Err(AppError::Validation("device id is required".to_string()));
        }
        let name = form.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("horse name is required".to_string()));
        }

        Ok(AssignHorseRequest {
            device_id: device_id.to_string(),
            horse_details: HorseDetails {
                name: name.to_string(),
                location: form.location.trim().to_string(),
                status: form.status.unwrap_or_default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedApi;
    use crate::error::FetchError;
    use crate::poller::TelemetryPoller;

    fn form(device_id: &str, name: &str) -> AssignmentForm {
        AssignmentForm {
            device_id: device_id.to_string(),
            name: name.to_string(),
            ..AssignmentForm::default()
        }
    }

    #[test]
    fn test_validate_trims_and_defaults_status() {
        let request = AssignmentService::validate(AssignmentForm {
            device_id: " trk-7 ".to_string(),
            name: " Comet ".to_string(),
            location: "Paddock B ".to_string(),
            status: None,
        })
        .unwrap();

        assert_eq!(request.device_id, "trk-7");
        assert_eq!(request.horse_details.name, "Comet");
        assert_eq!(request.horse_details.location, "Paddock B");
        assert_eq!(request.horse_details.status, HorseStatus::Normal);
    }

    #[tokio::test]
    async fn test_invalid_form_issues_no_request() {
        let api = ScriptedApi::new();

        let err = AssignmentService::assign(api.as_ref(), None, form("trk-1", "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = AssignmentService::assign(api.as_ref(), None, form("", "Comet"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(api.assigned.lock().is_empty());
    }

    #[tokio::test]
    async fn test_success_refreshes_failure_does_not() {
        let api = ScriptedApi::new();
        let poller = TelemetryPoller::new(api.clone(), None);
        let handle = poller.refresh_handle();

        api.push_assign_result(Err(FetchError::Http { status: 500 }));
        let err = AssignmentService::assign(api.as_ref(), Some(&handle), form("trk-1", "Comet"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Assignment(_)));

        let result = AssignmentService::assign(api.as_ref(), Some(&handle), form("trk-1", "Comet"))
            .await
            .unwrap();
        assert!(result.success);
        // the failed attempt issued no cycle
        assert_eq!(result.refresh_sequence, Some(1));
        assert_eq!(api.assigned.lock().len(), 2);
    }
}
