//! Trigger interface: request in, exactly one terminal reply out.

use crate::{
    engine::{ScanEngine, DEFAULT_ACTOR},
    error::ReconError,
    scope::ScanScope,
    summary::ScanSummary,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub scope: Option<Vec<String>>,
    #[serde(default)]
    pub triggered_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerResponse {
    Completed(ScanSummary),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerReply {
    /// HTTP-style status code.
    pub status: u16,
    pub body: TriggerResponse,
}

impl TriggerReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn failure(status: u16, error: &ReconError) -> Self {
        Self {
            status,
            body: TriggerResponse::Failed {
                error: error.to_string(),
            },
        }
    }
}

pub fn status_for(error: &ReconError) -> u16 {
    match error {
        ReconError::InvalidScope { .. } => 400,
        ReconError::FeatureDisabled { .. } => 403,
        ReconError::ScanInProgress { .. } => 409,
        _ => 500,
    }
}

pub fn handle(engine: &ScanEngine, request: &ScanRequest) -> TriggerReply {
    handle_at(engine, request, Utc::now())
}

pub fn handle_at(engine: &ScanEngine, request: &ScanRequest, now: DateTime<Utc>) -> TriggerReply {
    let scope = match ScanScope::from_tags(request.scope.as_deref().unwrap_or_default()) {
        Ok(scope) => scope,
        Err(e) => return TriggerReply::failure(status_for(&e), &e),
    };
    let actor = request
        .triggered_by
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(DEFAULT_ACTOR);

    match engine.run_scan_at(&scope, actor, now) {
        Ok(summary) => TriggerReply {
            status: 200,
            body: TriggerResponse::Completed(summary),
        },
        Err(e) => TriggerReply::failure(status_for(&e), &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fields_are_optional() {
        let req: ScanRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, ScanRequest::default());
        let req: ScanRequest =
            serde_json::from_str(r#"{"scope":["fees"],"triggered_by":"ops"}"#).unwrap();
        assert_eq!(req.scope, Some(vec!["fees".to_string()]));
    }

    #[test]
    fn failure_serializes_as_bare_error_object() {
        let reply = TriggerReply::failure(403, &ReconError::FeatureDisabled { flag: "f".into() });
        let json = serde_json::to_value(&reply.body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "error": "Reconciliation engine is disabled (flag 'f')" })
        );
        assert!(!reply.is_success());
    }

    #[test]
    fn statuses_by_error_kind() {
        assert_eq!(status_for(&ReconError::InvalidScope { tag: "x".into() }), 400);
        assert_eq!(status_for(&ReconError::ScanInProgress { scan_id: "s".into() }), 409);
        assert_eq!(
            status_for(&ReconError::Orchestrator {
                scan_id: "s".into(),
                message: "m".into()
            }),
            500
        );
    }
}
