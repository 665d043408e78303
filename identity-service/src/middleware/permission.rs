use std::sync::Arc;

use service_core::axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

use crate::models::Principal;
use crate::services::{Decision, DenyReason, PermissionEvaluator};

/// State for [`authorize_middleware`]: the evaluator plus the
/// `resource.action` a route requires.
#[derive(Clone)]
pub struct PermissionGate {
    evaluator: PermissionEvaluator,
    required: Arc<str>,
}

impl PermissionGate {
    pub fn new(evaluator: PermissionEvaluator, required: &str) -> Self {
        Self {
            evaluator,
            required: Arc::from(required),
        }
    }

    pub fn required(&self) -> &str {
        &self.required
    }
}

/// Must run after `auth_middleware`. Never writes.
pub async fn authorize_middleware(
    State(gate): State<PermissionGate>,
    req: Request,
    next: Next,
) -> Response {
    let Some(principal) = req.extensions().get::<Principal>().cloned() else {
        tracing::error!(permission = gate.required(), "Authorization gate reached without a principal");
        return AppError::Unauthorized(anyhow::anyhow!("Missing authentication context"))
            .into_response();
    };

    match gate.evaluator.allowed(&principal, gate.required()).await {
        Ok(Decision::Allow) => next.run(req).await,
        Ok(Decision::Deny(DenyReason::ProfileNotFound)) => {
            AppError::Forbidden(anyhow::anyhow!("Could not load staff profile")).into_response()
        }
        Ok(Decision::Deny(_)) => {
            AppError::Forbidden(anyhow::anyhow!("Insufficient permissions")).into_response()
        }
        Err(e) => {
            tracing::error!(permission = gate.required(), error = %e, "Permission evaluation failed");
            AppError::from(e).into_response()
        }
    }
}
