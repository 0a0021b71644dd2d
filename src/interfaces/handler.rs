use crate::application::orchestrator::PaymentOrchestrator;
use crate::domain::operation::Phase;
use crate::error::{ErrorKind, PaymentError, Result};
use crate::interfaces::validation::{self, INVALID_JSON};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

/// A transport-neutral reply: the status code and the JSON body to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status_code: u16,
    pub body: Value,
}

impl Response {
    fn success(phase: Phase, id: String) -> Self {
        let mut body = json!({ "status": "success" });
        body[success_key(phase)] = Value::String(id);
        Self {
            status_code: 200,
            body,
        }
    }

    fn failure(err: &PaymentError) -> Self {
        let message = match err {
            PaymentError::ValidationFailure(violations) => Value::from(violations.clone()),
            other if other.kind() == ErrorKind::ValidationFailure => {
                Value::from(vec![other.to_string()])
            }
            other => Value::String(other.to_string()),
        };
        Self {
            status_code: err.http_status_code(),
            body: json!({ "status": "error", "message": message }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// The body field carrying the identifier a phase produces.
pub fn success_key(phase: Phase) -> &'static str {
    match phase {
        Phase::Authorization => "auth_token",
        Phase::Capture => "transaction_id",
        Phase::Refund => "refund_id",
    }
}

/// Runs one request body through validation and the given phase.
pub async fn handle(orchestrator: &PaymentOrchestrator, phase: Phase, body: &str) -> Response {
    match dispatch(orchestrator, phase, body).await {
        Ok(id) => {
            info!(phase = %phase, "Transaction successful");
            Response::success(phase, id)
        }
        Err(err) => {
            if err.kind() == ErrorKind::ValidationFailure {
                warn!(phase = %phase, error = %err, "Invalid payment request");
            } else {
                error!(
                    phase = %phase,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Transaction failed"
                );
            }
            Response::failure(&err)
        }
    }
}

async fn dispatch(orchestrator: &PaymentOrchestrator, phase: Phase, body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| PaymentError::ValidationFailure(vec![INVALID_JSON.to_string()]))?;
    match phase {
        Phase::Authorization => {
            orchestrator
                .authorize(validation::payment_data(&value)?)
                .await
        }
        Phase::Capture => orchestrator.capture(validation::capture_data(&value)?).await,
        Phase::Refund => orchestrator.refund(validation::refund_data(&value)?).await,
    }
}
