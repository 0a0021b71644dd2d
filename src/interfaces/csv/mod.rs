//! CSV batch mode: every input row is authorized, captured and refunded in
//! turn, and one outcome row is written per input row.

pub mod outcome_writer;
pub mod payment_reader;

use crate::application::orchestrator::PaymentOrchestrator;
use crate::domain::payment::{CaptureData, RefundData};
use crate::error::Result;
use crate::interfaces::validation;
use outcome_writer::{BatchOutcome, BatchStatus, OutcomeWriter};
use payment_reader::{PaymentReader, PaymentRow};
use std::io::{Read, Write};
use tracing::{info, warn};

/// Counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows: usize,
    pub refunded: usize,
}

/// Runs every row of `source` through the full payment lifecycle.
///
/// Rows are processed sequentially in input order. A failing row never stops
/// the batch; only I/O errors on `sink` do.
pub async fn process_batch<R: Read, W: Write>(
    orchestrator: &PaymentOrchestrator,
    source: R,
    sink: W,
) -> Result<BatchSummary> {
    let mut writer = OutcomeWriter::new(sink);
    let mut summary = BatchSummary::default();

    for row in PaymentReader::new(source).payments() {
        let outcome = match row {
            Ok(row) => process_row(orchestrator, row).await,
            Err(e) => {
                warn!(error = %e, "Error reading payment row");
                BatchOutcome::new("").failed(BatchStatus::Invalid, &e)
            }
        };
        summary.rows += 1;
        if outcome.status == BatchStatus::Refunded {
            summary.refunded += 1;
        }
        writer.write_outcome(&outcome)?;
    }
    writer.flush()?;

    info!(rows = summary.rows, refunded = summary.refunded, "Batch finished");
    Ok(summary)
}

async fn process_row(orchestrator: &PaymentOrchestrator, row: PaymentRow) -> BatchOutcome {
    let mut outcome = BatchOutcome::new(row.card_suffix());

    let payment = match validation::payment_data(&row.to_request()) {
        Ok(payment) => payment,
        Err(e) => return outcome.failed(BatchStatus::Invalid, &e),
    };
    let amount = payment.amount;

    let auth_token = match orchestrator.authorize(payment).await {
        Ok(auth_token) => auth_token,
        Err(e) => return outcome.failed(BatchStatus::AuthorizationFailed, &e),
    };
    outcome.auth_token = Some(auth_token.clone());

    let transaction_id = match orchestrator
        .capture(CaptureData { auth_token, amount })
        .await
    {
        Ok(transaction_id) => transaction_id,
        Err(e) => return outcome.failed(BatchStatus::CaptureFailed, &e),
    };
    outcome.transaction_id = Some(transaction_id.clone());

    match orchestrator
        .refund(RefundData {
            transaction_id,
            amount,
        })
        .await
    {
        Ok(refund_id) => {
            outcome.refund_id = Some(refund_id);
            outcome
        }
        Err(e) => outcome.failed(BatchStatus::RefundFailed, &e),
    }
}
