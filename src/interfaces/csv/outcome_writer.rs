use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::io::Write;

/// How far a batch row got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Refunded,
    AuthorizationFailed,
    CaptureFailed,
    RefundFailed,
    Invalid,
}

/// One output row: the identifiers issued so far and the final status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub card: String,
    pub auth_token: Option<String>,
    pub transaction_id: Option<String>,
    pub refund_id: Option<String>,
    pub status: BatchStatus,
    pub message: Option<String>,
}

impl BatchOutcome {
    pub fn new(card: impl Into<String>) -> Self {
        Self {
            card: card.into(),
            auth_token: None,
            transaction_id: None,
            refund_id: None,
            status: BatchStatus::Refunded,
            message: None,
        }
    }

    pub fn failed(mut self, status: BatchStatus, err: &PaymentError) -> Self {
        self.status = status;
        self.message = Some(err.to_string());
        self
    }
}

/// Writes batch outcomes as CSV.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_outcome(&mut self, outcome: &BatchOutcome) -> Result<()> {
        self.writer.serialize(outcome)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_header_and_empty_optionals() {
        let mut buffer = Vec::new();
        {
            let mut writer = OutcomeWriter::new(&mut buffer);
            let mut refunded = BatchOutcome::new("1111");
            refunded.auth_token = Some("pa1".to_string());
            refunded.transaction_id = Some("txa1".to_string());
            refunded.refund_id = Some("rfa1".to_string());
            writer.write_outcome(&refunded).unwrap();
            writer
                .write_outcome(&BatchOutcome::new("4444").failed(
                    BatchStatus::AuthorizationFailed,
                    &PaymentError::ValidationFailure(vec!["cvv: must be 3 or 4 digits".to_string()]),
                ))
                .unwrap();
            writer.flush().unwrap();
        }
        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "card,auth_token,transaction_id,refund_id,status,message",
                "1111,pa1,txa1,rfa1,refunded,",
                "4444,,,,authorization_failed,Validation failed: cvv: must be 3 or 4 digits",
            ]
        );
    }
}
