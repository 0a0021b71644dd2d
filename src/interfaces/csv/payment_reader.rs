use crate::error::{PaymentError, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::Read;

/// One raw input row, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRow {
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub amount: String,
}

impl PaymentRow {
    /// The row as a request body, so it goes through the same validation as
    /// the JSON commands.
    pub fn to_request(&self) -> Value {
        json!({
            "card_number": self.card_number,
            "expiry_date": self.expiry_date,
            "cvv": self.cvv,
            "amount": self.amount,
        })
    }

    pub fn card_suffix(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().collect();
        digits[digits.len().saturating_sub(4)..].iter().collect()
    }
}

/// Reads payment rows from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<PaymentRow>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct PaymentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentReader<R> {
    /// Creates a new `PaymentReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes rows.
    pub fn payments(self) -> impl Iterator<Item = Result<PaymentRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
