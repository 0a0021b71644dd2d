//! Turns untrusted JSON request bodies into typed payment inputs.
//!
//! Every problem found in a body is collected, then reported together in a
//! single `ValidationFailure`.

use crate::domain::payment::{Amount, CaptureData, PaymentData, RefundData};
use crate::error::{PaymentError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static CARD_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12,19}$").expect("card number pattern compiles"));
static EXPIRY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("expiry date pattern compiles")
});
static CVV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3,4}$").expect("cvv pattern compiles"));

pub const INVALID_JSON: &str = "The payment data is invalid JSON.";

pub fn payment_data(body: &Value) -> Result<PaymentData> {
    let mut fields = Fields::new(body, &["card_number", "expiry_date", "cvv", "amount"])?;
    let card_number = fields.text("card_number", Some((&*CARD_NUMBER, "must be 12 to 19 digits")));
    let expiry_date = fields.text("expiry_date", Some((&*EXPIRY_DATE, "must be in MM/YY format")));
    let cvv = fields.text("cvv", Some((&*CVV, "must be 3 or 4 digits")));
    let amount = fields.amount();
    fields.finish()?;

    let (Some(card_number), Some(expiry_date), Some(cvv), Some(amount)) =
        (card_number, expiry_date, cvv, amount)
    else {
        return Err(incomplete());
    };
    Ok(PaymentData {
        card_number,
        expiry_date,
        cvv,
        amount,
    })
}

pub fn capture_data(body: &Value) -> Result<CaptureData> {
    let mut fields = Fields::new(body, &["auth_token", "amount"])?;
    let auth_token = fields.text("auth_token", None);
    let amount = fields.amount();
    fields.finish()?;

    let (Some(auth_token), Some(amount)) = (auth_token, amount) else {
        return Err(incomplete());
    };
    Ok(CaptureData { auth_token, amount })
}

pub fn refund_data(body: &Value) -> Result<RefundData> {
    let mut fields = Fields::new(body, &["transaction_id", "amount"])?;
    let transaction_id = fields.text("transaction_id", None);
    let amount = fields.amount();
    fields.finish()?;

    let (Some(transaction_id), Some(amount)) = (transaction_id, amount) else {
        return Err(incomplete());
    };
    Ok(RefundData {
        transaction_id,
        amount,
    })
}

fn incomplete() -> PaymentError {
    PaymentError::ValidationFailure(vec!["request is incomplete".to_string()])
}

/// The fields of one request object and the violations found so far.
struct Fields<'a> {
    object: &'a Map<String, Value>,
    violations: Vec<String>,
}

impl<'a> Fields<'a> {
    fn new(body: &'a Value, expected: &[&str]) -> Result<Self> {
        let Value::Object(object) = body else {
            return Err(PaymentError::ValidationFailure(vec![
                "request body must be a JSON object".to_string(),
            ]));
        };
        let mut violations: Vec<String> = object
            .keys()
            .filter(|key| !expected.contains(&key.as_str()))
            .map(|key| format!("{key}: unexpected field"))
            .collect();
        violations.sort();
        Ok(Self { object, violations })
    }

    fn reject(&mut self, field: &str, problem: &str) {
        self.violations.push(format!("{field}: {problem}"));
    }

    fn text(&mut self, field: &str, pattern: Option<(&Regex, &str)>) -> Option<String> {
        match self.object.get(field) {
            None | Some(Value::Null) => {
                self.reject(field, "is required");
                None
            }
            Some(Value::String(value)) if value.trim().is_empty() => {
                self.reject(field, "must not be blank");
                None
            }
            Some(Value::String(value)) => match pattern {
                Some((regex, problem)) if !regex.is_match(value) => {
                    self.reject(field, problem);
                    None
                }
                _ => Some(value.clone()),
            },
            Some(_) => {
                self.reject(field, "must be a string");
                None
            }
        }
    }

    /// Accepts a JSON integer or a string of digits.
    fn amount(&mut self) -> Option<Amount> {
        let raw = match self.object.get("amount") {
            None | Some(Value::Null) => {
                self.reject("amount", "is required");
                return None;
            }
            Some(Value::Number(number)) => number.as_i64(),
            Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
            Some(_) => None,
        };
        match raw.map(Amount::new) {
            Some(Ok(amount)) => Some(amount),
            _ => {
                self.reject("amount", "must be a positive integer");
                None
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(PaymentError::ValidationFailure(self.violations))
        }
    }
}
