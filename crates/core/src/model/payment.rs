use std::time::Duration;

use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransactionIdError {
    #[error("transaction id must be at least {min} characters")]
    TooShort { min: usize },
}

/// Parameters of the manual mobile-money payment flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSettings {
    pub fee_label: String,
    pub amount: u32,
    pub momo_number: String,
    pub min_transaction_id_len: usize,
    /// Fixed wait before a submitted transaction id activates the account.
    pub verification_delay: Duration,
    pub access_years: u32,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            fee_label: "500 F".to_owned(),
            amount: 500,
            momo_number: "0151112644".to_owned(),
            min_transaction_id_len: 5,
            verification_delay: Duration::from_millis(2_500),
            access_years: 1,
        }
    }
}

impl PaymentSettings {
    /// USSD code the user dials to pay.
    #[must_use]
    pub fn ussd_code(&self) -> String {
        format!(
            "*880*1*1*{momo}*{momo}*{amount}*1#",
            momo = self.momo_number,
            amount = self.amount
        )
    }

    /// `tel:` link that pre-fills the USSD code.
    #[must_use]
    pub fn ussd_tel_uri(&self) -> String {
        let encoded: String = form_urlencoded::byte_serialize(self.ussd_code().as_bytes()).collect();
        format!("tel:{encoded}")
    }

    /// Trims the id and checks its length. Nothing else is verified.
    ///
    /// # Errors
    ///
    /// Returns `TransactionIdError::TooShort` below the configured minimum.
    pub fn check_transaction_id<'a>(&self, raw: &'a str) -> Result<&'a str, TransactionIdError> {
        let id = raw.trim();
        if id.chars().count() < self.min_transaction_id_len {
            return Err(TransactionIdError::TooShort {
                min: self.min_transaction_id_len,
            });
        }
        Ok(id)
    }
}
