use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;
use crate::time::add_years;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("email is required")]
    EmptyEmail,

    #[error("password is required")]
    EmptyPassword,
}

//
// ─── ACCESS STATUS ─────────────────────────────────────────────────────────────
//

/// Where a user stands with respect to the paid access gate at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    /// Paid and not yet expired.
    Active { until: DateTime<Utc> },
    /// Paid once, but the access window has closed.
    Expired { at: DateTime<Utc> },
    Unpaid,
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// A registered account and its paid-access record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl User {
    /// Builds a fresh, unpaid account.
    ///
    /// # Errors
    ///
    /// Returns `UserError` if the email or password is blank.
    pub fn register(email: &str, password: &str) -> Result<Self, UserError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(UserError::EmptyEmail);
        }
        if password.is_empty() {
            return Err(UserError::EmptyPassword);
        }
        Ok(Self {
            id: UserId::generate(),
            email: email.to_owned(),
            password: password.to_owned(),
            paid: false,
            transaction_id: None,
            payment_date: None,
            expires_at: None,
        })
    }

    /// The access gate: paid, with an expiry strictly after `now`.
    #[must_use]
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        self.paid && self.expires_at.is_some_and(|until| until > now)
    }

    #[must_use]
    pub fn access_status(&self, now: DateTime<Utc>) -> AccessStatus {
        match (self.paid, self.expires_at) {
            (true, Some(until)) if until > now => AccessStatus::Active { until },
            (true, Some(at)) => AccessStatus::Expired { at },
            _ => AccessStatus::Unpaid,
        }
    }

    /// Marks the account paid for `years` starting at `now`.
    pub fn activate(&mut self, transaction_id: &str, now: DateTime<Utc>, years: u32) {
        self.paid = true;
        self.transaction_id = Some(transaction_id.to_owned());
        self.payment_date = Some(now);
        self.expires_at = Some(add_years(now, years));
    }

    #[must_use]
    pub fn credentials_match(&self, email: &str, password: &str) -> bool {
        self.email == email.trim() && self.password == password
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
