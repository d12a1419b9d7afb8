use std::sync::Arc;

use qcm_core::model::{PaymentSettings, User, UserId};
use qcm_core::time::Clock;
use storage::UserStore;
use storage::repository::StorageError;
use tokio::task::JoinHandle;

use crate::error::PaymentError;

/// What the user needs to pay by mobile money.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInstructions {
    pub fee_label: String,
    pub momo_number: String,
    pub ussd_code: String,
    pub ussd_tel_uri: String,
}

/// An activation that fires once the verification delay has elapsed.
///
/// Dropping this handle does not cancel the activation.
#[derive(Debug)]
pub struct PendingActivation {
    handle: JoinHandle<Result<User, PaymentError>>,
}

impl PendingActivation {
    /// Wait for the activation and return the updated user.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::UserNotFound` if the account vanished before the
    /// delay elapsed, `PaymentError::Storage`, or `PaymentError::Interrupted`
    /// if the runtime shut the task down.
    pub async fn wait(self) -> Result<User, PaymentError> {
        self.handle
            .await
            .map_err(|e| PaymentError::Interrupted(e.to_string()))?
    }
}

/// Manual mobile-money flow: the user pays out of band, then submits the
/// transaction id, which is accepted without verification after a fixed delay.
#[derive(Clone)]
pub struct PaymentService {
    clock: Clock,
    settings: Arc<PaymentSettings>,
    users: UserStore,
}

impl PaymentService {
    #[must_use]
    pub fn new(clock: Clock, settings: Arc<PaymentSettings>, users: UserStore) -> Self {
        Self {
            clock,
            settings,
            users,
        }
    }

    #[must_use]
    pub fn instructions(&self) -> PaymentInstructions {
        PaymentInstructions {
            fee_label: self.settings.fee_label.clone(),
            momo_number: self.settings.momo_number.clone(),
            ussd_code: self.settings.ussd_code(),
            ussd_tel_uri: self.settings.ussd_tel_uri(),
        }
    }

    /// Accept a transaction id and schedule the account activation.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidTransactionId` right away if the id is too short.
    pub fn submit_transaction(
        &self,
        user_id: &UserId,
        transaction_id: &str,
    ) -> Result<PendingActivation, PaymentError> {
        let transaction_id = self.settings.check_transaction_id(transaction_id)?.to_owned();
        let user_id = user_id.clone();
        let svc = self.clone();

        tracing::info!(user = %user_id, delay = ?self.settings.verification_delay, "payment submitted");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(svc.settings.verification_delay).await;
            svc.activate(&user_id, &transaction_id).await
        });
        Ok(PendingActivation { handle })
    }

    async fn activate(&self, user_id: &UserId, transaction_id: &str) -> Result<User, PaymentError> {
        let mut user = self
            .users
            .find(user_id)
            .await
            .ok_or(PaymentError::UserNotFound)?;
        let now = self.clock.now();
        user.activate(transaction_id, now, self.settings.access_years);
        match self.users.update(&user).await {
            Ok(()) => {}
            Err(StorageError::NotFound) => return Err(PaymentError::UserNotFound),
            Err(err) => return Err(err.into()),
        }
        tracing::info!(user = %user.id, expires_at = ?user.expires_at, "access activated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcm_core::model::TransactionIdError;
    use qcm_core::time::fixed_now;
    use std::time::Duration;
    use storage::Storage;

    async fn setup() -> (Storage, PaymentService, User) {
        let storage = Storage::in_memory();
        let user = User::register("a@b.c", "pw").unwrap();
        storage.users.insert(user.clone()).await.unwrap();
        let svc = PaymentService::new(
            Clock::fixed(fixed_now()),
            Arc::new(PaymentSettings::default()),
            storage.users.clone(),
        );
        (storage, svc, user)
    }

    #[tokio::test]
    async fn short_transaction_id_is_rejected_immediately() {
        let (storage, svc, user) = setup().await;
        let err = svc.submit_transaction(&user.id, "1234").unwrap_err();
        assert!(matches!(
            err,
            PaymentError::InvalidTransactionId(TransactionIdError::TooShort { min: 5 })
        ));
        assert!(!storage.users.find(&user.id).await.unwrap().paid);
    }

    #[tokio::test(start_paused = true)]
    async fn activation_fires_after_fixed_delay() {
        let (storage, svc, user) = setup().await;
        let start = tokio::time::Instant::now();
        let pending = svc.submit_transaction(&user.id, " 17283904 ").unwrap();

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(!storage.users.find(&user.id).await.unwrap().paid);

        let activated = pending.wait().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(2_500));
        assert!(activated.has_access(fixed_now()));
        assert_eq!(activated.transaction_id.as_deref(), Some("17283904"));
        assert_eq!(storage.users.find(&user.id).await, Some(activated));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_does_not_cancel() {
        let (storage, svc, user) = setup().await;
        drop(svc.submit_transaction(&user.id, "TX-000001").unwrap());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(storage.users.find(&user.id).await.unwrap().paid);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_user_fails_at_fire_time() {
        let (_storage, svc, _user) = setup().await;
        let pending = svc
            .submit_transaction(&UserId::new("ghost"), "TX-000001")
            .unwrap();
        assert!(matches!(pending.wait().await, Err(PaymentError::UserNotFound)));
    }

    #[test]
    fn instructions_expose_ussd_code() {
        let svc = PaymentService::new(
            Clock::fixed(fixed_now()),
            Arc::new(PaymentSettings::default()),
            Storage::in_memory().users,
        );
        let info = svc.instructions();
        assert_eq!(info.fee_label, "500 F");
        assert!(info.ussd_tel_uri.starts_with("tel:*880*"));
    }
}
