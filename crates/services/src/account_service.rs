use qcm_core::model::{AccessStatus, User, UserId};
use qcm_core::time::Clock;
use storage::repository::StorageError;
use storage::{AuthSessionStore, UserStore};

use crate::error::AccountError;

/// Registration, sign-in and the signed-in user's access status.
#[derive(Clone)]
pub struct AccountService {
    clock: Clock,
    users: UserStore,
    auth: AuthSessionStore,
}

impl AccountService {
    #[must_use]
    pub fn new(clock: Clock, users: UserStore, auth: AuthSessionStore) -> Self {
        Self { clock, users, auth }
    }

    /// Create an unpaid account and sign it in (remembered).
    ///
    /// # Errors
    ///
    /// Returns `AccountError::User` for blank fields, `AccountError::EmailTaken`,
    /// or `AccountError::Storage`.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let user = User::register(email, password)?;
        if self.users.find_by_email(&user.email).await.is_some() {
            return Err(AccountError::EmailTaken);
        }
        match self.users.insert(user.clone()).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => return Err(AccountError::EmailTaken),
            Err(err) => return Err(err.into()),
        }
        self.auth.sign_in(&user.id, true).await?;
        tracing::info!(user = %user.id, "registered account");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `AccountError::InvalidCredentials` on mismatch, or `AccountError::Storage`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<User, AccountError> {
        let user = self
            .users
            .find_by_email(email)
            .await
            .filter(|u| u.credentials_match(email, password))
            .ok_or(AccountError::InvalidCredentials)?;
        self.auth.sign_in(&user.id, remember).await?;
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `AccountError::Storage` if the session cannot be cleared.
    pub async fn logout(&self) -> Result<(), AccountError> {
        self.auth.sign_out().await?;
        Ok(())
    }

    /// The signed-in user, if the stored id still matches an account.
    pub async fn current_user(&self) -> Option<User> {
        let id = self.auth.current().await?;
        self.users.find(&id).await
    }

    /// # Errors
    ///
    /// Returns `AccountError::UserNotFound` for an unknown id.
    pub async fn access_status(&self, user_id: &UserId) -> Result<AccessStatus, AccountError> {
        let user = self
            .users
            .find(user_id)
            .await
            .ok_or(AccountError::UserNotFound)?;
        Ok(user.access_status(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcm_core::model::UserError;
    use qcm_core::time::fixed_clock;
    use storage::Storage;

    fn service(storage: &Storage) -> AccountService {
        AccountService::new(fixed_clock(), storage.users.clone(), storage.auth.clone())
    }

    #[tokio::test]
    async fn register_signs_in() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        let user = svc.register("a@b.c", "pw").await.unwrap();
        assert_eq!(svc.current_user().await, Some(user.clone()));
        assert_eq!(svc.access_status(&user.id).await.unwrap(), AccessStatus::Unpaid);
    }

    #[tokio::test]
    async fn register_rejects_taken_email_and_blank_fields() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        svc.register("a@b.c", "pw").await.unwrap();
        assert!(matches!(
            svc.register(" a@b.c ", "other").await,
            Err(AccountError::EmailTaken)
        ));
        assert!(matches!(
            svc.register("", "pw").await,
            Err(AccountError::User(UserError::EmptyEmail))
        ));
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        let user = svc.register("a@b.c", "pw").await.unwrap();
        svc.logout().await.unwrap();
        assert_eq!(svc.current_user().await, None);

        assert!(matches!(
            svc.login("a@b.c", "wrong", true).await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("x@y.z", "pw", true).await,
            Err(AccountError::InvalidCredentials)
        ));

        let logged = svc.login("a@b.c", "pw", false).await.unwrap();
        assert_eq!(logged.id, user.id);
        assert_eq!(svc.current_user().await.map(|u| u.id), Some(user.id));
    }
}
