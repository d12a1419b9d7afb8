use std::sync::Arc;

use qcm_core::model::{User, UserId};
use serde_json::Value;

use crate::repository::{
    InMemoryStore, KeyValueStore, StorageError, WriteLock, decode_entry, encode_entry, keys,
    load_json, save_json, try_load_json,
};

/// Registered accounts, stored as one list.
///
/// Records that do not decode are skipped on read and kept as stored on write.
#[derive(Clone)]
pub struct UserStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: WriteLock,
}

impl UserStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: WriteLock::default(),
        }
    }

    /// All readable accounts. Empty when nothing readable is stored.
    pub async fn list(&self) -> Vec<User> {
        let entries: Vec<Value> = load_json(self.kv.as_ref(), keys::USERS).await;
        entries
            .iter()
            .filter_map(|entry| decode_entry(keys::USERS, entry))
            .collect()
    }

    pub async fn find(&self, id: &UserId) -> Option<User> {
        self.list().await.into_iter().find(|u| &u.id == id)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim();
        self.list().await.into_iter().find(|u| u.email == email)
    }

    /// Append a new account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the email or id is taken, or the
    /// read or write error.
    pub async fn insert(&self, user: User) -> Result<(), StorageError> {
        let entry = encode_entry(&user)?;
        let _guard = self.write_lock.lock().await;
        let mut entries: Vec<Value> = try_load_json(self.kv.as_ref(), keys::USERS).await?;
        let taken = entries
            .iter()
            .filter_map(|e| decode_entry::<User>(keys::USERS, e))
            .any(|u| u.email == user.email || u.id == user.id);
        if taken {
            return Err(StorageError::Conflict);
        }
        entries.push(entry);
        save_json(self.kv.as_ref(), keys::USERS, &entries).await
    }

    /// Replace the stored record with the same id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such account exists, or the
    /// read or write error.
    pub async fn update(&self, user: &User) -> Result<(), StorageError> {
        let entry = encode_entry(user)?;
        let _guard = self.write_lock.lock().await;
        let mut entries: Vec<Value> = try_load_json(self.kv.as_ref(), keys::USERS).await?;
        let slot = entries
            .iter_mut()
            .find(|e| decode_entry::<User>(keys::USERS, e).is_some_and(|u| u.id == user.id))
            .ok_or(StorageError::NotFound)?;
        *slot = entry;
        save_json(self.kv.as_ref(), keys::USERS, &entries).await
    }
}

/// Which user is signed in.
///
/// A remembered sign-in is kept in the durable store; otherwise it lives
/// only as long as this process.
#[derive(Clone)]
pub struct AuthSessionStore {
    durable: Arc<dyn KeyValueStore>,
    session: InMemoryStore,
}

impl AuthSessionStore {
    #[must_use]
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self {
            durable,
            session: InMemoryStore::new(),
        }
    }

    /// Session value first, then the remembered one.
    pub async fn current(&self) -> Option<UserId> {
        for store in [&self.session as &dyn KeyValueStore, self.durable.as_ref()] {
            match store.get_raw(keys::AUTH).await {
                Ok(Some(raw)) if !raw.trim().is_empty() => return Some(UserId::new(raw.trim())),
                Ok(_) => {}
                Err(err) => tracing::warn!(%err, "could not read signed-in user"),
            }
        }
        None
    }

    /// # Errors
    ///
    /// Returns `StorageError` if either store cannot be written.
    pub async fn sign_in(&self, user_id: &UserId, remember: bool) -> Result<(), StorageError> {
        let value = user_id.as_str().to_owned();
        if remember {
            self.durable.set_raw(keys::AUTH, value).await?;
            self.session.remove(keys::AUTH).await
        } else {
            self.session.set_raw(keys::AUTH, value).await?;
            self.durable.remove(keys::AUTH).await
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if either store cannot be written.
    pub async fn sign_out(&self) -> Result<(), StorageError> {
        self.session.remove(keys::AUTH).await?;
        self.durable.remove(keys::AUTH).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::FlakyStore;

    fn user(email: &str) -> User {
        User::register(email, "pw").unwrap()
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = UserStore::new(Arc::new(InMemoryStore::new()));
        store.insert(user("a@b.c")).await.unwrap();
        let err = store.insert(user("a@b.c")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_record() {
        let store = UserStore::new(Arc::new(InMemoryStore::new()));
        let mut u = user("a@b.c");
        store.insert(u.clone()).await.unwrap();

        u.paid = true;
        store.update(&u).await.unwrap();
        assert!(store.find(&u.id).await.unwrap().paid);
        assert!(store.find_by_email(" a@b.c").await.is_some());
    }

    #[tokio::test]
    async fn update_of_unknown_user_is_not_found() {
        let store = UserStore::new(Arc::new(InMemoryStore::new()));
        let err = store.update(&user("x@y.z")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn failed_read_aborts_insert_and_keeps_accounts() {
        let kv = Arc::new(FlakyStore::default());
        let store = UserStore::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>);
        let first = user("a@b.c");
        store.insert(first.clone()).await.unwrap();

        kv.fail_next_reads(1);
        assert!(store.insert(user("x@y.z")).await.is_err());
        kv.fail_next_reads(1);
        assert!(store.update(&first).await.is_err());
        assert_eq!(store.list().await, vec![first]);
    }

    #[tokio::test]
    async fn unreadable_record_is_kept_on_write() {
        let kv = Arc::new(InMemoryStore::new());
        kv.set_raw(keys::USERS, r#"[{"id":"legacy","paid":"maybe"}]"#.into())
            .await
            .unwrap();
        let store = UserStore::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>);
        assert!(store.list().await.is_empty());

        store.insert(user("a@b.c")).await.unwrap();
        assert_eq!(store.list().await.len(), 1);
        let raw = kv.get_raw(keys::USERS).await.unwrap().unwrap();
        assert!(raw.contains(r#""paid":"maybe""#));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_and_updates_lose_nothing() {
        let store = UserStore::new(Arc::new(InMemoryStore::new()));
        let mut paid = user("paid@b.c");
        store.insert(paid.clone()).await.unwrap();
        paid.paid = true;

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let paid = paid.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    store.update(&paid).await
                } else {
                    store.insert(user(&format!("u{i}@b.c"))).await
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list().await.len(), 9);
        assert!(store.find(&paid.id).await.unwrap().paid);
    }

    #[tokio::test]
    async fn remembered_sign_in_survives_new_session() {
        let durable: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let auth = AuthSessionStore::new(Arc::clone(&durable));
        let id = UserId::new("u1");
        auth.sign_in(&id, true).await.unwrap();

        let reopened = AuthSessionStore::new(durable);
        assert_eq!(reopened.current().await, Some(id));
    }

    #[tokio::test]
    async fn session_sign_in_is_forgotten_by_new_session() {
        let durable: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let auth = AuthSessionStore::new(Arc::clone(&durable));
        let id = UserId::new("u1");
        auth.sign_in(&id, false).await.unwrap();
        assert_eq!(auth.current().await, Some(id));

        let reopened = AuthSessionStore::new(durable);
        assert_eq!(reopened.current().await, None);
    }

    #[tokio::test]
    async fn sign_out_clears_both() {
        let auth = AuthSessionStore::new(Arc::new(InMemoryStore::new()));
        auth.sign_in(&UserId::new("u1"), true).await.unwrap();
        auth.sign_out().await.unwrap();
        assert_eq!(auth.current().await, None);
    }
}
