use std::sync::{Arc, LazyLock};

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand_core::OsRng;
use tracing::{error, warn};

use parlor_db::models::UserRow;
use parlor_db::{Database, DbError};

/// User identity records. Passwords are hashed with Argon2id before they
/// reach the database; nothing else writes to the users table.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<Database>,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.db.get_user_by_username(username)
    }

    /// Hash `password` and persist a new user. Fails closed: a hashing error
    /// aborts the insert.
    pub fn create(&self, username: &str, password: &str) -> Result<UserRow, DbError> {
        let password_hash = hash_password(password)?;
        self.db.create_user(username, &password_hash)
    }

    pub fn verify_password(&self, user: &UserRow, password: &str) -> bool {
        verify_against(&user.password, password, &user.id)
    }

    /// Run a full Argon2 verification against a throwaway hash and report
    /// failure, so a login for an unknown user costs the same as a wrong
    /// password.
    pub fn verify_unknown_user(&self, password: &str) -> bool {
        verify_against(&DUMMY_HASH, password, "<unknown>");
        false
    }
}

/// Argon2id hash of a random-salted constant, computed on first use.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("parlor-unknown-user").unwrap_or_else(|e| {
        error!("Failed to build dummy password hash: {:#}", e);
        String::new()
    })
});

#[cfg(test)]
thread_local! {
    static VERIFICATIONS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

fn verify_against(stored_hash: &str, password: &str, user_id: &str) -> bool {
    #[cfg(test)]
    VERIFICATIONS.with(|n| n.set(n.get() + 1));

    let parsed_hash = match PasswordHash::new(stored_hash) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Unparseable password hash for user {}: {}", user_id, e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Number of Argon2 verifications attempted on the current thread.
#[cfg(test)]
pub(crate) fn verifications_on_this_thread() -> usize {
    VERIFICATIONS.with(|n| n.get())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn stored_password_is_hashed() {
        let store = store();
        let user = store.create("alice", "hunter2").unwrap();

        assert_ne!(user.password, "hunter2");
        assert!(user.password.starts_with("$argon2id$"));
        assert!(store.verify_password(&user, "hunter2"));
        assert!(!store.verify_password(&user, "hunter3"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let store = store();
        let a = store.create("alice", "same").unwrap();
        let b = store.create("bob", "same").unwrap();
        assert_ne!(a.password, b.password);
    }

    #[test]
    fn duplicate_create_fails() {
        let store = store();
        store.create("alice", "pw").unwrap();
        assert!(matches!(
            store.create("alice", "other"),
            Err(DbError::DuplicateUsername)
        ));
    }

    #[test]
    fn dummy_hash_is_a_real_argon2id_hash() {
        let parsed = PasswordHash::new(&DUMMY_HASH).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(!store().verify_unknown_user("parlor-unknown-user"));
    }

    #[test]
    fn corrupt_hash_never_verifies() {
        let store = store();
        let mut user = store.create("alice", "pw").unwrap();
        user.password = "not-a-phc-string".into();
        assert!(!store.verify_password(&user, "pw"));
    }
}
