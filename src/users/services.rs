use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    auth::{validation::is_valid_email, IdentifierHasher, PasswordError, SecretHasher},
    config::AppConfig,
    db::{ConnectionManager, DbError},
    users::{
        dto::{LoginStatus, RegisterStatus, RoleStatus},
        repo::UserStore,
        repo_types::{InsertOutcome, User},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Registration, lookup and login over a [`UserStore`].
///
/// Accounts are keyed by the identifier hash of the email, never the email
/// itself. Domain outcomes are returned as status values; only storage and
/// hashing faults surface as [`DirectoryError`].
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    identifiers: IdentifierHasher,
    secrets: SecretHasher,
    // hash of a random secret, verified against when no account matches
    dummy_hash: Arc<OnceCell<String>>,
}

impl UserDirectory {
    pub fn new(
        store: Arc<dyn UserStore>,
        identifiers: IdentifierHasher,
        secrets: SecretHasher,
    ) -> Self {
        Self {
            store,
            identifiers,
            secrets,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Directory backed by the SQL store, keyed and tuned from `config`.
    pub fn from_config(manager: ConnectionManager, config: &AppConfig) -> Result<Self, PasswordError> {
        Ok(Self::new(
            Arc::new(manager),
            IdentifierHasher::new(&config.identifier_key),
            SecretHasher::new(&config.hashing)?,
        ))
    }

    pub fn hash_identifier(&self, email: &str) -> String {
        self.identifiers.digest(email)
    }

    pub async fn hash_secret(&self, password: &str) -> Result<String, PasswordError> {
        self.secrets.hash(password).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_identifier_hash(
        &self,
        identifier_hash: &str,
    ) -> Result<Option<User>, DirectoryError> {
        Ok(self.store.find_by_username(identifier_hash).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<User>, DirectoryError> {
        Ok(self.store.list_all().await?)
    }

    /// Never fails: storage and hashing errors are logged and reported as
    /// [`RegisterStatus::Failed`].
    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> RegisterStatus {
        match self.try_register(email, password).await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "registration failed");
                RegisterStatus::Failed
            }
        }
    }

    async fn try_register(&self, email: &str, password: &str) -> Result<RegisterStatus, DirectoryError> {
        if !is_valid_email(email.trim()) {
            warn!("registration with invalid email");
            return Ok(RegisterStatus::InvalidEmail);
        }

        let identifier_hash = self.hash_identifier(email);
        if self.store.find_by_username(&identifier_hash).await?.is_some() {
            warn!("email already registered");
            return Ok(RegisterStatus::AlreadyExists);
        }

        let secret_hash = self.hash_secret(password).await?;
        match self.store.insert(&identifier_hash, &secret_hash).await? {
            InsertOutcome::Inserted(user) => {
                info!(user_id = user.id, "user registered");
                Ok(RegisterStatus::Registered)
            }
            InsertOutcome::Duplicate => {
                // lost a race with a concurrent registration of the same email
                warn!("email registered concurrently");
                Ok(RegisterStatus::AlreadyExists)
            }
        }
    }

    /// `Ok(false)` when no account matches; errors only on storage or hash faults.
    ///
    /// An unknown identifier still pays for one Argon2 verification, so the
    /// response time does not tell registered emails apart.
    #[instrument(skip(self, password))]
    pub async fn verify_credential(
        &self,
        identifier_hash: &str,
        password: &str,
    ) -> Result<bool, DirectoryError> {
        let Some(user) = self.store.find_by_username(identifier_hash).await? else {
            debug!("no account for identifier");
            let dummy = self.dummy_hash().await?;
            let _ = self.secrets.verify(password, dummy).await?;
            return Ok(false);
        };
        Ok(self.secrets.verify(password, &user.password_hash).await?)
    }

    /// Built on first use with the configured work factor.
    async fn dummy_hash(&self) -> Result<&str, PasswordError> {
        self.dummy_hash
            .get_or_try_init(|| async {
                let secret: [u8; 32] = rand::random();
                self.secrets.hash(&hex::encode(secret)).await
            })
            .await
            .map(String::as_str)
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginStatus, DirectoryError> {
        let identifier_hash = self.hash_identifier(email);
        if self.verify_credential(&identifier_hash, password).await? {
            info!("user logged in");
            Ok(LoginStatus::LoginSuccessful)
        } else {
            warn!("login invalid credentials");
            Ok(LoginStatus::InvalidCredentials)
        }
    }

    pub async fn fetch_secret_hash(&self, identifier_hash: &str) -> Result<Option<String>, DirectoryError> {
        Ok(self
            .store
            .find_by_username(identifier_hash)
            .await?
            .map(|u| u.password_hash))
    }

    /// Sets `target.role` if `acting` is an admin. The change lives only on
    /// `target`; it is not written to storage.
    pub fn assign_role(&self, acting: &User, target: &mut User, role: &str) -> RoleStatus {
        if !acting.is_admin() {
            warn!(acting_id = acting.id, target_id = target.id, "role change without permission");
            return RoleStatus::NoPermission;
        }
        target.role = Some(role.to_string());
        debug!(acting_id = acting.id, target_id = target.id, role, "role assigned in memory");
        RoleStatus::AssignedInMemory
    }
}
