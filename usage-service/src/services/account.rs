use std::sync::Arc;

use super::metrics::REGISTRATIONS_TOTAL;
use crate::{
    dtos::{
        AdminDashboardResponse, AdminUserRow, LoginResponse, RegisterResponse,
        UserDashboardResponse,
    },
    models::{User, ADMIN_USERNAME, NOT_AVAILABLE},
    services::{Clock, ServiceError, UserStore},
    utils::{hash_password, verify_password, Password, PasswordHashString},
};

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<RegisterResponse, ServiceError> {
        if self.store.find_by_username(username).await?.is_some() {
            return Err(ServiceError::DuplicateUsername);
        }

        let password_hash = hash_password(password)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;

        let user = User::new(
            username.to_string(),
            password_hash.into_string(),
            self.clock.today(),
        );

        // The unique index still catches a registration that raced past the check above.
        self.store.insert_user(&user).await?;

        metrics::counter!(REGISTRATIONS_TOTAL).increment(1);
        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        Ok(RegisterResponse {
            user_id: user.id,
            username: user.username,
            api_key: user.api_key.unwrap_or_default(),
        })
    }

    /// Unknown usernames and wrong passwords fail identically.
    pub async fn login(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<LoginResponse, ServiceError> {
        let user = self
            .store
            .find_by_username(username)
            .await?
            .ok_or(ServiceError::CredentialMismatch)?;

        verify_password(password, &PasswordHashString::new(user.password_hash.clone())).map_err(
            |_| {
                tracing::warn!(username = %username, "Failed login attempt");
                ServiceError::CredentialMismatch
            },
        )?;

        let dashboard = if user.is_admin {
            "/admin_dashboard".to_string()
        } else {
            format!("/user_dashboard?username={}", user.username)
        };

        tracing::info!(user_id = %user.id, is_admin = user.is_admin, "User logged in");

        Ok(LoginResponse {
            username: user.username,
            is_admin: user.is_admin,
            dashboard,
        })
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User, ServiceError> {
        self.store
            .find_by_username(username)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn find_by_api_key(&self, api_key: &str) -> Result<User, ServiceError> {
        self.store
            .find_by_api_key(api_key)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    /// Create the admin account unless it already exists. Returns whether it
    /// was created by this call.
    pub async fn ensure_admin_exists(&self, password: &Password) -> Result<bool, ServiceError> {
        if self.store.find_by_username(ADMIN_USERNAME).await?.is_some() {
            tracing::debug!("Admin user already present");
            return Ok(false);
        }

        let password_hash = hash_password(password)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;
        let admin = User::new_admin(password_hash.into_string(), self.clock.today());

        match self.store.insert_user(&admin).await {
            Ok(()) => {
                tracing::info!(user_id = %admin.id, "Admin user created");
                Ok(true)
            }
            Err(ServiceError::DuplicateUsername) => {
                tracing::info!("Admin user created concurrently by another process");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn user_dashboard(&self, username: &str) -> Result<UserDashboardResponse, ServiceError> {
        let user = self.find_by_username(username).await?;

        Ok(UserDashboardResponse {
            latest_usage: user.ledger.latest(),
            usage_history: user.ledger.history().to_vec(),
            api_key: user.api_key.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            username: user.username,
        })
    }

    pub async fn admin_overview(&self) -> Result<AdminDashboardResponse, ServiceError> {
        let users = self
            .store
            .list_non_admin()
            .await?
            .into_iter()
            .map(|user| AdminUserRow {
                latest_usage: user.ledger.latest().usage,
                api_key: user.api_key.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                username: user.username,
            })
            .collect();

        Ok(AdminDashboardResponse { users })
    }
}
