use uuid::Uuid;

use crate::domain::entities::AccessToken;
use crate::domain::errors::AuthError;
use crate::domain::ports::{AccessTokenStore, Clock, PasswordHasher, UserRepository};

// Response returned by the login use case.
pub struct LoginResponse {
    pub access_token: String,
    pub expires_at: u64,
}

// Password login use case with injected dependencies.
pub struct LoginUseCase<'a> {
    pub users: &'a dyn UserRepository,
    pub hasher: &'a dyn PasswordHasher,
    pub tokens: &'a dyn AccessTokenStore,
    pub clock: &'a dyn Clock,
    pub ttl_seconds: u64,
}

impl LoginUseCase<'_> {
    pub async fn execute(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = self
            .users
            .find_by_username(username)
            .await
            .map_err(|_| AuthError::StorageFailure)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now_epoch_seconds();
        // Tokens nobody presents again would otherwise stay forever.
        match self.tokens.purge_expired(now).await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "purged expired access tokens"),
            Err(err) => tracing::warn!(error = %err, "failed to purge expired access tokens"),
        }

        let access_token = Uuid::new_v4().to_string();
        let expires_at = now + self.ttl_seconds;

        self.tokens
            .insert(
                access_token.clone(),
                AccessToken {
                    user_id: user.id,
                    username: user.username,
                    expires_at,
                },
            )
            .await
            .map_err(|_| AuthError::StorageFailure)?;

        Ok(LoginResponse {
            access_token,
            expires_at,
        })
    }
}
