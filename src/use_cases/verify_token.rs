use crate::domain::entities::User;
use crate::domain::errors::AuthError;
use crate::domain::ports::{AccessTokenStore, Clock, UserRepository};

// Token verification use case with injected dependencies.
pub struct VerifyTokenUseCase<'a> {
    pub tokens: &'a dyn AccessTokenStore,
    pub users: &'a dyn UserRepository,
    pub clock: &'a dyn Clock,
}

impl VerifyTokenUseCase<'_> {
    /// Resolves a bearer token to the account that owns it.
    pub async fn execute(&self, token: &str) -> Result<User, AuthError> {
        let access = self
            .tokens
            .get(token)
            .await
            .map_err(|_| AuthError::StorageFailure)?
            .ok_or(AuthError::InvalidToken)?;

        if access.expires_at <= self.clock.now_epoch_seconds() {
            // Best-effort cleanup of expired token.
            let _ = self.tokens.remove(token).await;
            return Err(AuthError::SessionExpired);
        }

        // Accounts are never deleted, but a token must not outlive its user.
        self.users
            .find_by_id(access.user_id)
            .await
            .map_err(|_| AuthError::StorageFailure)?
            .ok_or(AuthError::InvalidToken)
    }
}
