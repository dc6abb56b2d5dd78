use crate::domain::errors::AuthError;
use crate::domain::ports::AccessTokenStore;

// Response returned by the logout use case.
pub struct LogoutResponse {
    pub revoked: bool,
}

// Logout use case with injected dependencies.
pub struct LogoutUseCase<'a> {
    pub tokens: &'a dyn AccessTokenStore,
}

impl LogoutUseCase<'_> {
    pub async fn execute(&self, token: &str) -> Result<LogoutResponse, AuthError> {
        let revoked = self
            .tokens
            .remove(token)
            .await
            .map_err(|_| AuthError::StorageFailure)?;

        Ok(LogoutResponse { revoked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AccessToken, NewUser};
    use crate::domain::errors::StorageError;
    use crate::domain::ports::UserRepository;
    use crate::use_cases::login::LoginUseCase;
    use crate::use_cases::test_support::{MemoryFixture, PlainHasher, SettableClock};
    use crate::use_cases::verify_token::VerifyTokenUseCase;
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl AccessTokenStore for FailingStore {
        async fn insert(&self, _token: String, _access: AccessToken) -> Result<(), StorageError> {
            Ok(())
        }

        async fn get(&self, _token: &str) -> Result<Option<AccessToken>, StorageError> {
            Ok(None)
        }

        async fn remove(&self, _token: &str) -> Result<bool, StorageError> {
            Err(StorageError::Backend("remove failed".to_string()))
        }

        async fn purge_expired(&self, _now: u64) -> Result<usize, StorageError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn when_token_does_not_exist_then_logout_returns_revoked_false() {
        let fixture = MemoryFixture::new();
        let use_case = LogoutUseCase {
            tokens: &fixture.tokens,
        };

        let result = use_case
            .execute("missing-token")
            .await
            .expect("expected logout to succeed");

        assert!(!result.revoked);
    }

    #[tokio::test]
    async fn when_store_remove_fails_then_returns_storage_failure() {
        let use_case = LogoutUseCase {
            tokens: &FailingStore,
        };

        let result = use_case.execute("token-1").await;

        assert!(matches!(result, Err(AuthError::StorageFailure)));
    }

    #[tokio::test]
    async fn when_token_is_logged_out_then_verify_token_returns_invalid_token() {
        let fixture = MemoryFixture::new();
        fixture
            .users
            .create(NewUser {
                username: "gm".to_string(),
                email: "gm@example.com".to_string(),
                full_name: None,
                password_hash: "plain:secret".to_string(),
            })
            .await
            .expect("expected user to be created");
        let clock = SettableClock::new(1_700_000_000);

        let login = LoginUseCase {
            users: &fixture.users,
            hasher: &PlainHasher,
            tokens: &fixture.tokens,
            clock: &clock,
            ttl_seconds: 3600,
        }
        .execute("gm", "secret")
        .await
        .expect("expected login to succeed");

        let logout = LogoutUseCase {
            tokens: &fixture.tokens,
        }
        .execute(&login.access_token)
        .await
        .expect("expected logout to succeed");
        assert!(logout.revoked);

        let verify = VerifyTokenUseCase {
            tokens: &fixture.tokens,
            users: &fixture.users,
            clock: &clock,
        }
        .execute(&login.access_token)
        .await;

        assert!(matches!(verify, Err(AuthError::InvalidToken)));
    }
}
