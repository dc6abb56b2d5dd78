use crate::domain::entities::{NewUser, User};
use crate::domain::errors::{AuthError, StorageError};
use crate::domain::ports::{PasswordHasher, UserRepository};
use crate::use_cases::is_bounded_text;

// Fields a client supplies to open an account.
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password: String,
}

// Registration use case with injected dependencies.
pub struct RegisterUseCase<'a> {
    pub users: &'a dyn UserRepository,
    pub hasher: &'a dyn PasswordHasher,
}

impl RegisterUseCase<'_> {
    pub async fn execute(&self, account: NewAccount) -> Result<User, AuthError> {
        if !is_bounded_text(&account.username, 256) {
            return Err(AuthError::InvalidUsername);
        }
        if !is_plausible_email(&account.email) {
            return Err(AuthError::InvalidEmail);
        }
        if let Some(full_name) = &account.full_name {
            if !is_bounded_text(full_name, 256) {
                return Err(AuthError::InvalidFullName);
            }
        }
        if account.password.is_empty() || account.password.chars().count() > 256 {
            return Err(AuthError::InvalidPassword);
        }

        let password_hash = self.hasher.hash(&account.password).map_err(|err| {
            tracing::error!(error = %err, "failed to hash password");
            AuthError::StorageFailure
        })?;

        self.users
            .create(NewUser {
                username: account.username,
                email: account.email.to_lowercase(),
                full_name: account.full_name,
                password_hash,
            })
            .await
            .map_err(|err| match err {
                StorageError::Conflict => AuthError::UserExists,
                _ => AuthError::StorageFailure,
            })
    }
}

// Shape check only; deliverability is not our concern.
fn is_plausible_email(value: &str) -> bool {
    if value.chars().count() > 320 || value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
