use std::fmt;

// Failures reported by storage ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    // A uniqueness constraint rejected the write.
    Conflict,
    // The row the write targets no longer exists.
    NotFound,
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Conflict => write!(f, "conflict"),
            StorageError::NotFound => write!(f, "not found"),
            StorageError::Backend(message) => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {}

// Domain-level errors for registration and login workflows.
#[derive(Debug)]
pub enum AuthError {
    InvalidUsername,
    InvalidEmail,
    InvalidFullName,
    InvalidPassword,
    UserExists,
    InvalidCredentials,
    InvalidToken,
    SessionExpired,
    StorageFailure,
}

// Domain-level errors for game-set workflows.
#[derive(Debug)]
pub enum GameSetError {
    NotFound,
    InvalidName,
    MapNotFound,
    NotOwner,
    OwnerCannotJoin,
    AlreadyJoined,
    StorageFailure,
}

// Domain-level errors for map workflows.
#[derive(Debug)]
pub enum MapError {
    InvalidName,
    InvalidDimensions,
    AlreadyExists,
    NotFound,
    InvalidImage,
    StorageFailure,
}

// Domain-level errors for pawn workflows.
#[derive(Debug)]
pub enum PawnError {
    GameSetNotFound,
    InvalidName,
    InvalidColor,
    InvalidSize,
    InvalidPosition,
    AlreadyExists,
    NotFound,
    Forbidden,
    StorageFailure,
}

impl From<GameSetError> for PawnError {
    fn from(err: GameSetError) -> Self {
        match err {
            GameSetError::NotFound => PawnError::GameSetNotFound,
            _ => PawnError::StorageFailure,
        }
    }
}
