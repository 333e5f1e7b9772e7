#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryError {
    NotFound,
    /// The stored item changed since it was read; nothing was written.
    Conflict(String),
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::NotFound => write!(f, "Item not found"),
            RepositoryError::Conflict(msg) => write!(f, "Concurrent modification: {}", msg),
            RepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            RepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}
