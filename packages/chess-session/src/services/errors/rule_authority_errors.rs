use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAuthorityError {
    InvalidPosition(String),
    IllegalMove(String),
}

impl fmt::Display for RuleAuthorityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuleAuthorityError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            RuleAuthorityError::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
        }
    }
}

impl std::error::Error for RuleAuthorityError {}
