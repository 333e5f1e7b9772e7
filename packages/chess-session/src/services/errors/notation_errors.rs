use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    /// The text matched none of the notation forms.
    UnparseableNotation(String),
    /// The notation parsed but no legal move fits it.
    NoLegalCandidate(String),
    /// More than one legal move survives every filter.
    AmbiguousCandidate { notation: String, candidates: Vec<String> },
    InvalidPromotionPiece(char),
}

impl fmt::Display for NotationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotationError::UnparseableNotation(notation) => {
                write!(f, "Cannot parse move notation: {}", notation)
            }
            NotationError::NoLegalCandidate(notation) => {
                write!(f, "No legal move matches: {}", notation)
            }
            NotationError::AmbiguousCandidate {
                notation,
                candidates,
            } => write!(
                f,
                "Ambiguous move {}: candidates {}",
                notation,
                candidates.join(", ")
            ),
            NotationError::InvalidPromotionPiece(letter) => {
                write!(f, "Invalid promotion piece: {}", letter)
            }
        }
    }
}

impl std::error::Error for NotationError {}
