use crate::models::board::Side;
use crate::models::game::GameStatus;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::services::errors::notation_errors::NotationError;
use crate::services::errors::rule_authority_errors::RuleAuthorityError;

#[derive(Debug)]
pub enum GameSessionServiceError {
    GameNotFound(String),
    InvalidState {
        expected: GameStatus,
        actual: GameStatus,
    },
    OutOfTurn {
        side_to_move: Side,
    },
    SelfJoin,
    SelfResponse,
    NoDrawOffered,
    AlreadyInActiveGame(String),
    NotAParticipant(String),
    IllegalMove(NotationError),
    RuleAuthorityError(RuleAuthorityError),
    RepositoryError(RepositoryError),
}

impl std::fmt::Display for GameSessionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameSessionServiceError::GameNotFound(game_id) => {
                write!(f, "Game not found: {}", game_id)
            }
            GameSessionServiceError::InvalidState { expected, actual } => {
                write!(f, "Game is {}, expected {}", actual, expected)
            }
            GameSessionServiceError::OutOfTurn { side_to_move } => {
                write!(f, "Not your turn, {} to move", side_to_move)
            }
            GameSessionServiceError::SelfJoin => write!(f, "Cannot join your own game"),
            GameSessionServiceError::SelfResponse => {
                write!(f, "Cannot respond to your own draw offer")
            }
            GameSessionServiceError::NoDrawOffered => write!(f, "No draw has been offered"),
            GameSessionServiceError::AlreadyInActiveGame(game_id) => {
                write!(f, "Player already has an active game: {}", game_id)
            }
            GameSessionServiceError::NotAParticipant(player_id) => {
                write!(f, "Player {} does not participate in this game", player_id)
            }
            GameSessionServiceError::IllegalMove(err) => write!(f, "Illegal move: {}", err),
            GameSessionServiceError::RuleAuthorityError(err) => {
                write!(f, "Rule authority error: {}", err)
            }
            GameSessionServiceError::RepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
        }
    }
}

impl std::error::Error for GameSessionServiceError {}

impl From<RepositoryError> for GameSessionServiceError {
    fn from(err: RepositoryError) -> Self {
        GameSessionServiceError::RepositoryError(err)
    }
}

impl From<NotationError> for GameSessionServiceError {
    fn from(err: NotationError) -> Self {
        GameSessionServiceError::IllegalMove(err)
    }
}

impl From<RuleAuthorityError> for GameSessionServiceError {
    fn from(err: RuleAuthorityError) -> Self {
        GameSessionServiceError::RuleAuthorityError(err)
    }
}
