pub mod game_session_service_errors;
pub mod notation_errors;
pub mod rule_authority_errors;
