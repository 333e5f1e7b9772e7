pub mod chess_service;
pub mod draw_service;
pub mod errors;
pub mod game_locks;
pub mod game_session_service;
pub mod maintenance_service;
pub mod notation_service;
pub mod rating_service;
pub mod rule_authority;
