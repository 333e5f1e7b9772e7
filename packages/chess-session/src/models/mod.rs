pub mod board;
pub mod game;
pub mod game_view;
pub mod move_record;
pub mod player;
