//! Session core for remote chess games: notation resolution, draw detection,
//! rating updates, the game state machine and the maintenance sweeper.

pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
