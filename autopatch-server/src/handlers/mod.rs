pub mod auth;
pub mod health;
pub mod patch;
pub mod runs;
