pub mod controller;
pub mod enhance;
pub mod prompt;
pub mod types;
