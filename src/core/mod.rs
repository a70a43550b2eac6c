pub mod classify;
pub mod engine;
pub mod events;
pub mod extract;
pub mod model;
pub mod notify;
pub mod progress;
pub mod render;
pub mod runner;
