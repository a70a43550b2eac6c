pub mod api;
pub mod bot;
pub mod types;
