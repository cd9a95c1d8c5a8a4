pub mod actions;
pub mod calendar;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod handlers;
pub mod models;
pub mod registry;
