//! API handlers

pub mod chat;
pub mod health;
pub mod projects;
pub mod resume;
