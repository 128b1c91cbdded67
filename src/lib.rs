pub mod app;
pub mod auth;
pub mod classes;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod health;
pub mod memory;
pub mod state;
