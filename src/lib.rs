pub mod app;
pub mod auth;
pub mod config;
pub mod contacts;
pub mod db;
pub mod error;
pub mod interactions;
pub mod mailer;
pub mod nav;
pub mod paths;
pub mod postman;
pub mod revalidate;
pub mod seed;
pub mod settings;
pub mod state;
pub mod telemetry;

#[cfg(test)]
mod memory;
