pub mod auth;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod identity;
pub mod models;
pub mod provider;
pub mod service;
pub mod state;
pub mod store;
