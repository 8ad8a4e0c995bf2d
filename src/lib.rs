pub mod api;
pub mod audit;
pub mod auth;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fraud;
pub mod gate;
pub mod logs;
pub mod models;
pub mod stats;
