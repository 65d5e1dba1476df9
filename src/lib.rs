pub mod app;
pub mod cli;
pub mod collect;
pub mod config;
pub mod errors;
pub mod export;
pub mod gmail;
pub mod oauth;
pub mod render;
pub mod retry;
pub mod types;
