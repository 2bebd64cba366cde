pub mod config;
pub mod download;
pub mod error;
pub mod gemini;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod routes;
pub mod session;
pub mod storage;
pub mod transport;
pub mod upload;
