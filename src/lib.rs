// ABOUTME: Library crate for devbox-setup exposing the setup workflow for testing and embedding

pub mod config;
pub mod handshake;
pub mod host;
pub mod manifest;
pub mod models;
pub mod orchestrator;
pub mod settings;
