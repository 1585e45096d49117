// ABOUTME: Library crate for labterm, a terminal client for remote lab sessions
// Exposes the session gate, tab orchestration and WebSocket terminals for the binary and tests

pub mod api;
pub mod app;
pub mod components;
pub mod config;
pub mod models;
pub mod session;
pub mod terminal;
