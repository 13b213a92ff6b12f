//! Position-aware room server: devices take compass bearings of each other
//! and the engine places every device on a shared grid.

pub mod config;
pub mod engine;
pub mod frame;
pub mod routes;
pub mod services;
pub mod state;
