//! Theme Master API - real-time game server for an AI-stocked card party game
//!
//! Rooms are created and joined over REST; play happens over one `WebSocket` per player.
//! The [`engine::RoundEngine`] owns every game rule and is the only writer of room state.

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod dto;
pub mod engine;
pub mod entities;
pub mod error;
pub mod routes;
pub mod seed;
pub mod services;
pub mod sessions;
pub mod state;
pub mod utils;
