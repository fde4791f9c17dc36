//! Multiplayer snake arena: the shared simulation core, the authoritative
//! broadcast server and a headless client.

pub mod app;
pub mod client;
pub mod game;
pub mod protocol;
pub mod room_runtime;
pub mod transport;
