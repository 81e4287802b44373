//! Mhoro core library — session identity, presence, pairing, and message
//! streaming for the anonymous random chat service, shared by the terminal
//! front-end.

pub mod api;
pub mod client;
pub mod config;
pub mod names;
pub mod pairing;
pub mod profile;
pub mod session;
pub mod stream;
pub mod ui;
