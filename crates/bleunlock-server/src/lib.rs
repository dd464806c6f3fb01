//! # bleunlock-server
//!
//! HTTP server library for bleunlock.
//!
//! This library provides the API handlers and state management for bleunlock.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
