//! Demo server integration tests
//!
//! Drives the full router built by `warden_app::create_app` through the
//! authentication layer: global backends, per-route overrides and API keys.

#![allow(dead_code)]

mod api_keys;
mod common;
mod hello;
mod resources;
