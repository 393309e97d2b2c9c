//! Shared utilities and configuration for Warden
//!
//! This crate provides common functionality used across the workspace:
//! - Configuration management following 12-factor principles
//! - Salted API key hashing

pub mod config;
pub mod crypto;

pub use config::{AuthSettings, Config, MAX_JWT_LEEWAY};
pub use crypto::{hash_key, verify_key_hash};
