//! Platform Crate - Technical Infrastructure
//!
//! This crate provides the leaf components of the identity core. None of
//! them know about users, roles or records:
//! - Cryptographic utilities (SHA-256, hex, Base64)
//! - Secret generation (reset tokens, human-friendly one-time codes)
//! - Digests with constant-time verification, optional HMAC keying
//! - Password policy and Argon2id hashing
//! - In-process throttling: sliding-window limiter and resend cooldown
//! - Background pruning of throttle state

pub mod cooldown;
pub mod crypto;
pub mod digest;
pub mod password;
pub mod rate_limit;
pub mod secret;
pub mod sweep;
