//! Connected-client handling for the player queue.
//!
//! This crate covers everything about a single user's connection:
//!
//! 1. **Authentication**: turning an upgrade token into a [`SteamId`](playerqueue_protocol::SteamId)
//!    ([`Authenticator`] trait)
//! 2. **The client handle**: [`QueueClient`], the capability the
//!    coordinator depends on, and [`Client`], its transport-backed
//!    implementation with a bounded outbound queue and a writer task
//! 3. **Rate limiting**: a [`TokenBucket`] that throttles inbound frames
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← holds Arc<dyn QueueClient>, enqueues responses
//!     ↕
//! Client Layer (this crate)  ← reads requests, writes responses, one per user
//!     ↕
//! Protocol + Transport (below)  ← frames and sockets
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod client;
mod config;
mod error;
mod limiter;
mod profile;

pub use auth::Authenticator;
pub use client::{Client, QueueClient};
pub use config::ClientConfig;
pub use error::ClientError;
pub use limiter::TokenBucket;
pub use profile::{PERMISSION_ADMIN, PERMISSION_MODERATOR, PERMISSION_USER, Profile};
