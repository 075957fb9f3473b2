//! Remote control for XBMC media centers.
//!
//! The crate talks to a media center over its HTTP API and keeps every
//! network round trip off the caller's context:
//!
//! * [`executor`] - one serial worker loop per subsystem
//! * [`response`] - results handed back from a loop to the caller
//! * [`manager`] - playback and playlist operations, and the composition root
//! * [`cache`] - album art resolved through memory, disk and network tiers
//! * [`remote`] - client traits and their HTTP API implementation
//! * [`protocol`] - request building and response parsing
//!
//! # Example
//!
//! ```rust
//! use mcremote::{config::Config, manager::Backend};
//!
//! let backend = Backend::new(&Config::default())?;
//! let enqueued = backend.music().enqueue(songs).await?;
//! if let Some(position) = enqueued.started_at {
//!     println!("playing from {position}");
//! }
//! ```
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod manager;
pub mod protocol;
pub mod remote;
pub mod response;

#[cfg(test)]
mod testing;
