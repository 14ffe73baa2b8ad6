//! Oxidrive client - drive REST API adapter
//!
//! Implements the [`RemoteDrive`](oxidrive_core::ports::remote_drive::RemoteDrive)
//! port against a OneDrive-style REST API:
//!
//! - [`client`] - the typed HTTP client (auth header, base URL, error mapping)
//! - [`items`] - wire DTOs and their conversion into domain nodes
//! - [`provider`] - the `RemoteDrive` implementation (listing, transfers,
//!   resumable upload sessions, deletion, property patches)
//! - [`readonly`] - a decorator that no-ops every mutation for dry-run mode

pub mod client;
pub mod items;
pub mod provider;
pub mod readonly;

pub use client::DriveClient;
pub use readonly::ReadOnlyDrive;
