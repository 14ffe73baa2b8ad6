//! Oxidrive core - domain model, configuration, and capability ports
//!
//! This crate holds everything the synchronization engine and its adapters
//! share, without depending on any of them:
//!
//! - [`domain`] - node snapshots, validated newtypes, and the error taxonomy
//! - [`config`] - typed configuration with YAML loading and defaults
//! - [`ports`] - the two capability surfaces the engine is written against:
//!   [`ports::remote_drive::RemoteDrive`] and [`ports::local_store::LocalStore`]

pub mod config;
pub mod domain;
pub mod ports;
