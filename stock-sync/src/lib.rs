//! Stock item to Dynamics 365 product synchronization
//!
//! Reads stock items from a relational source and reconciles each one into
//! a Dynamics 365 product plus a price list item on the configured default
//! price list.

pub mod api;
pub mod config;
pub mod entities;
pub mod scheduler;
pub mod source;
pub mod sync;
