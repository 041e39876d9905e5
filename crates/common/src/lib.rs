//! Shared building blocks for the ICVK registration backend.

pub mod config;
pub mod db;
pub mod error;
pub mod types;
