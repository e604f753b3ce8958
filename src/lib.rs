//! # RMS Telemetry Library
//!
//! Follow the logs of an RMS meteor camera station and serve its status.
//!
//! This library provides the pieces of the telemetry service: a tolerant
//! line parser that folds log lines into a [`status::StatusDocument`], a
//! tailer for the rotating log files, a thread-safe store with a short
//! history of archived runs, and the HTTP surface that reads from it.

pub mod archive;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod parser;
pub mod server;
pub mod status;
pub mod store;
pub mod system;
pub mod tailer;
