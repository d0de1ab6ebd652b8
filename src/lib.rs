//! TrueCheckIA usage limits
//!
//! Request rate limiting and hourly cost metering for the TrueCheckIA
//! analysis API, over an in-process or Redis-backed cache.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
