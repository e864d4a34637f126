//! dweb-cache Library
//!
//! Cache-first interception of dweb resolver manifest requests, with the
//! cache stores, network fetcher and worker registration it runs on.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod interceptor;
pub mod lifecycle;
pub mod logging;
pub mod registration;
