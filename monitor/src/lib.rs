//! Refresh Monitor Library
//!
//! Client-side monitor for the data-refresh background job: submits jobs,
//! follows their status and log stream, and decides when a job has really
//! finished.

pub mod app;
pub mod board;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod inspector;
pub mod logs;
pub mod server;
pub mod session;
pub mod storage;
pub mod stream;
pub mod utils;
pub mod view;
pub mod workers;
