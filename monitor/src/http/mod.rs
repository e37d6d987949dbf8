//! Backend HTTP access

pub mod backend;
pub mod client;
pub mod jobs;
pub mod logs;
