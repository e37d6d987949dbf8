//! Wire models shared with the data-refresh backend

pub mod models;

pub use models::*;
