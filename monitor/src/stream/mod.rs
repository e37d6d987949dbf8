//! Log stream processing: SSE framing, sentinel markers, noise and duplicate
//! suppression

pub mod dedup;
pub mod ignore;
pub mod processor;
pub mod sentinel;
pub mod sse;
