pub mod board_poller;
pub mod log_stream;
pub mod monitor;
pub mod status_poller;
