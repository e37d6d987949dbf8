//! Primary job session

pub mod fsm;
