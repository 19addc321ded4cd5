//! HTTP front end for the inkpress conversion service.

pub mod api;
pub mod metrics;
pub mod state;
