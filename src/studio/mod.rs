//! Studio Module
//!
//! Transport client, realtime channel client, and completion poller for
//! communicating with the Framecut Studio platform.

pub mod client;
pub mod error;
pub mod poller;
pub mod socket;
