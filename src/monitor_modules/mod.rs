//! Building blocks of the monitor: configuration, the Hypixel client, value
//! extraction, change detection and the poll loop that drives them.
pub mod api_client;
pub mod change_detector;
pub mod config;
pub mod extractor;
pub mod poll_loop;
