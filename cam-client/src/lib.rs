//! CAM terminal client library exports.

pub mod api_client;
pub mod columns;
pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod list_view;
pub mod state;
pub mod views;
pub mod widgets;
