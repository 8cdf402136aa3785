//! Request / response types for the HTTP surface.
//!
//! Field names on the wire are camelCase to match the browser client.

pub mod api;
