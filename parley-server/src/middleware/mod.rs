//! HTTP middleware stack.

pub mod cors;
pub mod trace;

pub use trace::X_TRACE_ID;
