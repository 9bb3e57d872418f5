//! Upstream agent client.
//!
//! The reasoning lives in an external service; this crate is a pure client
//! of its run contract. One call submits a fresh run and blocks until the
//! upstream reaches a terminal state — no streaming is consumed and no
//! conversation state is carried between calls.

pub mod client;

pub use client::HttpAgentClient;
