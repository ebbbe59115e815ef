//! Assistant webhook proxy.
//!
//! Forwards a free-text question, together with a summary of the records
//! currently on screen, to an external assistant webhook.

pub mod client;
pub mod context;

pub use client::AssistantClient;
pub use context::AssistantContext;
