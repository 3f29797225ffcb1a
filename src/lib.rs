//! Sitegen: Asynchronous Site Generation
//!
//! Accepts a natural-language request, queues it, turns it into a single
//! self-contained HTML document with a generation backend, stores the
//! document under the session id, and answers status polls until it is
//! ready.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod provider;
pub mod queue;
pub mod status;
pub mod store;
pub mod submission;
pub mod types;
pub mod worker;
