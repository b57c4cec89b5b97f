//! # TraceWriter Core
//!
//! Shared, I/O-free logic for TraceWriter: the Property → Thread → Email
//! hierarchy, the JSON codec for the preprocessed and annotated-export
//! shapes, the gap annotation store, export synthesis, and the debounced
//! save state machine.
//!
//! This crate contains no tokio, sqlx, filesystem or network access. Every
//! operation is a plain function over values the caller owns.

pub mod annotations;
pub mod codec;
pub mod error;
pub mod export;
pub mod grouping;
pub mod models;
pub mod session;
pub mod store;
pub mod sync;
pub mod wire;
