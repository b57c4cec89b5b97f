//! # TraceWriter
//!
//! Annotate the off-screen work between emails in a property transaction
//! archive, and export the result as a training dataset.
//!
//! Emails are grouped Property → Thread → Email. The interval between two
//! consecutive emails of a thread is a *gap*; an annotation is free text
//! describing what happened in it (a phone call, a site visit, a document
//! sent). The pure logic lives in [`tracewriter_core`]; this crate adds the
//! CLI, the SQLite and HTTP snapshot stores, the debounced persistence
//! bridge and the state endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │ Ungrouped    │──▶│ Preprocessed │──▶│ Session         │
//! │ archive      │   │ (shape A)    │   │ hierarchy +     │
//! └──────────────┘   └──────────────┘   │ annotations     │
//!      tw group          tw import      └───┬─────────┬───┘
//!                                           │         │ debounced saves
//!                                   tw export         ▼
//!                                           │   ┌───────────────┐
//!                                           ▼   │ SQLite / HTTP │
//!                                  Annotated    │ snapshot store│
//!                                  export (B)   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |
//! | [`sqlite_store`] | SQLite snapshot store |
//! | [`http_store`] | HTTP snapshot store client |
//! | [`backend`] | Store selection and session loading |
//! | [`bridge`] | Load-on-start and debounced background saves |
//! | [`server`] | State endpoint (`tw serve`) |

pub mod annotate;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod db;
pub mod export;
pub mod group;
pub mod http_store;
pub mod import;
pub mod migrate;
pub mod server;
pub mod show;
pub mod sqlite_store;
pub mod stats;
