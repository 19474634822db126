//! # dynatable
//!
//! Uniform, ordered, paginated access to partition-key/sort-key tables:
//! - One storage contract, two backends (remote store adapter, in-memory engine)
//! - Key fragments resolved to table or secondary-index access
//! - Portable page tokens and lazy, resumable cursors
//! - Sort-key predicates and delta updates as tagged values
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Table                                │
//! │         (lookup resolution, key validation, tokens)          │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!        ┌──────────────┐               ┌──────────────┐
//!        │ QueryCursor  │──── fetch ───►│ TableStorage │
//!        │ (lazy pages) │               │  (contract)  │
//!        └──────────────┘               └──────┬───────┘
//!                                              │
//!                              ┌───────────────┴───────────────┐
//!                              ▼                               ▼
//!                      ┌──────────────┐                ┌──────────────┐
//!                      │ LocalStorage │                │RemoteStorage │
//!                      │   (Mutex)    │                │(DynamoClient)│
//!                      └──────┬───────┘                └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │   Snapshot   │
//!                      │ (JSON file)  │
//!                      └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod condition;
pub mod update;
pub mod cancel;
pub mod backoff;
pub mod observer;
pub mod page;
pub mod token;
pub mod storage;
pub mod schema;
pub mod lookup;
pub mod cursor;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TableError};
pub use config::Config;
pub use value::{Number, Record, Value};
pub use condition::{Condition, Key, KeyValue};
pub use update::{Update, Updates};
pub use cancel::Cancel;
pub use observer::{NoopObserver, QueryObserver, TracingObserver};
pub use page::ResultPage;
pub use storage::{LocalStorage, RemoteStorage, TableStorage};
pub use schema::{Index, TableSchema};
pub use cursor::QueryCursor;
pub use table::{QueryOptions, Table};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of dynatable
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
