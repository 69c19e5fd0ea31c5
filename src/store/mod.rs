//! Persistent tile storage.
//!
//! Every tile the proxy serves or pre-warms ends up in a single SQLite table:
//!
//! ```text
//! tiles
//! ┌──────┬─────┬─────┬──────┬────────────┐
//! │ zoom │  x  │  y  │ blob │ created_at │
//! └──────┴─────┴─────┴──────┴────────────┘
//!   PRIMARY KEY (zoom, x, y)     indexed for the retention sweep
//! ```
//!
//! The store is shared by the on-demand tile handlers and the download
//! queue. Both write through upserts keyed by `(zoom, x, y)`, so concurrent
//! writes to the same tile resolve as last-write-wins.

mod tile_store;

pub use tile_store::{TileStore, BATCH_CHECK_CHUNK_SIZE};
