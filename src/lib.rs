//! # annforest
//!
//! Approximate nearest-neighbor index for item-to-item recommendations.
//!
//! This library provides:
//! - An immutable vector store with item-id lookup
//! - A forest of random-projection trees built in parallel
//! - A best-first query engine with a tunable candidate budget
//! - A versioned, checksummed binary index format
//! - An atomically swappable handle for serving and an HTTP service layer
//!
//! ## Example
//!
//! ```rust
//! use annforest::{ForestIndex, ForestParams, SearchParams, Vector};
//!
//! let items = vec![
//!     ("a", Vector::new(vec![1.0, 0.0])),
//!     ("b", Vector::new(vec![0.9, 0.1])),
//!     ("c", Vector::new(vec![0.0, 1.0])),
//! ];
//! let index = ForestIndex::build(items, ForestParams::new(4, 2, 7)).unwrap();
//!
//! let recs = index.recommend("a", 1, &SearchParams::default()).unwrap();
//! assert_eq!(recs[0].item_id, "b");
//! ```

pub mod catalog;
pub mod distance;
pub mod error;
pub mod forest;
pub mod handle;
pub mod metrics;
pub mod persistence;
pub mod server;
pub mod store;
pub mod vector;

pub use catalog::{Catalog, ItemInfo};
pub use distance::Metric;
pub use error::{ForestError, Result};
pub use forest::{ForestIndex, ForestParams, Neighbor, Query, SearchParams};
pub use handle::IndexHandle;
pub use store::{Slot, VectorStore};
pub use vector::Vector;
