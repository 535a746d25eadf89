//! twinet Artifact Store
//!
//! Maps logical `(pipeline, stage, artifact, format)` declarations to files on
//! disk and reads/writes them through pluggable format drivers.
//!
//! # Core Operations
//!
//! - **Declare**: register [`ArtifactSpec`]s, resolving paths and drivers once
//! - **Exists**: advisory memoization check for task outputs
//! - **Read**: driver-decoded value, served from a bounded LRU cache when fresh
//! - **Write**: driver-encoded value, refreshing the cache
//!
//! # Architecture
//!
//! ```text
//! ArtifactSpec → declare → ArtifactDescriptor ─┬→ FormatDriver → File System
//!                                              └→ ArtifactCache (path-keyed, LRU)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use twinet_artifact::{row, ArtifactSpec, ArtifactStore, Table};
//!
//! let store = ArtifactStore::new("output");
//! let key = store.declare_one(ArtifactSpec::new("network", "creation", "edges", "csv"))?;
//!
//! let edges = Table::from_rows(["source", "target", "weight"], vec![row!["A", "B", 1]])?;
//! store.write(&key, edges)?;
//! assert!(store.exists(&key)?);
//! let back = store.read_table(&key)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod error;
pub mod formats;
pub mod key;
pub mod options;
pub mod store;
pub mod value;

// Re-exports for convenience
pub use cache::{ArtifactCache, CacheStats};
pub use error::{FormatError, StoreError, StoreResult, ValueError};
pub use formats::{
    default_drivers, CsvDriver, DriverRegistry, FnDriver, FormatDriver, GraphDriver, JsonDriver,
    WriteSummary, YamlDriver,
};
pub use key::{full_name, ArtifactDescriptor, ArtifactKey, ArtifactSpec, NAME_SEPARATOR};
pub use options::FormatOptions;
pub use store::{ArtifactStore, DEFAULT_CACHE_CAPACITY};
pub use value::{
    ArtifactKind, ArtifactValue, AttrGraph, AttrValue, Attrs, Cell, ColumnType, Document, EdgeView,
    Table, WEIGHT,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the Artifact Store
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::key::{ArtifactKey, ArtifactSpec};
    pub use crate::options::FormatOptions;
    pub use crate::store::ArtifactStore;
    pub use crate::value::{ArtifactValue, AttrGraph, Cell, Document, Table};
}
