//! # cinesim Storage
//!
//! Reads the catalog artifacts produced by the data-preparation step and
//! persists the similarity index.
//!
//! - [`npy`] / [`delimited`] - feature matrices (`.npy`, numeric CSV)
//! - [`mapping`] - `title_to_index.json`
//! - [`blob`] - checksummed index blob, written atomically
//! - [`IndexBuilder`] - offline fuse + build + save
//! - [`CatalogLoader`] - start-up load of a ready engine

pub mod blob;
pub mod builder;
pub mod delimited;
pub mod loader;
pub mod mapping;
pub mod npy;
pub mod paths;

pub use blob::{load_index, save_index, IndexHeader};
pub use builder::{BuildReport, IndexBuilder};
pub use loader::CatalogLoader;
pub use paths::DataPaths;
