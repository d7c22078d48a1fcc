//! # apkex
//!
//! A library for inspecting Android application packages (APKs) entirely
//! in memory: open a package buffer, decode its binary manifest and
//! compiled resource table, and query the derived views — identity,
//! permissions, icons, embedded links, and on-demand content search.
//!
//! The input buffer is treated as untrusted throughout; malformed or
//! adversarial packages produce [`DecodeError`]s, never unchecked reads.
//!
//! # Examples
//!
//! ```no_run
//! use apkex::ApkLoader;
//!
//! let buffer = std::fs::read("app.apk").unwrap();
//! let mut loader = ApkLoader::new(buffer);
//! let result = loader.load().unwrap();
//! if let Some(manifest) = result.manifest {
//!     println!("{} v{}", manifest.package(), manifest.version_name());
//!     println!("{}", manifest.original_xml().unwrap());
//! }
//! for link in loader.get_links() {
//!     println!("{link}");
//! }
//! ```

pub mod arsc;
pub mod assets;
pub mod axml;
mod chunk;
pub mod container;
pub mod error;
pub mod links;
pub mod loader;
pub mod manifest;
pub mod search;
#[cfg(test)]
mod testutil;

pub use arsc::{ResourceTable, TableValue, MAX_REFERENCE_DEPTH};
pub use assets::ImageAsset;
pub use axml::{XmlAttribute, XmlDocument, XmlElement, XmlValue};
pub use container::Apk;
pub use error::{DecodeError, DecodeResult};
pub use loader::{ApkLoader, Image, LoadResult, MAX_PACKAGE_SIZE};
pub use manifest::{ApplicationLabel, Manifest};
pub use search::{SearchMatch, MAX_MATCHES_PER_ENTRY};
