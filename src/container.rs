//! Read-only view of an APK (ZIP) container held entirely in memory.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use log::debug;
use zip::read::ZipArchive;
use zip::result::ZipError;

use crate::error::{DecodeError, DecodeResult};

/// Declared sizes of a container entry, as recorded in the central
/// directory. Both are attacker-controlled until validated by a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntrySizes {
    pub compressed: u64,
    pub uncompressed: u64,
}

/// An immutable, in-memory APK container.
///
/// The central directory is parsed once at `open`; entry payloads stay
/// compressed in the retained buffer and are inflated on demand, so each
/// [`Apk::read_entry`] call owns its working buffers and concurrent
/// readers never share decompression state.
#[derive(Debug)]
pub struct Apk {
    data: Vec<u8>,
    names: Vec<String>,
    sizes: BTreeMap<String, EntrySizes>,
}

impl Apk {
    /// Opens a container from an owned buffer.
    pub fn open(data: Vec<u8>) -> DecodeResult<Self> {
        let (names, sizes) = {
            let mut archive = ZipArchive::new(Cursor::new(data.as_slice()))
                .map_err(|err| DecodeError::NotAnArchive(err.to_string()))?;
            let mut names = Vec::with_capacity(archive.len());
            let mut sizes = BTreeMap::new();
            for idx in 0..archive.len() {
                let entry = archive
                    .by_index_raw(idx)
                    .map_err(|err| DecodeError::NotAnArchive(err.to_string()))?;
                if entry.is_dir() || entry.name().ends_with('/') {
                    continue;
                }
                let name = entry.name().to_string();
                sizes.insert(
                    name.clone(),
                    EntrySizes {
                        compressed: entry.compressed_size(),
                        uncompressed: entry.size(),
                    },
                );
                names.push(name);
            }
            (names, sizes)
        };
        debug!("opened container with {} file entries", names.len());
        Ok(Apk { data, names, sizes })
    }

    /// Entry names in central directory order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sizes.contains_key(name)
    }

    pub fn entry_sizes(&self, name: &str) -> Option<EntrySizes> {
        self.sizes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Decompresses a single entry. The declared uncompressed size is
    /// validated against what the stream actually produces; an entry that
    /// under- or over-delivers fails instead of silently truncating.
    pub fn read_entry(&self, name: &str) -> DecodeResult<Vec<u8>> {
        let declared = self
            .sizes
            .get(name)
            .ok_or_else(|| DecodeError::EntryNotFound(name.to_string()))?
            .uncompressed;
        let mut archive = ZipArchive::new(Cursor::new(self.data.as_slice()))
            .map_err(|err| DecodeError::NotAnArchive(err.to_string()))?;
        let entry = archive.by_name(name).map_err(|err| match err {
            ZipError::FileNotFound => DecodeError::EntryNotFound(name.to_string()),
            other => DecodeError::NotAnArchive(other.to_string()),
        })?;

        // Reading one byte past the declared length catches streams that
        // inflate beyond their advertised size without buffering them.
        let mut data = Vec::with_capacity(declared.min(1 << 20) as usize);
        let mut limited = entry.take(declared + 1);
        limited
            .read_to_end(&mut data)
            .map_err(|_| DecodeError::SizeMismatch {
                entry: name.to_string(),
                declared,
                actual: data.len() as u64,
            })?;
        if data.len() as u64 != declared {
            return Err(DecodeError::SizeMismatch {
                entry: name.to_string(),
                declared,
                actual: data.len() as u64,
            });
        }
        Ok(data)
    }
}
