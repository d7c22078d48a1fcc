//! Enumeration of bitmap assets (launcher icons and other drawables)
//! declared by the resource table, collapsed across density variants.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::arsc::{density_value, ResourceTable, TableValue};
use crate::container::Apk;

const BITMAP_EXTENSIONS: &[&str] = &["png", "webp", "jpg", "jpeg", "gif"];
const ICON_TYPE_NAMES: &[&str] = &["drawable", "mipmap"];

/// One logical image resource and the container path of its best
/// (highest-density) variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub name: String,
    pub path: String,
}

struct Candidate {
    density: u16,
    order: usize,
    path: String,
}

/// Lists bitmap resources in drawable/mipmap types. Multiple density
/// configurations of the same logical name collapse to one entry,
/// preferring the highest density; ties keep the earliest declaration.
/// With no table (or a table that yields nothing) the container's `res/`
/// tree is scanned directly.
pub fn list_icons(apk: &Apk, table: Option<&ResourceTable>) -> Vec<ImageAsset> {
    let mut best: BTreeMap<String, Candidate> = BTreeMap::new();

    if let Some(table) = table {
        let mut order = 0;
        for package in table.packages() {
            for ty in &package.types {
                let is_icon_type = package
                    .type_name(ty.type_id)
                    .is_some_and(|name| ICON_TYPE_NAMES.contains(&name));
                if !is_icon_type {
                    continue;
                }
                for entry in ty.entries.values() {
                    let TableValue::Str(path) = &entry.value else {
                        continue;
                    };
                    if !is_bitmap_path(path) || !apk.contains(path) {
                        continue;
                    }
                    let name = package
                        .key_name(entry.key)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| file_stem(path).to_string());
                    offer(&mut best, name, ty.config.density, order, path.clone());
                    order += 1;
                }
            }
        }
    }

    if best.is_empty() {
        scan_container(apk, &mut best);
    }

    best.into_iter()
        .map(|(name, candidate)| ImageAsset {
            name,
            path: candidate.path,
        })
        .collect()
}

fn scan_container(apk: &Apk, best: &mut BTreeMap<String, Candidate>) {
    for (order, name) in apk.entry_names().enumerate() {
        let Some(rest) = name.strip_prefix("res/") else {
            continue;
        };
        let Some((dir, file)) = rest.split_once('/') else {
            continue;
        };
        let bucket = dir.split('-').next().unwrap_or(dir);
        if !ICON_TYPE_NAMES.contains(&bucket) || !is_bitmap_path(file) {
            continue;
        }
        let density = dir
            .split('-')
            .skip(1)
            .find_map(density_value)
            .unwrap_or(160);
        offer(best, file_stem(file).to_string(), density, order, name.to_string());
    }
}

fn offer(
    best: &mut BTreeMap<String, Candidate>,
    name: String,
    density: u16,
    order: usize,
    path: String,
) {
    match best.get(&name) {
        Some(current) if current.density >= density => {}
        _ => {
            best.insert(
                name,
                Candidate {
                    density,
                    order,
                    path,
                },
            );
        }
    }
}

fn is_bitmap_path(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .is_some_and(|ext| BITMAP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn file_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split_once('.').map(|(stem, _)| stem).unwrap_or(file)
}
