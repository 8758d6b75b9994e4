//! File discovery and image/label pairing.
//!
//! Each root is listed non-recursively. Files are matched by extension
//! (ASCII case-insensitive) and paired by their path without the extension, so
//! `root/0001.jpg` pairs with `root/0001.json` whatever order the directory
//! listing returns. Pairs come back sorted by that key.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::error::{DatasetError, DatasetResult};

/// An image file and, when labels are requested, its label file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub image: PathBuf,
    pub label: Option<PathBuf>,
}

#[derive(Default)]
struct Slot {
    image: Option<PathBuf>,
    label: Option<PathBuf>,
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}

fn pairing_key(path: &Path) -> DatasetResult<PathBuf> {
    let stem = path
        .file_stem()
        .ok_or_else(|| DatasetError::NoFileStem {
            path: path.to_path_buf(),
        })?
        .to_str()
        .ok_or_else(|| DatasetError::InvalidUtf8Path {
            path: path.to_path_buf(),
        })?;
    Ok(path.with_file_name(stem))
}

/// Lists the image files of every root and, if `label_extension` is given,
/// pairs each with the label of the same stem.
///
/// With labels, differing image and label counts fail with
/// [`DatasetError::CountMismatch`] and any remaining file without a partner
/// with [`DatasetError::UnpairedFile`].
pub fn discover_pairs(
    roots: &[PathBuf],
    image_extension: &str,
    label_extension: Option<&str>,
) -> DatasetResult<Vec<FilePair>> {
    let mut slots: BTreeMap<PathBuf, Slot> = BTreeMap::new();

    for root in roots {
        if !root.is_dir() {
            return Err(DatasetError::RootNotFound { path: root.clone() });
        }
        for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| DatasetError::DirectoryReadFailed {
                path: root.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if has_extension(&path, image_extension) {
                let key = pairing_key(&path)?;
                slots.entry(key).or_default().image = Some(path);
            } else if label_extension.is_some_and(|ext| has_extension(&path, ext)) {
                let key = pairing_key(&path)?;
                slots.entry(key).or_default().label = Some(path);
            }
        }
    }

    let pairs: Vec<FilePair> = match label_extension {
        None => slots
            .into_values()
            .filter_map(|slot| slot.image)
            .map(|image| FilePair { image, label: None })
            .collect(),
        Some(_) => {
            let images = slots.values().filter(|s| s.image.is_some()).count();
            let labels = slots.values().filter(|s| s.label.is_some()).count();
            if images != labels {
                return Err(DatasetError::CountMismatch { images, labels });
            }
            slots
                .into_values()
                .filter_map(|slot| match (slot.image, slot.label) {
                    (Some(image), Some(label)) => Some(Ok(FilePair {
                        image,
                        label: Some(label),
                    })),
                    (Some(path), None) | (None, Some(path)) => {
                        Some(Err(DatasetError::UnpairedFile { path }))
                    }
                    (None, None) => None,
                })
                .collect::<DatasetResult<_>>()?
        }
    };

    if pairs.is_empty() {
        return Err(DatasetError::NoSamples {
            roots: roots.to_vec(),
        });
    }
    tracing::info!(pairs = pairs.len(), roots = roots.len(), "discovered dataset files");
    Ok(pairs)
}
