//! Content transformers applied while application files are copied or packed.

use crate::metadata::APP_MANIFEST_FILE;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Result of a transformer that wants to alter a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    /// Replacement content
    Content(Vec<u8>),
    /// Copy this file instead of the original
    Destination(PathBuf),
}

/// Maps a source file to its replacement. `Ok(None)` keeps the file as is.
pub type FileTransformer = Arc<dyn Fn(&Path) -> anyhow::Result<Option<Transformed>> + Send + Sync>;

// Keys that only matter to registries and tooling
const MODULE_MANIFEST_NOISE: &[&str] = &[
    "scripts",
    "devDependencies",
    "gitHead",
    "keywords",
    "build",
    "directories",
    "bugs",
    "contributors",
    "eslintConfig",
    "jspm",
    "nyc",
    "ava",
    "xo",
];

/// Creates the main application transformer.
///
/// The application manifest at `<src_dir>/package.json` gets
/// `extra_metadata` merged in; manifests of bundled node modules lose their
/// publishing-only keys. Every other file is handed to `framework`.
pub fn create_transformer(
    src_dir: &Path,
    extra_metadata: Option<serde_json::Value>,
    framework: Option<FileTransformer>,
) -> FileTransformer {
    let main_manifest = src_dir.join(APP_MANIFEST_FILE);
    let extra_metadata = extra_metadata.filter(|v| !v.is_null());

    Arc::new(move |file: &Path| {
        if file.file_name().is_some_and(|n| n == APP_MANIFEST_FILE) {
            if file == main_manifest {
                return modify_main_manifest(file, extra_metadata.as_ref());
            }
            if file.components().any(|c| c.as_os_str() == "node_modules") {
                return clean_module_manifest(file);
            }
        }
        match &framework {
            Some(transformer) => transformer(file),
            None => Ok(None),
        }
    })
}

/// Tries `first`, then `second`; the first transformer returning a result wins.
pub fn combined_transformer(
    first: Option<FileTransformer>,
    second: Option<FileTransformer>,
) -> Option<FileTransformer> {
    match (first, second) {
        (Some(first), Some(second)) => Some(Arc::new(move |file: &Path| match first(file)? {
            Some(result) => Ok(Some(result)),
            None => second(file),
        })),
        (first, second) => first.or(second),
    }
}

fn modify_main_manifest(
    file: &Path,
    extra_metadata: Option<&serde_json::Value>,
) -> anyhow::Result<Option<Transformed>> {
    let Some(extra) = extra_metadata else {
        return Ok(None);
    };
    let mut manifest: serde_json::Value = serde_json::from_slice(&std::fs::read(file)?)?;
    deep_merge(&mut manifest, extra);
    Ok(Some(Transformed::Content(serde_json::to_vec_pretty(&manifest)?)))
}

fn clean_module_manifest(file: &Path) -> anyhow::Result<Option<Transformed>> {
    let mut manifest: serde_json::Value = serde_json::from_slice(&std::fs::read(file)?)?;
    let Some(object) = manifest.as_object_mut() else {
        return Ok(None);
    };

    let before = object.len();
    object.retain(|key, _| !key.starts_with('_') && !MODULE_MANIFEST_NOISE.contains(&key.as_str()));
    if object.len() == before {
        return Ok(None);
    }
    Ok(Some(Transformed::Content(serde_json::to_vec_pretty(&manifest)?)))
}

/// Recursively merges `source` into `target`; objects merge, everything else is replaced.
pub fn deep_merge(target: &mut serde_json::Value, source: &serde_json::Value) {
    match (target, source) {
        (serde_json::Value::Object(target), serde_json::Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}
