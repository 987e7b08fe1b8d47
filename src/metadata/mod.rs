//! Application manifest and build configuration loading.

use crate::bundler::{Configuration, Error, ErrorExt, Result};
use serde::Deserialize;
use std::path::Path;

/// File name of the application manifest.
pub const APP_MANIFEST_FILE: &str = "package.json";

/// File name of the standalone build configuration.
pub const CONFIG_FILE: &str = "kodegen-package.toml";

/// Application metadata read from `package.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    /// Package name
    #[serde(default)]
    pub name: String,

    /// Version string (e.g. "1.2.3")
    #[serde(default)]
    pub version: String,

    /// Human readable product name
    #[serde(default)]
    pub product_name: Option<String>,

    /// Package description
    #[serde(default)]
    pub description: Option<String>,

    /// Entry file of the application, relative to the app dir
    #[serde(default)]
    pub main: Option<String>,

    /// Author, either `"Name <email>"` or `{ "name": ... }`
    #[serde(default)]
    pub author: Option<serde_json::Value>,

    /// Embedded build configuration
    #[serde(default)]
    pub build: Option<serde_json::Value>,
}

impl AppMetadata {
    /// Author name without the e-mail / url decorations.
    pub fn author_name(&self) -> Option<String> {
        let name = match self.author.as_ref()? {
            serde_json::Value::String(s) => s
                .split(['<', '('])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
            serde_json::Value::Object(map) => map.get("name")?.as_str()?.trim().to_string(),
            _ => return None,
        };
        (!name.is_empty()).then_some(name)
    }
}

/// Manifest and configuration of a project.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    /// Application metadata
    pub metadata: AppMetadata,

    /// Build configuration
    pub config: Configuration,
}

/// Reads `package.json` from `app_dir`.
pub fn read_app_metadata(app_dir: &Path) -> Result<AppMetadata> {
    let path = app_dir.join(APP_MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).fs_context("reading application manifest", &path)?;
    let metadata: AppMetadata = serde_json::from_str(&content)?;
    Ok(metadata)
}

/// Loads metadata and configuration of the project at `project_dir`.
///
/// Configuration comes from `kodegen-package.toml` when present, otherwise
/// from the `build` key of `package.json`. The metadata is validated with
/// [`check_metadata`].
pub fn load_manifest(project_dir: &Path) -> Result<ProjectManifest> {
    let metadata = read_app_metadata(project_dir)?;

    let config_path = project_dir.join(CONFIG_FILE);
    let config = if config_path.is_file() {
        log::debug!("Loading configuration from {}", config_path.display());
        let content =
            std::fs::read_to_string(&config_path).fs_context("reading configuration", &config_path)?;
        toml::from_str(&content)?
    } else if let Some(build) = metadata.build.clone() {
        log::debug!("Loading configuration from the build key of {APP_MANIFEST_FILE}");
        serde_json::from_value(build)?
    } else {
        Configuration::default()
    };

    check_metadata(&metadata, &project_dir.join(APP_MANIFEST_FILE))?;

    Ok(ProjectManifest { metadata, config })
}

/// Validates that the mandatory metadata is present.
///
/// Missing `name` or `version` is a configuration error listing every
/// problem; missing description and author are only warnings.
pub fn check_metadata(metadata: &AppMetadata, manifest_path: &Path) -> Result<()> {
    let mut errors = Vec::new();

    for (field, value) in [("name", &metadata.name), ("version", &metadata.version)] {
        if value.trim().is_empty() {
            errors.push(format!(
                "Please specify '{}' in the {} ({})",
                field,
                APP_MANIFEST_FILE,
                manifest_path.display()
            ));
        }
    }

    if metadata.description.as_deref().is_none_or(|d| d.trim().is_empty()) {
        log::warn!("description is missed in {}", manifest_path.display());
    }
    if metadata.author.is_none() {
        log::warn!("author is missed in {}", manifest_path.display());
    }

    if !metadata.version.trim().is_empty() && semver::Version::parse(&metadata.version).is_err() {
        log::warn!(
            "version {:?} is not a valid semantic version, release channel detection is disabled",
            metadata.version
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Configuration(errors.join("\n")))
    }
}
