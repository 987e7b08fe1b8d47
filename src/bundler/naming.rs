//! Artifact file naming helpers.

use super::AppInfo;
use regex::Regex;
use std::sync::LazyLock;

static SAFE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z._-]+$").expect("safe name regex is valid"));

static WINDOWS_DIR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-_+0-9a-zA-Z .]+$").expect("dir name regex is valid"));

/// Default artifact pattern.
pub const DEFAULT_ARTIFACT_PATTERN: &str = "${productName}-${version}-${arch}.${ext}";

/// Pattern for human facing artifact names.
pub const BEAUTY_ARTIFACT_PATTERN: &str = "${productName} ${version} ${arch}.${ext}";

/// Pattern used when a name must be safe for release hosting.
pub const SAFE_ARTIFACT_PATTERN: &str = "${name}-${version}-${arch}.${ext}";

/// Whether `name` only contains characters release hosts accept.
pub fn is_safe_github_name(name: &str) -> bool {
    SAFE_NAME.is_match(name)
}

/// Computes a hosting-safe variant of `suggested`.
///
/// Returns `None` when `suggested` is already safe. When spaces are the only
/// problem they become dashes; otherwise `producer` supplies the name.
pub fn compute_safe_artifact_name_if_needed<F>(suggested: Option<&str>, producer: F) -> Option<String>
where
    F: FnOnce() -> Option<String>,
{
    if let Some(suggested) = suggested {
        if is_safe_github_name(suggested) {
            return None;
        }

        let dashed = suggested.replace(' ', "-");
        if is_safe_github_name(&dashed) {
            return Some(dashed);
        }
    }

    producer()
}

/// Strips a leading dot from an extension.
pub fn normalize_ext(ext: &str) -> &str {
    ext.strip_prefix('.').unwrap_or(ext)
}

/// Builds `<name><sep><version>[<sep><classifier>][.<ext>]`.
///
/// Debian packages use `_` as separator, everything else `-`. Deployment
/// names use the package name, others the product file name.
pub fn generate_name2(
    app_info: &AppInfo,
    ext: Option<&str>,
    classifier: Option<&str>,
    deployment: bool,
) -> String {
    let separator = if ext == Some("deb") { "_" } else { "-" };
    let base = if deployment {
        &app_info.name
    } else {
        &app_info.product_filename
    };

    let mut name = format!("{base}{separator}{}", app_info.version);
    if let Some(classifier) = classifier {
        name.push_str(separator);
        name.push_str(classifier);
    }
    if let Some(ext) = ext {
        name.push('.');
        name.push_str(ext);
    }
    name
}

/// Installation directory name on Windows.
pub fn windows_installation_dir_name(app_info: &AppInfo, try_product_name: bool) -> String {
    if try_product_name && WINDOWS_DIR_NAME.is_match(&app_info.product_filename) {
        app_info.product_filename.clone()
    } else {
        app_info.sanitized_name.clone()
    }
}
