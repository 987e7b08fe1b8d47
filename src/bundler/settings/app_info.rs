//! Application identity derived from the project metadata.

use crate::metadata::AppMetadata;

use super::Configuration;

/// Immutable snapshot of the application identity.
///
/// Built once per [`PlatformPackager`](crate::bundler::PlatformPackager) and
/// read by the macro expander and artifact naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Package name (`name` in the manifest)
    pub name: String,
    /// Human readable product name
    pub product_name: String,
    /// Version string
    pub version: String,
    /// Description, empty when absent
    pub description: String,
    /// Author / company name
    pub company_name: Option<String>,
    /// `name` with characters illegal in file names removed
    pub sanitized_name: String,
    /// `product_name` with characters illegal in file names removed
    pub product_filename: String,
    /// `product_name` reduced to the portable file name character set
    pub sanitized_product_name: String,
    /// Release channel from the version prerelease tag (`beta`, `alpha`)
    pub channel: Option<String>,
}

impl AppInfo {
    /// Derives the identity from metadata and configuration.
    ///
    /// Product name precedence: configuration, manifest `productName`,
    /// manifest `name`.
    pub fn new(metadata: &AppMetadata, config: &Configuration) -> Self {
        let product_name = config
            .product_name
            .clone()
            .or_else(|| metadata.product_name.clone())
            .unwrap_or_else(|| metadata.name.clone());

        let channel = semver::Version::parse(&metadata.version)
            .ok()
            .and_then(|v| {
                v.pre
                    .as_str()
                    .split('.')
                    .next()
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
            });

        Self {
            sanitized_name: sanitize_file_name(&metadata.name),
            product_filename: sanitize_file_name(&product_name),
            sanitized_product_name: portable_file_name(&product_name),
            name: metadata.name.clone(),
            version: metadata.version.clone(),
            description: metadata.description.clone().unwrap_or_default(),
            company_name: metadata.author_name(),
            channel,
            product_name,
        }
    }
}

/// Removes characters that no supported filesystem accepts in a file name.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>'))
        .collect();
    cleaned.trim_end_matches(['.', ' ']).to_string()
}

/// Replaces every character outside `[A-Za-z0-9._-]` with a dash.
pub fn portable_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(name: &str, version: &str) -> AppMetadata {
        AppMetadata {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    #[test]
    fn product_name_prefers_configuration() {
        let mut meta = metadata("foo", "1.0.0");
        meta.product_name = Some("Foo".into());
        let config = Configuration {
            product_name: Some("Foo App".into()),
            ..Default::default()
        };
        let info = AppInfo::new(&meta, &config);
        assert_eq!(info.product_name, "Foo App");
        assert_eq!(info.product_filename, "Foo App");
        assert_eq!(info.sanitized_product_name, "Foo-App");
    }

    #[test]
    fn channel_comes_from_prerelease() {
        let info = AppInfo::new(&metadata("foo", "2.0.0-beta.3"), &Configuration::default());
        assert_eq!(info.channel.as_deref(), Some("beta"));

        let info = AppInfo::new(&metadata("foo", "2.0.0"), &Configuration::default());
        assert_eq!(info.channel, None);
    }

    #[test]
    fn sanitizes_illegal_characters() {
        assert_eq!(sanitize_file_name("a/b:c*d."), "abcd");
        assert_eq!(portable_file_name("Ünï App"), "-n--App");
    }
}
