//! Code signing configuration.
//!
//! Certificates themselves are handled by [`PlatformHooks::sign_app`](crate::bundler::PlatformHooks::sign_app);
//! this module only resolves where the certificate comes from and enforces
//! `force_code_signing`.

use crate::bundler::{Error, Result, settings::{Configuration, PlatformBuildOptions}};

/// Resolved code signing inputs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SigningConfig {
    /// Certificate link (file path, URL or base64)
    pub link: Option<String>,
    /// Certificate password, empty when not set
    pub password: String,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("link", &self.link.as_ref().map(|_| "<set>"))
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SigningConfig {
    /// Resolves signing inputs: configuration, then platform options, then
    /// the `CSC_LINK` / `CSC_KEY_PASSWORD` environment variables.
    ///
    /// Empty strings count as set, so a configuration can opt out of an
    /// environment-provided certificate.
    pub fn resolve(config: &Configuration, platform: &PlatformBuildOptions) -> Self {
        Self::resolve_with_env(config, platform, |name| std::env::var(name).ok())
    }

    fn resolve_with_env(
        config: &Configuration,
        platform: &PlatformBuildOptions,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let link = config
            .csc_link
            .clone()
            .or_else(|| platform.csc_link.clone())
            .or_else(|| env("CSC_LINK"));

        let password = config
            .csc_key_password
            .clone()
            .or_else(|| platform.csc_key_password.clone())
            .or_else(|| env("CSC_KEY_PASSWORD"));

        let password = match password {
            Some(p) if !p.trim().is_empty() => p.trim().to_string(),
            _ => {
                if link.is_some() {
                    log::info!("CSC_KEY_PASSWORD is not defined, empty password will be used for code signing");
                }
                String::new()
            }
        };

        Self {
            link: link.filter(|l| !l.trim().is_empty()),
            password,
        }
    }

    /// Fails when signing is forced but no certificate is configured.
    pub fn check(&self, force_code_signing: bool) -> Result<()> {
        if force_code_signing && self.link.is_none() {
            return Err(Error::Configuration(
                "code signing is forced (force_code_signing) but no certificate is configured (csc_link or CSC_LINK)"
                    .into(),
            ));
        }
        Ok(())
    }
}
