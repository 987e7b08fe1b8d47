//! `${field}` template expansion for artifact names and file patterns.

use super::{AppInfo, Error, Result};
use regex::{Captures, Regex};
use std::{collections::HashMap, sync::LazyLock};

static MACRO_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([_a-zA-Z./*+]+)\}").expect("macro token regex is valid")
});

// `${arch}` together with the separator that would be left dangling
static ARCH_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{arch\}[-_ ]|[-_ /]\$\{arch\}|\$\{arch\}").expect("arch token regex is valid")
});

/// Extra fields available to a single expansion (`ext`, `os`, ...).
pub type MacroFields = HashMap<String, String>;

/// Expands every `${field}` token in `pattern`.
///
/// Known fields are `name`, `productName`, `version`, `description`,
/// `author`, `arch`, `os`, `platform`, `channel` and `env.NAME`; everything
/// else is looked up in `extra`. An unknown field is a configuration error.
///
/// When `arch` is `None` the `${arch}` token disappears together with one
/// adjacent separator, so `${name}-${arch}-${version}` becomes
/// `${name}-${version}`.
///
/// With `sanitize` set, `${productName}` expands to the product name reduced
/// to portable file name characters; other fields are never altered.
///
/// # Examples
///
/// ```
/// # use kodegen_bundler_package::bundler::{AppInfo, Configuration, expand_macro};
/// # use kodegen_bundler_package::metadata::AppMetadata;
/// # use std::collections::HashMap;
/// let meta = AppMetadata { name: "foo".into(), version: "1.2.3".into(), ..Default::default() };
/// let config = Configuration { product_name: Some("Foo App".into()), ..Default::default() };
/// let info = AppInfo::new(&meta, &config);
///
/// let extra = HashMap::from([("ext".to_string(), "zip".to_string())]);
/// let name = expand_macro("${productName}-${version}.${ext}", None, &info, &extra, true).unwrap();
/// assert_eq!(name, "Foo-App-1.2.3.zip");
/// ```
pub fn expand_macro(
    pattern: &str,
    arch: Option<&str>,
    app_info: &AppInfo,
    extra: &MacroFields,
    sanitize: bool,
) -> Result<String> {
    let stripped;
    let source = if arch.is_none() {
        stripped = ARCH_TOKEN.replace_all(pattern, "");
        stripped.as_ref()
    } else {
        pattern
    };

    let mut failure = None;
    let expanded = MACRO_TOKEN.replace_all(source, |caps: &Captures<'_>| {
        match resolve_field(&caps[1], arch, app_info, extra, sanitize) {
            Some(value) => value,
            None => {
                failure.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });

    if let Some(field) = failure {
        return Err(Error::Configuration(format!(
            "cannot expand pattern \"{pattern}\": macro {field} is not defined"
        )));
    }

    Ok(expanded.into_owned())
}

fn resolve_field(
    field: &str,
    arch: Option<&str>,
    app_info: &AppInfo,
    extra: &MacroFields,
    sanitize: bool,
) -> Option<String> {
    let value = match field {
        "productName" if sanitize => app_info.sanitized_product_name.clone(),
        "productName" => app_info.product_name.clone(),
        "name" => app_info.name.clone(),
        "version" => app_info.version.clone(),
        "description" => app_info.description.clone(),
        "arch" => arch.unwrap_or_default().to_string(),
        "author" => app_info.company_name.clone()?,
        "platform" => host_platform().to_string(),
        "channel" => app_info.channel.clone().unwrap_or_else(|| "latest".into()),
        _ => {
            if let Some(value) = extra.get(field) {
                return Some(value.clone());
            }
            let name = field.strip_prefix("env.")?;
            std::env::var(name).ok()?
        }
    };
    Some(value)
}

fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}
