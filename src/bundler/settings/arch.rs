//! CPU architecture types and utilities.

use std::fmt;
use std::str::FromStr;

/// CPU architecture of a packaged application.
///
/// The label returned by [`Arch::name`] is the fixed table used for
/// `${arch}` macro expansion and output directory suffixes.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_package::bundler::Arch;
///
/// assert_eq!(Arch::X64.name(), "x64");
/// assert_eq!(Arch::X64.artifact_name("deb"), "amd64");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 32-bit Intel
    Ia32,
    /// x86_64 / AMD64
    X64,
    /// 32-bit ARM with hard float
    Armv7l,
    /// AArch64 / ARM64
    Arm64,
    /// macOS universal binary (x64 + arm64)
    Universal,
}

impl Arch {
    /// All known architectures.
    pub const ALL: [Arch; 5] = [
        Arch::Ia32,
        Arch::X64,
        Arch::Armv7l,
        Arch::Arm64,
        Arch::Universal,
    ];

    /// Canonical label.
    pub fn name(self) -> &'static str {
        match self {
            Arch::Ia32 => "ia32",
            Arch::X64 => "x64",
            Arch::Armv7l => "armv7l",
            Arch::Arm64 => "arm64",
            Arch::Universal => "universal",
        }
    }

    /// Suffix appended to unpacked output directories (`linux-arm64-unpacked`).
    ///
    /// x64 is the default architecture and gets no suffix.
    pub fn suffix(self) -> String {
        match self {
            Arch::X64 => String::new(),
            other => format!("-{}", other.name()),
        }
    }

    /// Architecture name as expected by the distribution format `ext`.
    pub fn artifact_name(self, ext: &str) -> &'static str {
        let is_app_image = ext.eq_ignore_ascii_case("appimage");
        match self {
            Arch::X64 if is_app_image || ext == "rpm" || ext == "pacman" => "x86_64",
            Arch::X64 if ext == "deb" || ext == "snap" => "amd64",
            Arch::Ia32 if ext == "deb" || is_app_image || ext == "snap" => "i386",
            Arch::Ia32 if ext == "pacman" || ext == "rpm" => "i686",
            Arch::Armv7l if ext == "snap" || ext == "deb" => "armhf",
            Arch::Arm64 if is_app_image || ext == "rpm" || ext == "pacman" => "aarch64",
            other => other.name(),
        }
    }

    /// Architecture of the running host.
    pub fn host() -> Arch {
        match std::env::consts::ARCH {
            "x86" => Arch::Ia32,
            "aarch64" => Arch::Arm64,
            "arm" => Arch::Armv7l,
            _ => Arch::X64,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ia32" | "x86" | "i386" | "i686" => Ok(Arch::Ia32),
            "x64" | "x86_64" | "amd64" => Ok(Arch::X64),
            "armv7l" | "armhf" => Ok(Arch::Armv7l),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "universal" => Ok(Arch::Universal),
            other => Err(format!("unknown architecture: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_format_conventions() {
        assert_eq!(Arch::X64.artifact_name("AppImage"), "x86_64");
        assert_eq!(Arch::X64.artifact_name("zip"), "x64");
        assert_eq!(Arch::Ia32.artifact_name("rpm"), "i686");
        assert_eq!(Arch::Arm64.artifact_name("rpm"), "aarch64");
        assert_eq!(Arch::Armv7l.artifact_name("deb"), "armhf");
    }

    #[test]
    fn x64_has_no_suffix() {
        assert_eq!(Arch::X64.suffix(), "");
        assert_eq!(Arch::Arm64.suffix(), "-arm64");
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert!("sparc".parse::<Arch>().is_err());
    }
}
