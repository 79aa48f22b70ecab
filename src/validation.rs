//! Validation rules for user-supplied firmware URLs.

use std::fmt;

/// Firmware file extensions accepted by the flasher.
///
/// Different platforms use different formats: ESP32/ESP8266 ship `.bin`,
/// the RP2040 bootloader takes `.uf2`, Arduino toolchains emit `.hex`
/// and some platforms flash raw `.elf` images.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = [".bin", ".uf2", ".hex", ".elf"];

/// Outcome of a single URL validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlVerdict {
    Valid,
    /// Does not parse as an absolute URL at all.
    Malformed,
    /// Parses, but the scheme is not `http` or `https`.
    UnsupportedScheme,
    /// The path does not end in an accepted firmware extension.
    UnsupportedExtension,
}

impl fmt::Display for UrlVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlVerdict::Valid => write!(f, "valid firmware URL"),
            UrlVerdict::Malformed => write!(f, "invalid URL format"),
            UrlVerdict::UnsupportedScheme => write!(f, "only HTTP/HTTPS URLs are supported"),
            UrlVerdict::UnsupportedExtension => write!(
                f,
                "invalid firmware file, expected .bin, .uf2, .hex, or .elf"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlCheck {
    pub verdict: UrlVerdict,
    /// Set when the URL validated but uses plain `http`. The transfer
    /// would be unencrypted; callers should surface an advisory, not an
    /// error.
    pub insecure_transport: bool,
}

impl UrlCheck {
    pub fn is_ok(&self) -> bool {
        self.verdict == UrlVerdict::Valid
    }

    fn rejected(verdict: UrlVerdict) -> Self {
        Self {
            verdict,
            insecure_transport: false,
        }
    }
}

/// Validates a candidate firmware URL.
///
/// Rules are applied in order and the first failure wins: the candidate
/// must look like an absolute URL, the scheme must be HTTP(S), and the
/// query-stripped path must end in one of [`ACCEPTED_EXTENSIONS`]
/// (matched case-insensitively). Pure function, no side effects; the
/// caller decides what to write into the selection state.
pub fn validate_firmware_url(candidate: &str) -> UrlCheck {
    let trimmed = candidate.trim();

    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return UrlCheck::rejected(UrlVerdict::Malformed);
    };
    if scheme.is_empty() || rest.is_empty() || trimmed.contains(' ') {
        return UrlCheck::rejected(UrlVerdict::Malformed);
    }

    let scheme = scheme.to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return UrlCheck::rejected(UrlVerdict::UnsupportedScheme);
    }

    // Query parameters never count towards the extension check.
    let path = trimmed.split('?').next().unwrap_or(trimmed);
    let extension = match path.rfind('.') {
        Some(index) => path[index..].to_ascii_lowercase(),
        None => String::new(),
    };

    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return UrlCheck::rejected(UrlVerdict::UnsupportedExtension);
    }

    UrlCheck {
        verdict: UrlVerdict::Valid,
        insecure_transport: scheme == "http",
    }
}
