//! Static registry of selectable hardware projects and firmware versions.
//!
//! The catalog is read-only at runtime. It ships with a built-in set of
//! showcase projects and can be replaced by an external JSON file so the
//! project list can change without redeploying the engine.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub id: String,
    pub display_name: String,
    pub release_date: NaiveDate,
    pub description: String,
    /// Direct download URL for the firmware image. Versions without one
    /// require the user to supply a URL by hand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub display_name: String,
    pub chip_family: String,
    pub versions: Vec<FirmwareVersion>,
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.chip_family)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub projects: Vec<Project>,
}

impl Catalog {
    /// Load a catalog from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read catalog file {}: {}", path.display(), e))?;

        let catalog: Catalog = serde_json::from_str(&raw)
            .map_err(|e| format!("Failed to parse catalog file {}: {}", path.display(), e))?;

        debug!(
            "Loaded catalog with {} projects from {}",
            catalog.projects.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// The built-in showcase catalog.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN_CATALOG
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn version(&self, project_id: &str, version_id: &str) -> Option<&FirmwareVersion> {
        self.project(project_id)?
            .versions
            .iter()
            .find(|v| v.id == version_id)
    }
}

fn version(
    id: &str,
    display_name: &str,
    release_date: &str,
    description: &str,
    firmware_url: Option<&str>,
) -> FirmwareVersion {
    FirmwareVersion {
        id: id.to_string(),
        display_name: display_name.to_string(),
        release_date: release_date
            .parse()
            .expect("built-in release date must be YYYY-MM-DD"),
        description: description.to_string(),
        firmware_url: firmware_url.map(str::to_string),
    }
}

fn project(id: &str, display_name: &str, chip_family: &str, versions: Vec<FirmwareVersion>) -> Project {
    Project {
        id: id.to_string(),
        display_name: display_name.to_string(),
        chip_family: chip_family.to_string(),
        versions,
    }
}

static BUILTIN_CATALOG: Lazy<Catalog> = Lazy::new(|| Catalog {
    projects: vec![
        project(
            "esp32",
            "ESP32 Generic",
            "ESP32",
            vec![
                version("v2.0.14", "v2.0.14 (Stable)", "2023-11-20", "Latest stable release", None),
                version("v2.0.13", "v2.0.13 (Stable)", "2023-10-15", "Previous stable release", None),
                version("v3.0.0-beta", "v3.0.0-beta", "2024-01-10", "Beta release with new features", None),
            ],
        ),
        project(
            "esp8266",
            "ESP8266 Generic",
            "ESP8266",
            vec![
                version("v3.1.2", "v3.1.2 (Stable)", "2023-12-01", "Latest stable release", None),
                version("v3.1.1", "v3.1.1 (Stable)", "2023-10-20", "Previous stable release", None),
            ],
        ),
        project(
            "m5cardputer",
            "M5Stack Cardputer",
            "ESP32-S3",
            vec![
                version(
                    "6f63e83",
                    "UserDemo (6f63e83)",
                    "2024-01-15",
                    "Official M5Stack user demo",
                    Some("https://github.com/vs4vijay/iot-playground/releases/download/6f63e83/UserDemo-6f63e83.M5Cardputer.bin"),
                ),
                version("m5cardremote", "M5Card Remote", "2024-01-10", "IR remote control app", None),
                version("gameboy", "GameBoy Emulator", "2024-01-05", "Full GameBoy emulator", None),
            ],
        ),
        project(
            "m5stickc",
            "M5StickC Plus2",
            "ESP32-S3",
            vec![
                version("userdemo", "UserDemo", "2024-01-12", "Official M5StickC user demo", None),
                version("onebutton", "OneButton Demo", "2024-01-08", "Button interaction demo", None),
                version("evilclock", "Evil Clock", "2024-01-03", "WiFi security tool", None),
            ],
        ),
        project(
            "rpi-pico",
            "Raspberry Pi Pico",
            "RP2040",
            vec![
                version(
                    "latest",
                    "MicroPython Latest",
                    "2024-01-20",
                    "Latest MicroPython firmware",
                    Some("https://micropython.org/download/rp2-pico/rp2-pico-latest.uf2"),
                ),
                version("v1.22.0", "MicroPython v1.22.0", "2023-12-15", "Stable MicroPython release", None),
            ],
        ),
    ],
});
