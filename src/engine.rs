//! Selection and validation engine.
//!
//! Owns the user's in-progress choices (project, version, candidate
//! firmware URL, connection and busy flags) and exposes the transition
//! operations that keep them consistent. All operations are total; bad
//! input clears or ignores, it never panics. The engine is event-source
//! agnostic: the CLI (or any other frontend) calls these operations and
//! renders the results.

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::flasher::{self, FlashError, FlashEvent, FlashHandle, FlashStage, FLASH_STAGES};
use crate::validation::{UrlCheck, validate_firmware_url};

/// The mutable core entity. Created empty, never persisted.
///
/// Invariants upheld by the engine:
/// - `selected_version` is only set when `selected_project` is set and
///   the version exists under that project;
/// - `busy` implies `connected` and a validated `candidate_url`;
/// - clearing the project clears the version and the candidate URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub selected_project: Option<String>,
    pub selected_version: Option<String>,
    pub candidate_url: Option<String>,
    pub connected: bool,
    pub busy: bool,
}

/// Untrusted bootstrap input, e.g. from CLI flags or a shared link's
/// query parameters. Applied through the regular transition operations,
/// so it cannot bypass URL validation.
#[derive(Debug, Clone, Default)]
pub struct SelectionSeed {
    pub project: Option<String>,
    pub version: Option<String>,
    pub firmware: Option<String>,
}

pub struct SelectionEngine {
    catalog: Catalog,
    state: SelectionState,
}

impl SelectionEngine {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            state: SelectionState::default(),
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Selects a project. An empty or unknown id clears the whole
    /// selection; a known id forces a fresh version pick.
    pub fn select_project(&mut self, id: &str) {
        match self.catalog.project(id) {
            Some(project) => {
                debug!("Selected project: {}", project.display_name);
                self.state.selected_project = Some(id.to_string());
            }
            None => {
                if !id.is_empty() {
                    warn!("Unknown project id: {}", id);
                }
                self.state.selected_project = None;
            }
        }
        self.state.selected_version = None;
        self.state.candidate_url = None;
    }

    /// Selects a version under the current project. No-op without a
    /// project; unknown version ids are ignored. A version that carries
    /// a firmware URL pre-fills the candidate URL through the validator;
    /// one without leaves the candidate untouched.
    pub fn select_version(&mut self, id: &str) {
        let Some(project_id) = self.state.selected_project.clone() else {
            return;
        };
        let Some(version) = self.catalog.version(&project_id, id) else {
            if !id.is_empty() {
                warn!("Unknown version {} for project {}", id, project_id);
            }
            return;
        };

        debug!("Selected version: {} - {}", version.display_name, version.description);
        let firmware_url = version.firmware_url.clone();
        self.state.selected_version = Some(id.to_string());

        if let Some(url) = firmware_url {
            self.set_candidate_url(&url);
        }
    }

    /// Validates `text` and stores it as the candidate URL on success.
    /// Empty input clears the candidate and returns `None`; otherwise
    /// the validation outcome is returned for the caller to render.
    pub fn set_candidate_url(&mut self, text: &str) -> Option<UrlCheck> {
        let text = text.trim();
        if text.is_empty() {
            self.state.candidate_url = None;
            return None;
        }

        let check = validate_firmware_url(text);
        if check.is_ok() {
            if check.insecure_transport {
                warn!("Using unencrypted HTTP connection, HTTPS is recommended");
            }
            info!("Firmware URL validated: {}", text);
            self.state.candidate_url = Some(text.to_string());
        } else {
            warn!("Rejected firmware URL ({}): {}", check.verdict, text);
            self.state.candidate_url = None;
        }
        Some(check)
    }

    /// Records the connection flag maintained by the device link.
    /// Dropping the connection also drops `busy`: a flash cannot
    /// continue without a device.
    pub fn set_connected(&mut self, connected: bool) {
        self.state.connected = connected;
        if !connected {
            self.state.busy = false;
        }
    }

    /// A connection attempt is only offered once a firmware URL has
    /// validated. This mirrors the showcase page's behavior; see
    /// DESIGN.md for why it is kept.
    pub fn can_connect(&self) -> bool {
        self.state.candidate_url.is_some()
    }

    pub fn can_flash(&self) -> bool {
        self.state.candidate_url.is_some() && self.state.connected && !self.state.busy
    }

    /// Starts the simulated flash sequence.
    pub fn start_flash(&mut self) -> Result<FlashHandle, FlashError> {
        self.start_flash_with(FLASH_STAGES)
    }

    /// Starts a flash sequence over a caller-provided stage table. Fails
    /// without touching state when the enablement rules say no.
    pub fn start_flash_with(
        &mut self,
        stages: &'static [FlashStage],
    ) -> Result<FlashHandle, FlashError> {
        if !self.can_flash() {
            warn!("Flash start rejected, preconditions not met");
            return Err(FlashError::PreconditionFailed);
        }

        info!("Starting firmware flash process");
        self.state.busy = true;
        Ok(flasher::start(stages))
    }

    /// Folds a runner event back into the selection state. Terminal
    /// events clear `busy`; progress events are for display only.
    pub fn apply_flash_event(&mut self, event: &FlashEvent) {
        if event.is_terminal() {
            self.state.busy = false;
        }
        match event {
            FlashEvent::Progress { label, percent, .. } => {
                debug!("{} ({}%)", label, percent);
            }
            FlashEvent::Completed => info!("Firmware flashed successfully"),
            FlashEvent::Cancelled => warn!("Flashing cancelled by user"),
            FlashEvent::Failed(error) => warn!("Flashing failed: {}", error),
        }
    }

    /// Applies bootstrap input in project → version → firmware order so
    /// an explicit firmware URL wins over a version's pre-filled one.
    pub fn apply_seed(&mut self, seed: &SelectionSeed) {
        if let Some(project) = &seed.project {
            self.select_project(project);
        }
        if let Some(version) = &seed.version {
            self.select_version(version);
        }
        if let Some(firmware) = &seed.firmware {
            self.set_candidate_url(firmware);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::UrlVerdict;
    use std::time::Duration;

    fn engine() -> SelectionEngine {
        SelectionEngine::new(Catalog::builtin().clone())
    }

    const SHORT_STAGES: &[FlashStage] = &[
        FlashStage {
            progress_percent: 50,
            label: "Writing firmware...",
            nominal_duration: Duration::from_millis(5),
        },
        FlashStage {
            progress_percent: 100,
            label: "Complete!",
            nominal_duration: Duration::from_millis(5),
        },
    ];

    #[test]
    fn test_unknown_project_clears_selection() {
        let mut engine = engine();
        engine.select_project("esp32");
        engine.select_version("v2.0.14");
        engine.set_candidate_url("https://example.com/fw.bin");

        engine.select_project("unknown-id");
        assert_eq!(engine.state(), &SelectionState::default());
    }

    #[test]
    fn test_selecting_project_forces_fresh_version_pick() {
        let mut engine = engine();
        engine.select_project("rpi-pico");
        engine.select_version("latest");
        assert!(engine.state().candidate_url.is_some());

        engine.select_project("esp32");
        assert_eq!(engine.state().selected_project.as_deref(), Some("esp32"));
        assert!(engine.state().selected_version.is_none());
        assert!(engine.state().candidate_url.is_none());
    }

    #[test]
    fn test_select_version_without_project_is_a_no_op() {
        let mut engine = engine();
        engine.select_version("latest");
        assert_eq!(engine.state(), &SelectionState::default());
    }

    #[test]
    fn test_version_with_url_prefills_candidate() {
        let mut engine = engine();
        engine.select_project("rpi-pico");
        engine.select_version("latest");

        let url = engine.state().candidate_url.as_deref().unwrap();
        assert!(url.ends_with("rp2-pico-latest.uf2"));
        assert!(engine.can_connect());
    }

    #[test]
    fn test_version_without_url_keeps_candidate_untouched() {
        let mut engine = engine();
        engine.select_project("esp32");
        engine.set_candidate_url("https://example.com/custom.bin");

        engine.select_version("v2.0.14");
        assert_eq!(
            engine.state().candidate_url.as_deref(),
            Some("https://example.com/custom.bin")
        );
        assert_eq!(engine.state().selected_version.as_deref(), Some("v2.0.14"));
    }

    #[test]
    fn test_unknown_version_is_ignored() {
        let mut engine = engine();
        engine.select_project("esp32");
        engine.select_version("v99.99.99");
        assert!(engine.state().selected_version.is_none());
    }

    #[test]
    fn test_rejected_url_clears_candidate() {
        let mut engine = engine();
        engine.set_candidate_url("https://example.com/fw.bin");
        assert!(engine.can_connect());

        let check = engine.set_candidate_url("https://example.com/fw.zip").unwrap();
        assert_eq!(check.verdict, UrlVerdict::UnsupportedExtension);
        assert!(engine.state().candidate_url.is_none());
        assert!(!engine.can_connect());
    }

    #[test]
    fn test_empty_url_clears_candidate() {
        let mut engine = engine();
        engine.set_candidate_url("https://example.com/fw.bin");
        assert!(engine.set_candidate_url("").is_none());
        assert!(engine.state().candidate_url.is_none());
    }

    #[test]
    fn test_can_flash_requires_connection() {
        let mut engine = engine();
        engine.set_candidate_url("https://example.com/fw.bin");
        assert!(!engine.can_flash());

        engine.set_connected(true);
        assert!(engine.can_flash());
    }

    #[test]
    fn test_disconnect_forces_busy_off_and_is_idempotent() {
        let mut engine = engine();
        engine.set_candidate_url("https://example.com/fw.bin");
        engine.set_connected(true);
        engine.state.busy = true;

        engine.set_connected(false);
        let after_once = engine.state().clone();
        assert!(!after_once.busy);
        assert!(!after_once.connected);

        engine.set_connected(false);
        assert_eq!(engine.state(), &after_once);
    }

    #[test]
    fn test_seed_goes_through_validation() {
        let mut engine = engine();
        engine.apply_seed(&SelectionSeed {
            project: Some("esp32".to_string()),
            version: Some("v2.0.14".to_string()),
            firmware: Some("https://evil.example/payload.exe".to_string()),
        });

        assert_eq!(engine.state().selected_project.as_deref(), Some("esp32"));
        assert_eq!(engine.state().selected_version.as_deref(), Some("v2.0.14"));
        // Bad firmware parameter must not slip past the validator.
        assert!(engine.state().candidate_url.is_none());
    }

    #[test]
    fn test_seed_firmware_overrides_version_prefill() {
        let mut engine = engine();
        engine.apply_seed(&SelectionSeed {
            project: Some("rpi-pico".to_string()),
            version: Some("latest".to_string()),
            firmware: Some("https://example.com/custom.uf2".to_string()),
        });
        assert_eq!(
            engine.state().candidate_url.as_deref(),
            Some("https://example.com/custom.uf2")
        );
    }

    #[tokio::test]
    async fn test_start_flash_rejected_without_preconditions() {
        let mut engine = engine();
        let before = engine.state().clone();

        let result = engine.start_flash();
        assert!(matches!(result, Err(FlashError::PreconditionFailed)));
        assert_eq!(engine.state(), &before);
    }

    #[tokio::test]
    async fn test_start_flash_rejected_while_busy() {
        let mut engine = engine();
        engine.set_candidate_url("https://example.com/fw.bin");
        engine.set_connected(true);

        let _handle = engine.start_flash_with(SHORT_STAGES).unwrap();
        assert!(engine.state().busy);
        assert!(matches!(
            engine.start_flash_with(SHORT_STAGES),
            Err(FlashError::PreconditionFailed)
        ));
    }

    #[tokio::test]
    async fn test_full_flash_run_clears_busy() {
        let mut engine = engine();
        engine.set_candidate_url("https://example.com/fw.bin");
        engine.set_connected(true);

        let mut handle = engine.start_flash_with(SHORT_STAGES).unwrap();
        assert!(engine.state().busy);

        let mut progress_events = 0;
        while let Some(event) = handle.next_event().await {
            engine.apply_flash_event(&event);
            match event {
                FlashEvent::Progress { .. } => progress_events += 1,
                FlashEvent::Completed => break,
                other => panic!("unexpected event: {:?}", other),
            }
        }

        assert_eq!(progress_events, SHORT_STAGES.len());
        assert!(!engine.state().busy);
        assert!(engine.can_flash());
    }

    #[tokio::test]
    async fn test_cancelled_flash_clears_busy() {
        let mut engine = engine();
        engine.set_candidate_url("https://example.com/fw.bin");
        engine.set_connected(true);

        let mut handle = engine.start_flash_with(SHORT_STAGES).unwrap();
        handle.cancel();

        while let Some(event) = handle.next_event().await {
            engine.apply_flash_event(&event);
            if event.is_terminal() {
                assert_eq!(event, FlashEvent::Cancelled);
            }
        }
        assert!(!engine.state().busy);
    }
}
