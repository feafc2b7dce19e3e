//! Studio assets: the static material the prompt composer draws from.
//!
//! Loaded once at process start from the configured assets directory and
//! treated as read-only for the lifetime of the process. Every asset is
//! optional — a missing file degrades the prompt by omitting a section,
//! it never fails startup.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// File names expected inside the assets directory.
const EXAMPLE_FILE: &str = "reference_example.html";
const LEARNED_FILE: &str = "learned_design.json";
const VIRAL_FILE: &str = "viral_formula.md";
const DESIGN_FILE: &str = "design_specs.md";

/// Design facts distilled from analysed premium references.
///
/// Produced out-of-band (an image-analysis side channel writes
/// `learned_design.json`); this process only ever reads it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LearnedDesignProfile {
    pub palette: HashMap<String, String>,
    pub typography: TypographyProfile,
    pub layout: LayoutProfile,
    pub decorative: Vec<String>,
    pub highlights: Vec<String>,
    pub best_practices: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypographyProfile {
    pub title_size: Option<String>,
    pub body_size: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutProfile {
    pub placement: Option<String>,
}

/// The full read-only asset set. Construct with [`StudioAssets::load`]
/// at startup and share via `Arc`; [`StudioAssets::default`] (all absent)
/// is valid and useful in tests.
#[derive(Debug, Clone, Default)]
pub struct StudioAssets {
    /// Verbatim reference markup shown to the model as the quality bar.
    pub example_markup: Option<String>,
    /// Learned design profile, if the side-channel artifact exists.
    pub learned: Option<LearnedDesignProfile>,
    /// Viral card-news formula document.
    pub viral_formula: Option<String>,
    /// Typography/layout design-spec document.
    pub design_specs: Option<String>,
}

impl StudioAssets {
    /// Load all assets found under `dir`. Missing or unreadable files are
    /// logged and skipped.
    pub fn load(dir: &Path) -> Self {
        let example_markup = read_optional(dir, EXAMPLE_FILE);
        let viral_formula = read_optional(dir, VIRAL_FILE);
        let design_specs = read_optional(dir, DESIGN_FILE);

        let learned = read_optional(dir, LEARNED_FILE).and_then(|content| {
            match serde_json::from_str::<LearnedDesignProfile>(&content) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(error = %e, "learned_design.json is not valid, ignoring");
                    None
                }
            }
        });

        info!(
            example = example_markup.is_some(),
            learned = learned.is_some(),
            viral = viral_formula.is_some(),
            design = design_specs.is_some(),
            "Studio assets loaded"
        );

        Self {
            example_markup,
            learned,
            viral_formula,
            design_specs,
        }
    }

    /// Short human-readable load summary, e.g. `3 of 4 assets loaded`.
    pub fn summary(&self) -> String {
        let loaded = [
            self.example_markup.is_some(),
            self.learned.is_some(),
            self.viral_formula.is_some(),
            self.design_specs.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        format!("{loaded} of 4 assets loaded")
    }
}

fn read_optional(dir: &Path, name: &str) -> Option<String> {
    let path = dir.join(name);
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(content) if !content.trim().is_empty() => Some(content),
        Ok(_) => None,
        Err(e) => {
            warn!(file = name, error = %e, "Failed to read asset file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_yields_empty_assets() {
        let assets = StudioAssets::load(Path::new("/nonexistent/assets"));
        assert!(assets.example_markup.is_none());
        assert!(assets.learned.is_none());
        assert!(assets.viral_formula.is_none());
        assert!(assets.design_specs.is_none());
    }

    #[test]
    fn loads_present_files_and_tolerates_bad_profile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(EXAMPLE_FILE), "<html>demo</html>").unwrap();
        std::fs::write(dir.path().join(LEARNED_FILE), "{not json").unwrap();

        let assets = StudioAssets::load(dir.path());
        assert_eq!(assets.example_markup.as_deref(), Some("<html>demo</html>"));
        assert!(assets.learned.is_none());
    }

    #[test]
    fn learned_profile_deserializes_partial_fields() {
        let json = r#"{
            "typography": {"titleSize": "100px"},
            "decorative": ["soft blobs", "thin rules"]
        }"#;
        let profile: LearnedDesignProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.typography.title_size.as_deref(), Some("100px"));
        assert_eq!(profile.decorative.len(), 2);
        assert!(profile.highlights.is_empty());
    }
}
