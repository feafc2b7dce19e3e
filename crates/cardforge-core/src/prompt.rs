//! Prompt composition for card-news generation.
//!
//! One composer, one prompt: every provider receives byte-identical
//! prompt content and differs only in how its request/response envelope
//! is shaped. Sections are concatenated in a fixed order and optional
//! sections (reference example, learned design, rule documents,
//! background directive) simply drop out when their source is absent —
//! composition never fails.

use std::fmt::Write;

use crate::assets::StudioAssets;

/// Composes the generation prompt from the user's (research-expanded)
/// text plus the studio assets loaded at startup.
pub struct PromptComposer {
    assets: StudioAssets,
}

impl PromptComposer {
    pub fn new(assets: StudioAssets) -> Self {
        Self { assets }
    }

    /// Build the full prompt for `slide_count` slides.
    ///
    /// `bg_image_url`, when present, adds a priority directive to apply
    /// that image as the cover-slide background under a gradient overlay.
    pub fn compose(&self, text: &str, slide_count: u32, bg_image_url: Option<&str>) -> String {
        let mut p = String::with_capacity(4096);

        p.push_str(
            "You are a world-class creative director and frontend developer \
             specialized in high-end Instagram card news.\n\
             Your mission is to generate HTML/CSS that looks like it was \
             designed by a top-tier global agency and renders flawlessly.\n",
        );

        if let Some(example) = &self.assets.example_markup {
            let _ = write!(
                p,
                "\n=== THE REFERENCE (study for technique, NOT for direct copying) ===\n\
                 The following code represents the minimum viable premium quality.\n\
                 Analyze its use of layers, gradients, typography, and brand-aligned footers.\n\
                 ```html\n{example}\n```\n"
            );
        }

        // Learned design facts; generic placeholders when a field was
        // never learned so the section stays well-formed.
        if let Some(learned) = &self.assets.learned {
            let title = learned.typography.title_size.as_deref().unwrap_or("100px");
            let body = learned.typography.body_size.as_deref().unwrap_or("40px");
            let placement = learned.layout.placement.as_deref().unwrap_or("centered");
            let _ = write!(
                p,
                "\n=== LEARNED DESIGN KNOW-HOW (MUST FOLLOW) ===\n\
                 The system has analyzed premium references. Implement these patterns:\n\
                 - DECORATION: {}\n\
                 - HIGHLIGHTS: {}\n\
                 - BEST PRACTICES: {}\n\
                 - LAYOUT: {}\n\
                 - TYPOGRAPHY: titles around {}, body around {}\n",
                learned.decorative.join(", "),
                learned.highlights.join(", "),
                learned.best_practices.join(", "),
                placement,
                title,
                body,
            );
        }

        if self.assets.viral_formula.is_some() {
            p.push_str(
                "\n=== VIRAL CARD-NEWS FORMULA (MUST APPLY) ===\n\
                 1. Cover slide hooks attention in 3 seconds: a number (\"N ways\"), \
                 a question (\"why does ...?\"), or a strong keyword.\n\
                 2. One slide = one message. At most 3 lines of body text.\n\
                 3. Saveable, practical content: guides, checklists, how-to framing.\n\
                 4. Problem-then-solution structure the reader recognises themselves in.\n\
                 5. Shareable angle: health, wealth, relationships, or fun.\n\
                 6. Intuitive design: key keywords first, clean layout over ornament.\n\
                 7. The last slide MUST carry a call to action (save / follow / DM).\n",
            );
        }

        if self.assets.design_specs.is_some() {
            p.push_str(
                "\n=== DESIGN SPECS (MUST FOLLOW) ===\n\
                 - Cover title: 60px or larger, bold/extra-bold, left-aligned preferred.\n\
                 - Section titles: 45px, bold. Body: 28px, light, max 3 lines.\n\
                 - Source/brand line: 15-25px, light.\n\
                 - Place a translucent gradient overlay over images for readability.\n\
                 - Text color: white first.\n",
            );
        }

        let _ = write!(p, "\n=== CONTENT SOURCE ===\nRESEARCH DATA: \"{text}\"\n");

        let _ = write!(
            p,
            "\n=== HARD CONSTRAINTS (harmony & safety) ===\n\
             1. OVERFLOW PROTECTION: use `* {{ box-sizing: border-box; \
             overflow-wrap: break-word; }}`; long titles drop to 90px instead of 120px; \
             strict `padding: 80px 100px;` — content never touches the edges of the \
             1080px frame.\n\
             2. EDITORIAL BALANCE: flex column, centered, visual gravity at the absolute \
             center; distribute content to fill the 1350px height.\n\
             3. TYPOGRAPHY: cover titles 60-110px extra bold, body 28-48px, clear contrast.\n\
             4. VISUAL DENSITY: balanced decorative blobs to stabilise the frame; gradient \
             overlays on imagery.\n\
             \n=== OUTPUT STANDARDS ===\n\
             - Return ONLY JSON: {{\"html\": \"...\"}}\n\
             - Inline CSS. Exactly {slide_count} slides.\n\
             - NEVER use markdown bold syntax like `**text**`; use `<b>text</b>` or a \
             styled `<span>` instead. No raw markdown symbols may appear in the HTML.\n"
        );

        if let Some(url) = bg_image_url {
            let _ = write!(
                p,
                "\nEXTRA DESIGN RULE (priority 1):\n\
                 - Use the provided background image URL: `{url}`\n\
                 - Apply it as the background of the COVER SLIDE only, with \
                 `background-size: cover; background-position: center;`\n\
                 - Add a gradient overlay `linear-gradient(rgba(0,0,0,0.5), \
                 rgba(0,0,0,0.7) 70%, #000 100%)` so text stays legible.\n"
            );
        }

        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{LearnedDesignProfile, StudioAssets};

    #[test]
    fn bare_assets_still_compose() {
        let composer = PromptComposer::new(StudioAssets::default());
        let prompt = composer.compose("quantum computing in 2026", 5, None);
        assert!(prompt.contains("quantum computing in 2026"));
        assert!(prompt.contains("Exactly 5 slides"));
        assert!(!prompt.contains("THE REFERENCE"));
        assert!(!prompt.contains("LEARNED DESIGN"));
        assert!(!prompt.contains("EXTRA DESIGN RULE"));
    }

    #[test]
    fn optional_sections_appear_when_present() {
        let assets = StudioAssets {
            example_markup: Some("<section>ref</section>".into()),
            learned: Some(LearnedDesignProfile::default()),
            viral_formula: Some("formula".into()),
            design_specs: Some("specs".into()),
        };
        let composer = PromptComposer::new(assets);
        let prompt = composer.compose("topic", 3, Some("https://cdn.example/bg.png"));

        assert!(prompt.contains("<section>ref</section>"));
        // Unlearned fields fall back to generic placeholders.
        assert!(prompt.contains("titles around 100px"));
        assert!(prompt.contains("VIRAL CARD-NEWS FORMULA"));
        assert!(prompt.contains("DESIGN SPECS"));
        assert!(prompt.contains("https://cdn.example/bg.png"));
    }

    #[test]
    fn source_text_is_verbatim() {
        let composer = PromptComposer::new(StudioAssets::default());
        let text = "line with \"quotes\" and {braces}";
        assert!(composer.compose(text, 1, None).contains(text));
    }

    #[test]
    fn output_contract_demands_single_json_field() {
        let composer = PromptComposer::new(StudioAssets::default());
        let prompt = composer.compose("t", 5, None);
        assert!(prompt.contains(r#"{"html": "..."}"#));
    }
}
