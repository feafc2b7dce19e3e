//! Slide rendering — turns generated card markup into PNG images.
//!
//! The headless-browser automation lives outside this process: the
//! configured capture command receives the markup file and writes one
//! PNG per slide into the output directory. This keeps the browser
//! dependency out of the server binary and lets deployments swap the
//! capture tool freely.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Renders card markup into slide images.
#[async_trait]
pub trait SlideRenderer: Send + Sync {
    /// Render `markup` and return the produced slide images, in slide
    /// order.
    async fn render(&self, markup: &str) -> anyhow::Result<Vec<PathBuf>>;
}

/// Renderer that shells out to an external capture command.
///
/// Invoked as `<command> --input <html file> --output <slides dir>`.
pub struct CaptureCommandRenderer {
    command: String,
    workspace: PathBuf,
    timeout: Duration,
}

impl CaptureCommandRenderer {
    pub fn new(command: &str, workspace: &Path, timeout_seconds: u64) -> Self {
        Self {
            command: command.to_string(),
            workspace: workspace.to_path_buf(),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    /// Directory the capture command writes slide images into.
    pub fn slides_dir(&self) -> PathBuf {
        self.workspace.join("slides")
    }

    fn prepare_dirs(&self) -> anyhow::Result<PathBuf> {
        let slides = self.slides_dir();
        // Stale slides from the previous run would get mixed into the
        // new set, so start from an empty directory.
        if slides.exists() {
            std::fs::remove_dir_all(&slides)?;
        }
        std::fs::create_dir_all(&slides)?;
        Ok(slides)
    }

    fn collect_slides(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut slides: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
            })
            .collect();
        // Capture tools number their output (slide_01.png, ...), so
        // filename order is slide order.
        slides.sort();
        Ok(slides)
    }
}

#[async_trait]
impl SlideRenderer for CaptureCommandRenderer {
    async fn render(&self, markup: &str) -> anyhow::Result<Vec<PathBuf>> {
        let slides_dir = self.prepare_dirs()?;

        let input = self.workspace.join("current_cards.html");
        std::fs::write(&input, markup)?;

        debug!(
            command = %self.command,
            input = %input.display(),
            "Launching slide capture"
        );

        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&self.command)
                .arg("--input")
                .arg(&input)
                .arg("--output")
                .arg(&slides_dir)
                .current_dir(&self.workspace)
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => anyhow::bail!("failed to launch capture command '{}': {}", self.command, e),
            Err(_) => anyhow::bail!(
                "capture command timed out after {} seconds",
                self.timeout.as_secs()
            ),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                exit = output.status.code().unwrap_or(-1),
                "Capture command failed"
            );
            anyhow::bail!(
                "capture command exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let slides = Self::collect_slides(&slides_dir)?;
        if slides.is_empty() {
            anyhow::bail!("capture command produced no slide images");
        }
        Ok(slides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_slides_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["slide_02.png", "slide_01.png", "notes.txt", "slide_10.PNG"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let slides = CaptureCommandRenderer::collect_slides(dir.path()).unwrap();
        let names: Vec<_> = slides
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["slide_01.png", "slide_02.png", "slide_10.PNG"]);
    }

    #[tokio::test]
    async fn missing_command_reports_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let renderer =
            CaptureCommandRenderer::new("cardforge-capture-does-not-exist", dir.path(), 5);
        let err = renderer.render("<div>card</div>").await.unwrap_err();
        assert!(err.to_string().contains("failed to launch"));
    }

    #[tokio::test]
    async fn render_clears_previous_slides() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CaptureCommandRenderer::new("true", dir.path(), 5);

        let stale = renderer.slides_dir();
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("old.png"), b"x").unwrap();

        // `true` exits 0 without producing slides; the stale image must
        // not survive to be counted.
        let err = renderer.render("<div/>").await.unwrap_err();
        assert!(err.to_string().contains("no slide images"));
    }
}
