//! HTML to PDF conversion through a headless browser.
//!
//! The document is written to a scratch file, printed with
//! `<browser> --headless --print-to-pdf`, and both files are removed
//! afterwards whatever the outcome.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::Config;
use crate::db::LogOnError;
use crate::error::{ApiError, ApiResult};

/// Longest stderr excerpt carried into an error message
const STDERR_EXCERPT: usize = 300;

#[derive(Debug, Clone)]
pub struct PdfRenderer {
  browser: String,
  timeout: Duration,
  work_dir: PathBuf,
}

impl PdfRenderer {
  pub fn new(browser: impl Into<String>, timeout: Duration, work_dir: PathBuf) -> Self {
    Self {
      browser: browser.into(),
      timeout,
      work_dir,
    }
  }

  pub fn from_config(config: &Config, work_dir: PathBuf) -> Self {
    Self::new(
      config.pdf_browser.clone(),
      Duration::from_secs(config.pdf_timeout_secs),
      work_dir,
    )
  }

  pub async fn render(&self, html: &str) -> ApiResult<Vec<u8>> {
    tokio::fs::create_dir_all(&self.work_dir).await?;
    let stem = format!("report-{:016x}", rand::random::<u64>());
    let input = self.work_dir.join(format!("{}.html", stem));
    let output = self.work_dir.join(format!("{}.pdf", stem));

    tokio::fs::write(&input, html).await?;
    let result = self.print(&input, &output).await;

    let pdf = match result {
      Ok(()) => tokio::fs::read(&output).await.map_err(ApiError::from),
      Err(e) => Err(e),
    };
    remove_scratch(&input).await;
    remove_scratch(&output).await;
    pdf
  }

  async fn print(&self, input: &Path, output: &Path) -> ApiResult<()> {
    let mut command = Command::new(&self.browser);
    command
      .arg("--headless")
      .arg("--disable-gpu")
      .arg("--no-sandbox")
      .arg("--no-pdf-header-footer")
      .arg(format!("--print-to-pdf={}", output.display()))
      .arg(input)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
      tracing::warn!("Could not start PDF browser '{}': {}", self.browser, e);
      ApiError::Unavailable(format!(
        "PDF rendering is unavailable ({} could not be started); use format=html",
        self.browser
      ))
    })?;

    let finished = tokio::time::timeout(self.timeout, child.wait_with_output())
      .await
      .map_err(|_| {
        tracing::warn!("PDF rendering timed out after {:?}", self.timeout);
        ApiError::Unavailable("PDF rendering timed out".to_string())
      })??;

    if !finished.status.success() {
      let stderr = String::from_utf8_lossy(&finished.stderr);
      let excerpt: String = stderr.chars().take(STDERR_EXCERPT).collect();
      tracing::warn!("PDF browser exited with {}: {}", finished.status, excerpt);
      return Err(ApiError::Unavailable(format!(
        "PDF rendering failed ({})",
        finished.status
      )));
    }
    if !output.exists() {
      return Err(ApiError::Unavailable("PDF renderer produced no output".to_string()));
    }
    Ok(())
  }
}

async fn remove_scratch(path: &Path) {
  if tokio::fs::try_exists(path).await.unwrap_or(false) {
    tokio::fs::remove_file(path)
      .await
      .log_warn(&format!("Failed to remove render scratch file {}", path.display()));
  }
}
