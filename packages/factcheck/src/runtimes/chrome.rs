//! Local headless Chrome/Chromium driven through `--dump-dom`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::browser::{BrowserRuntime, RenderedPage};
use crate::traits::fetcher::FetchLimits;

/// Binaries probed on `PATH`, in order.
const CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

pub struct ChromeRuntime {
    binary: Option<PathBuf>,
    /// Milliseconds the page gets to run scripts before the DOM is dumped.
    virtual_time_budget_ms: u64,
}

impl ChromeRuntime {
    /// Locate a browser via `CHROME_BIN`, falling back to `PATH`.
    pub fn discover() -> Self {
        let from_env = std::env::var("CHROME_BIN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let binary = from_env.or_else(|| {
            CANDIDATES
                .iter()
                .find_map(|name| which::which(name).ok())
        });
        match &binary {
            Some(path) => debug!(binary = %path.display(), "Headless browser found"),
            None => debug!("No headless browser found"),
        }
        Self::with_binary(binary)
    }

    pub fn with_binary(binary: Option<PathBuf>) -> Self {
        Self {
            binary,
            virtual_time_budget_ms: 5_000,
        }
    }

    pub fn with_virtual_time_budget(mut self, budget: Duration) -> Self {
        self.virtual_time_budget_ms = budget.as_millis() as u64;
        self
    }

    fn args(&self, url: &Url) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--blink-settings=imagesEnabled=false".to_string(),
            format!("--virtual-time-budget={}", self.virtual_time_budget_ms),
            "--dump-dom".to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl BrowserRuntime for ChromeRuntime {
    fn name(&self) -> &str {
        "chrome"
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    /// `--dump-dom` prints the DOM of the document the browser settled on
    /// but not its address, so the page is reported at `url`. Redirects the
    /// HTTP strategies saw were already checked by the URL guard.
    async fn render(&self, url: &Url, limits: &FetchLimits) -> FetchResult<RenderedPage> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| FetchError::Runtime("no browser binary configured".to_string()))?;

        let mut child = Command::new(binary)
            .args(self.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Runtime(format!("failed to start browser: {}", e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Runtime("browser stdout unavailable".to_string()))?;

        let (dom, status) = tokio::time::timeout(limits.timeout, async {
            let (dom, truncated) = read_capped(stdout, limits.max_bytes).await?;
            if truncated {
                debug!(url = %url, max_bytes = limits.max_bytes, "Rendered DOM cut at byte cap");
                child.start_kill()?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((dom, (!truncated).then_some(status)))
        })
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
        })?
        .map_err(|e| FetchError::Runtime(e.to_string()))?;

        if let Some(status) = status.filter(|s| !s.success()) {
            return Err(FetchError::Runtime(format!("browser exited with {}", status)));
        }

        let html = String::from_utf8_lossy(&dom).into_owned();
        if html.trim().is_empty() {
            return Err(FetchError::Runtime("browser returned an empty DOM".to_string()));
        }
        Ok(RenderedPage {
            url: url.clone(),
            html,
        })
    }
}

/// Read at most `max_bytes` from `reader`. The flag is set when more was
/// available.
async fn read_capped<R>(reader: R, max_bytes: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    // One byte past the cap tells a full page from a cut one.
    reader
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut buf)
        .await?;
    let truncated = buf.len() > max_bytes;
    buf.truncate(max_bytes);
    Ok((buf, truncated))
}
