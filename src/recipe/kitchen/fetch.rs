// src/recipe/kitchen/fetch.rs

//! Source retrieval collaborators
//!
//! The Kitchen does not care how bytes arrive. It asks a [`Fetcher`] to put
//! an archive at a path or a checkout in a directory, then verifies the
//! archive itself. [`SourceFetcher`] is the default transport: HTTP(S) via
//! reqwest, `file://` via the filesystem, head checkouts via `git`.

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a failed download
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Retrieves source material for a recipe
pub trait Fetcher: Send + Sync {
    /// Store the archive at `url` in the file `dest`
    fn fetch_archive(&self, url: &str, dest: &Path) -> Result<()>;

    /// Check out `url` (optionally at `branch`) into the empty directory `dest`
    fn clone_head(&self, url: &str, branch: Option<&str>, dest: &Path) -> Result<()>;
}

fn fetch_failed(url: &str, reason: impl Into<String>) -> Error {
    Error::FetchFailed {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Default fetcher: reqwest for HTTP(S), filesystem for `file://`, git for heads
pub struct SourceFetcher {
    client: Client,
    show_progress: bool,
}

impl SourceFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("pantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::IoError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            show_progress: false,
        })
    }

    /// Show a progress bar on stderr while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn download_http(&self, url: &str, dest: &Path) -> Result<()> {
        let mut last_error = String::new();

        for attempt in 1..=MAX_RETRIES {
            match self.try_download(url, dest) {
                Ok(bytes) => {
                    debug!("Downloaded {} bytes from {}", bytes, url);
                    return Ok(());
                }
                Err(e) => {
                    last_error = e;
                    let _ = fs::remove_file(dest);
                    if attempt < MAX_RETRIES {
                        warn!(
                            "Download attempt {}/{} for {} failed: {}",
                            attempt, MAX_RETRIES, url, last_error
                        );
                        std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                    }
                }
            }
        }

        Err(fetch_failed(url, last_error))
    }

    fn try_download(&self, url: &str, dest: &Path) -> std::result::Result<u64, String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let total_size = response.content_length().unwrap_or(0);
        let progress = self.show_progress.then(|| {
            let pb = ProgressBar::new(total_size);
            pb.set_style(
                ProgressStyle::with_template("{msg} [{bar:30}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            pb.set_message(crate::recipe::format::archive_filename(url));
            pb
        });

        let mut file = File::create(dest).map_err(|e| format!("failed to create file: {}", e))?;
        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];

        loop {
            let n = response
                .read(&mut buffer)
                .map_err(|e| format!("failed to read response: {}", e))?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])
                .map_err(|e| format!("failed to write data: {}", e))?;
            downloaded += n as u64;
            if let Some(pb) = &progress {
                pb.set_position(downloaded);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(downloaded)
    }
}

impl Fetcher for SourceFetcher {
    fn fetch_archive(&self, url: &str, dest: &Path) -> Result<()> {
        let parsed = Url::parse(url).map_err(|e| fetch_failed(url, e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {
                info!("Downloading: {}", url);
                self.download_http(url, dest)
            }
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| fetch_failed(url, "not a local file path"))?;
                debug!("Copying local source {}", path.display());
                fs::copy(&path, dest)
                    .map(|_| ())
                    .map_err(|e| fetch_failed(url, e.to_string()))
            }
            other => Err(fetch_failed(url, format!("unsupported scheme `{}`", other))),
        }
    }

    fn clone_head(&self, url: &str, branch: Option<&str>, dest: &Path) -> Result<()> {
        info!("Cloning {}{}", url, branch.map(|b| format!(" ({})", b)).unwrap_or_default());

        let mut command = Command::new("git");
        command.args(["clone", "--depth", "1"]);
        if let Some(branch) = branch {
            command.args(["--branch", branch]);
        }
        let output = command
            .arg(url)
            .arg(dest)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| fetch_failed(url, format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(fetch_failed(
                url,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(())
    }
}

/// Short commit id of a checkout, if it is a git work tree
pub fn head_commit(checkout: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(checkout)
        .stderr(Stdio::null())
        .output()
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Copy `src` to `dest` through a temp file so `dest` never holds a partial file
pub(crate) fn copy_atomic(src: &Path, dest: &Path) -> io::Result<()> {
    let tmp = dest.with_extension("partial");
    fs::copy(src, &tmp)?;
    fs::rename(&tmp, dest)
}
