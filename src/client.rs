// src/client.rs

//! HTTP client for release downloads
//!
//! Provides a wrapper around reqwest with retry support for fetching
//! release metadata and downloading archives.

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// User-Agent sent with every request
///
/// The GitHub API rejects requests without one.
const USER_AGENT: &str = concat!("galley/", env!("CARGO_PKG_VERSION"));

/// Stream HTTP response to file with optional progress tracking
///
/// Always streams data in chunks, never buffering the entire response in
/// memory. This is safe for archives of any size.
fn stream_response_to_file(
    mut response: reqwest::blocking::Response,
    file: &mut File,
    total_size: u64,
    progress_bar: Option<&ProgressBar>,
    display_name: &str,
) -> Result<u64> {
    if let Some(pb) = progress_bar {
        if total_size > 0 {
            pb.set_length(total_size);
            pb.set_message(display_name.to_string());
        } else {
            pb.set_message(format!("{} (unknown size)", display_name));
        }
    }

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::IoError(format!("Failed to read response: {e}")))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;

        downloaded += bytes_read as u64;

        if let Some(pb) = progress_bar {
            pb.set_position(downloaded);
        }
    }

    Ok(downloaded)
}

/// HTTP client wrapper with retry support
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    show_progress: bool,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
            show_progress: true,
        })
    }

    /// Create a client that never draws progress bars (for scripted use)
    pub fn quiet() -> Result<Self> {
        let mut client = Self::new()?;
        client.show_progress = false;
        Ok(client)
    }

    /// Fetch a URL and deserialize the JSON response, with retries
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        info!("Fetching {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    return response
                        .json()
                        .map_err(|e| Error::DownloadError(format!("Failed to parse JSON: {e}")));
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Fetch attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Download a URL to a file, streaming, with retries
    ///
    /// The partially written file is removed on failure so a broken
    /// download never masquerades as a cached archive.
    pub fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let display_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_download(url, dest, &display_name) {
                Ok(size) => {
                    debug!("Downloaded {} bytes to {}", size, dest.display());
                    return Ok(size);
                }
                Err(e) => {
                    if dest.exists() {
                        let _ = std::fs::remove_file(dest);
                    }
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to download {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn try_download(&self, url: &str, dest: &Path, display_name: &str) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let total_size = response.content_length().unwrap_or(0);

        let progress = if self.show_progress {
            let pb = ProgressBar::new(total_size);
            pb.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut file = File::create(dest)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {}", dest.display(), e)))?;

        let size =
            stream_response_to_file(response, &mut file, total_size, progress.as_ref(), display_name)?;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(size)
    }
}
