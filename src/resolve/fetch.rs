//! Download cache for URL descriptors.
//!
//! A URL is fetched into the download directory under its final path
//! segment. If that file already exists it is reused and no transfer
//! happens. Two URLs sharing a final segment map to the same entry; entries
//! are never invalidated here.
//!
//! The body is streamed in chunks to `<key>.part` and renamed into place only
//! after the transfer completes, so a failed download leaves no entry.
//! Failures are reported, never retried.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use url::Url;

use crate::config::SourceConfig;
use crate::error::{Result, SourceError};

const CHUNK_SIZE: usize = 8192;
const PARTIAL_SUFFIX: &str = "part";

/// Fetches URLs into the download directory.
#[derive(Clone)]
pub struct Downloader {
    download_dir: PathBuf,
    agent: ureq::Agent,
}

impl Downloader {
    pub fn new(config: &SourceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.http_timeout)
            .build();
        Self {
            download_dir: config.download_dir.clone(),
            agent,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Local path a URL is cached under.
    pub fn cache_path(&self, url: &str) -> Result<PathBuf> {
        Ok(self.download_dir.join(cache_key(url)?))
    }

    /// Return the cached file for `url`, downloading it on first use.
    pub fn fetch(&self, url: &str) -> Result<PathBuf> {
        let target = self.cache_path(url)?;
        if target.is_file() {
            log::warn!(
                "{} downloaded before, using cached file {}",
                url,
                target.display()
            );
            return Ok(target);
        }

        fs::create_dir_all(&self.download_dir).map_err(|e| download_error(url, e))?;
        let partial = target.with_extension(partial_extension(&target));
        match self.transfer(url, &partial) {
            Ok(bytes) => {
                fs::rename(&partial, &target).map_err(|e| download_error(url, e))?;
                log::info!("downloaded {} ({} bytes) to {}", url, bytes, target.display());
                Ok(target)
            }
            Err(err) => {
                let _ = fs::remove_file(&partial);
                Err(err)
            }
        }
    }

    fn transfer(&self, url: &str, partial: &Path) -> Result<u64> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| download_error(url, e))?;
        let total = response
            .header("Content-Length")
            .and_then(|len| len.parse::<u64>().ok());
        let progress = download_progress(total);

        let mut reader = response.into_reader();
        let mut writer = BufWriter::new(File::create(partial).map_err(|e| download_error(url, e))?);
        let mut chunk = [0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = reader.read(&mut chunk).map_err(|e| download_error(url, e))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&chunk[..n])
                .map_err(|e| download_error(url, e))?;
            written += n as u64;
            progress.inc(n as u64);
        }
        writer.flush().map_err(|e| download_error(url, e))?;
        progress.finish_and_clear();
        Ok(written)
    }
}

/// Final path segment of a URL, used as the cache key.
pub fn cache_key(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| download_error(url, e))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .ok_or_else(|| download_error(url, "URL has no file name to cache under"))
}

fn partial_extension(target: &Path) -> String {
    match target.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", ext, PARTIAL_SUFFIX),
        None => PARTIAL_SUFFIX.to_string(),
    }
}

fn download_progress(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let bar = ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template(
                "Downloading: [{bar:50}] {bytes}/{total_bytes}",
            )
            .map(|style| style.progress_chars("#."))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.set_message("Downloading");
            spinner
        }
    }
}

fn download_error(url: &str, reason: impl ToString) -> SourceError {
    SourceError::Download {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_final_segment() {
        assert_eq!(
            cache_key("https://example.com/300/09f/fff.png").unwrap(),
            "fff.png"
        );
        assert_eq!(
            cache_key("https://example.com/clip.mp4?token=abc").unwrap(),
            "clip.mp4"
        );
    }

    #[test]
    fn cache_key_requires_file_name() {
        let err = cache_key("https://example.com/").unwrap_err();
        match err {
            SourceError::Download { url, .. } => assert_eq!(url, "https://example.com/"),
            other => panic!("expected Download, got {:?}", other),
        }
    }

    #[test]
    fn existing_entry_is_reused_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig::isolated(dir.path());
        let downloader = Downloader::new(&config);
        std::fs::create_dir_all(downloader.download_dir()).unwrap();
        let cached = downloader.download_dir().join("cached.png");
        std::fs::write(&cached, b"cached").unwrap();

        // Port 9 on an unroutable host would fail if a transfer were attempted.
        let path = downloader.fetch("http://192.0.2.1:9/any/cached.png").unwrap();
        assert_eq!(path, cached);
    }

    #[test]
    fn partial_extension_keeps_original_suffix() {
        assert_eq!(partial_extension(Path::new("/tmp/a.png")), "png.part");
        assert_eq!(partial_extension(Path::new("/tmp/a")), "part");
    }
}
