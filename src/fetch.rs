//! Remote fetcher for missing videos and their thumbnails.
//!
//! A fetch downloads `<id>.<format>` and `<id>.png` from the remote host into
//! the content root. The outcome rules:
//!
//! | Video response | Result |
//! |---|---|
//! | 404 | partial files removed, [`FetchOutcome::NotFound`] |
//! | non-`video/*` content type | partial files removed, [`FetchError::NotVideo`] |
//! | transport/IO error, other status | retried per [`RetryPolicy`], then [`FetchError::Exhausted`] |
//! | cancellation flag raised | partial files removed, [`FetchError::Interrupted`] |
//!
//! Bodies are streamed into a `.download-*.part` temp file next to the
//! destination and renamed into place only once complete, so a final name on
//! disk is always a whole file. Temp files orphaned by a hard exit are swept
//! at the start of the next fetch into the same directory.
//!
//! A thumbnail that is missing or not an image is replaced by the bundled
//! placeholder and never fails the fetch.

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Fallback thumbnail written when the remote has none.
pub const PLACEHOLDER_PNG: &[u8] = include_bytes!("../static/placeholder.png");

const CANCEL_POLL: Duration = Duration::from_millis(100);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const PART_PREFIX: &str = ".download-";
const PART_SUFFIX: &str = ".part";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Not a video ({content_type:?}): {url}")]
    NotVideo { url: String, content_type: String },
    #[error("Giving up on {url} after {attempts} attempts: {reason}")]
    Exhausted {
        url: String,
        attempts: u32,
        reason: String,
    },
    #[error("Download interrupted")]
    Interrupted,
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Http(_) | FetchError::Io(_) | FetchError::Status { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    /// The remote has no such video; nothing was left on disk.
    NotFound,
}

pub trait RemoteFetcher {
    /// Fetch `<remote_id>.<format>` and its thumbnail into `dest_dir`.
    fn fetch(
        &self,
        remote_id: &str,
        format: &str,
        dest_dir: &Path,
    ) -> Result<FetchOutcome, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrls {
    pub video: String,
    pub thumbnail: String,
}

/// Download URLs for a video and its thumbnail on `host`.
pub fn video_urls(host: &str, remote_id: &str, format: &str) -> RemoteUrls {
    let base = format!("http://{host}/download/videos/{format}");
    RemoteUrls {
        video: format!("{base}/{remote_id}.{format}"),
        thumbnail: format!("{base}/{remote_id}.png"),
    }
}

/// Files created by an in-flight fetch, removed on drop unless committed.
struct PartialFiles {
    paths: Vec<PathBuf>,
    committed: bool,
}

impl PartialFiles {
    fn new() -> Self {
        Self {
            paths: Vec::new(),
            committed: false,
        }
    }

    fn track(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFiles {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in &self.paths {
            if path.is_file() {
                let _ = fs::remove_file(path);
            }
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    host: String,
    policy: RetryPolicy,
    cancel: Arc<AtomicBool>,
}

impl HttpFetcher {
    /// `read_timeout` bounds every blocking wait on the connection, so a
    /// stalled body surfaces as an error and the cancel flag gets looked at.
    pub fn new(
        host: impl Into<String>,
        policy: RetryPolicy,
        read_timeout: Duration,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(read_timeout)
            .build()?;
        Ok(Self::with_client(client, host, policy, cancel))
    }

    pub fn with_client(
        client: Client,
        host: impl Into<String>,
        policy: RetryPolicy,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            host: host.into(),
            policy,
            cancel,
        }
    }

    fn check_cancelled(&self) -> Result<(), FetchError> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(FetchError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for the retry delay, waking early on cancellation.
    fn pause(&self) -> Result<(), FetchError> {
        let mut remaining = self.policy.delay;
        while !remaining.is_zero() {
            self.check_cancelled()?;
            let slice = remaining.min(CANCEL_POLL);
            thread::sleep(slice);
            remaining -= slice;
        }
        self.check_cancelled()
    }

    fn download_video(&self, url: &str, dest: &Path) -> Result<FetchOutcome, FetchError> {
        let attempts = self.policy.attempts.max(1);
        let mut reason = String::new();

        for attempt in 1..=attempts {
            self.check_cancelled()?;
            info!("Fetching {} (attempt {}/{})", url, attempt, attempts);

            match self.try_video(url, dest) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() => {
                    // A read cut short by the cancel flag is an interrupt, not a flaky remote.
                    self.check_cancelled()?;
                    reason = e.to_string();
                    if attempt < attempts {
                        warn!(
                            "Download failed ({}), retrying in {}s",
                            e,
                            self.policy.delay.as_secs()
                        );
                        self.pause()?;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            reason,
        })
    }

    fn try_video(&self, url: &str, dest: &Path) -> Result<FetchOutcome, FetchError> {
        let mut response = self.client.get(url).send()?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::error!("404 for: {}", url);
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let content_type = content_type(&response);
        if !content_type.starts_with("video") {
            return Err(FetchError::NotVideo {
                url: url.to_string(),
                content_type,
            });
        }
        self.write_body(&mut response, dest)?;
        Ok(FetchOutcome::Fetched)
    }

    fn download_thumbnail(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        self.check_cancelled()?;
        let mut response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                warn!("Thumbnail request failed ({}), using placeholder: {}", e, url);
                return write_placeholder(dest);
            }
        };

        let content_type = content_type(&response);
        if !response.status().is_success() || !content_type.starts_with("image") {
            warn!(
                "Thumbnail missing ({}, {:?}), using placeholder: {}",
                response.status(),
                content_type,
                url
            );
            return write_placeholder(dest);
        }

        match self.write_body(&mut response, dest) {
            Ok(()) => Ok(()),
            Err(FetchError::Interrupted) => Err(FetchError::Interrupted),
            Err(e) => {
                warn!("Thumbnail download failed ({}), using placeholder", e);
                write_placeholder(dest)
            }
        }
    }

    /// Stream the body into a temp sibling of `dest`, checking for
    /// cancellation between chunks, and rename it into place when complete.
    /// The temp file is deleted on every early return.
    fn write_body(&self, response: &mut Response, dest: &Path) -> Result<(), FetchError> {
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut part = tempfile::Builder::new()
            .prefix(PART_PREFIX)
            .suffix(PART_SUFFIX)
            .tempfile_in(dir)?;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            self.check_cancelled()?;
            let n = match response.read(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    self.check_cancelled()?;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }
            part.write_all(&buf[..n])?;
        }
        part.flush()?;
        part.persist(dest).map_err(|e| e.error)?;
        Ok(())
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(
        &self,
        remote_id: &str,
        format: &str,
        dest_dir: &Path,
    ) -> Result<FetchOutcome, FetchError> {
        let urls = video_urls(&self.host, remote_id, format);
        let video = dest_dir.join(format!("{remote_id}.{format}"));
        let thumbnail = dest_dir.join(format!("{remote_id}.png"));
        fs::create_dir_all(dest_dir)?;
        remove_stale_parts(dest_dir)?;

        let mut partial = PartialFiles::new();
        partial.track(&video);
        let fetch_thumbnail = !thumbnail.exists();
        if fetch_thumbnail {
            partial.track(&thumbnail);
        }

        if self.download_video(&urls.video, &video)? == FetchOutcome::NotFound {
            return Ok(FetchOutcome::NotFound);
        }
        if fetch_thumbnail {
            self.download_thumbnail(&urls.thumbnail, &thumbnail)?;
        }

        partial.commit();
        Ok(FetchOutcome::Fetched)
    }
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn write_placeholder(dest: &Path) -> Result<(), FetchError> {
    fs::write(dest, PLACEHOLDER_PNG)?;
    Ok(())
}

/// Remove temp downloads left in `dir` by a run that exited mid-transfer.
fn remove_stale_parts(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(PART_PREFIX) && name.ends_with(PART_SUFFIX) && entry.path().is_file() {
            warn!("Removing stale partial download: {}", entry.path().display());
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::io::BufRead;
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::thread::JoinHandle;
    use std::time::Instant;
    use tempfile::TempDir;

    /// Fetcher that records calls and writes files instead of downloading.
    #[derive(Default)]
    pub struct MockFetcher {
        pub calls: Mutex<Vec<String>>,
        /// Ids the "remote" has; anything else is a 404.
        pub available: Vec<String>,
        pub interrupt: bool,
    }

    impl MockFetcher {
        pub fn serving(ids: &[&str]) -> Self {
            Self {
                available: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RemoteFetcher for MockFetcher {
        fn fetch(
            &self,
            remote_id: &str,
            format: &str,
            dest_dir: &Path,
        ) -> Result<FetchOutcome, FetchError> {
            self.calls.lock().unwrap().push(remote_id.to_string());
            if self.interrupt {
                return Err(FetchError::Interrupted);
            }
            if !self.available.iter().any(|id| id == remote_id) {
                return Ok(FetchOutcome::NotFound);
            }
            fs::create_dir_all(dest_dir)?;
            fs::write(dest_dir.join(format!("{remote_id}.{format}")), b"video")?;
            fs::write(dest_dir.join(format!("{remote_id}.png")), PLACEHOLDER_PNG)?;
            Ok(FetchOutcome::Fetched)
        }
    }

    fn response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    /// Serve one canned response per connection; returns the request lines.
    fn serve(responses: Vec<Vec<u8>>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for canned in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = io::BufReader::new(stream);
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                requests.push(line.trim().to_string());
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    if header == "\r\n" || header.is_empty() {
                        break;
                    }
                }
                reader.get_mut().write_all(&canned).unwrap();
            }
            requests
        });
        (host, handle)
    }

    fn fetcher(host: &str, attempts: u32) -> HttpFetcher {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        HttpFetcher::with_client(
            client,
            host,
            RetryPolicy {
                attempts,
                delay: Duration::ZERO,
            },
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn urls_follow_download_layout() {
        let urls = video_urls("example.org", "yt1", "mp4");
        assert_eq!(urls.video, "http://example.org/download/videos/mp4/yt1.mp4");
        assert_eq!(urls.thumbnail, "http://example.org/download/videos/mp4/yt1.png");
    }

    #[test]
    fn fetches_video_and_thumbnail() {
        let (host, server) = serve(vec![
            response("200 OK", "video/mp4", b"moov"),
            response("200 OK", "image/png", b"png!"),
        ]);
        let tmp = TempDir::new().unwrap();

        let outcome = fetcher(&host, 1).fetch("yt1", "mp4", tmp.path()).unwrap();

        assert_eq!(outcome, FetchOutcome::Fetched);
        assert_eq!(fs::read(tmp.path().join("yt1.mp4")).unwrap(), b"moov");
        assert_eq!(fs::read(tmp.path().join("yt1.png")).unwrap(), b"png!");
        assert_eq!(
            server.join().unwrap(),
            vec![
                "GET /download/videos/mp4/yt1.mp4 HTTP/1.1",
                "GET /download/videos/mp4/yt1.png HTTP/1.1"
            ]
        );
    }

    #[test]
    fn not_found_leaves_nothing_behind() {
        let (host, server) = serve(vec![response("404 Not Found", "text/html", b"nope")]);
        let tmp = TempDir::new().unwrap();

        let outcome = fetcher(&host, 3).fetch("yt1", "mp4", tmp.path()).unwrap();

        assert_eq!(outcome, FetchOutcome::NotFound);
        assert!(!tmp.path().join("yt1.mp4").exists());
        assert!(!tmp.path().join("yt1.png").exists());
        assert_eq!(server.join().unwrap().len(), 1);
    }

    #[test]
    fn wrong_content_type_is_error_without_retry() {
        let (host, server) = serve(vec![response("200 OK", "text/html", b"<html>")]);
        let tmp = TempDir::new().unwrap();

        let result = fetcher(&host, 3).fetch("yt1", "mp4", tmp.path());

        assert!(matches!(result, Err(FetchError::NotVideo { .. })));
        assert!(!tmp.path().join("yt1.mp4").exists());
        assert_eq!(server.join().unwrap().len(), 1);
    }

    #[test]
    fn server_error_is_retried() {
        let (host, server) = serve(vec![
            response("500 Internal Server Error", "text/plain", b"oops"),
            response("200 OK", "video/webm", b"vid"),
            response("200 OK", "image/png", b"img"),
        ]);
        let tmp = TempDir::new().unwrap();

        let outcome = fetcher(&host, 2).fetch("yt1", "mp4", tmp.path()).unwrap();

        assert_eq!(outcome, FetchOutcome::Fetched);
        assert_eq!(server.join().unwrap().len(), 3);
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = listener.local_addr().unwrap().to_string();
        drop(listener);
        let tmp = TempDir::new().unwrap();

        let result = fetcher(&host, 2).fetch("yt1", "mp4", tmp.path());

        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 2, .. })));
        assert!(dir_names(tmp.path()).is_empty());
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn truncated_body_is_retried_without_leftovers() {
        let mut short = b"HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: 100\r\nConnection: close\r\n\r\n".to_vec();
        short.extend_from_slice(b"partial");
        let (host, server) = serve(vec![short.clone(), short]);
        let tmp = TempDir::new().unwrap();

        let result = fetcher(&host, 2).fetch("yt1", "mp4", tmp.path());

        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 2, .. })));
        assert!(dir_names(tmp.path()).is_empty());
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn cancel_during_stalled_body_is_interrupted() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let host = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = io::BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 2 {
                line.clear();
            }
            let head = b"HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: 1000000\r\n\r\nmoovbox";
            let _ = reader.get_mut().write_all(head);
            // Hold the connection open without sending the rest.
            thread::sleep(Duration::from_secs(5));
        });
        let tmp = TempDir::new().unwrap();
        let fetcher = fetcher(&host, 5);
        let cancel = Arc::clone(&fetcher.cancel);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            cancel.store(true, Ordering::SeqCst);
        });

        let started = Instant::now();
        let result = fetcher.fetch("yt1", "mp4", tmp.path());

        assert!(matches!(result, Err(FetchError::Interrupted)), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(dir_names(tmp.path()).is_empty());
    }

    #[test]
    fn stale_partial_downloads_are_swept() {
        let (host, _server) = serve(vec![
            response("200 OK", "video/mp4", b"moov"),
            response("200 OK", "image/png", b"png!"),
        ]);
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".download-abc123.part"), b"junk").unwrap();
        fs::write(tmp.path().join("other.mp4"), b"keep").unwrap();

        fetcher(&host, 1).fetch("yt1", "mp4", tmp.path()).unwrap();

        let mut names = dir_names(tmp.path());
        names.sort();
        assert_eq!(names, vec!["other.mp4", "yt1.mp4", "yt1.png"]);
    }

    #[test]
    fn missing_thumbnail_gets_placeholder() {
        let (host, _server) = serve(vec![
            response("200 OK", "video/mp4", b"moov"),
            response("200 OK", "text/html", b"<html>"),
        ]);
        let tmp = TempDir::new().unwrap();

        fetcher(&host, 1).fetch("yt1", "mp4", tmp.path()).unwrap();

        assert_eq!(fs::read(tmp.path().join("yt1.png")).unwrap(), PLACEHOLDER_PNG);
    }

    #[test]
    fn existing_thumbnail_is_kept() {
        let (host, server) = serve(vec![response("200 OK", "video/mp4", b"moov")]);
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("yt1.png"), b"mine").unwrap();

        fetcher(&host, 1).fetch("yt1", "mp4", tmp.path()).unwrap();

        assert_eq!(fs::read(tmp.path().join("yt1.png")).unwrap(), b"mine");
        assert_eq!(server.join().unwrap().len(), 1);
    }

    #[test]
    fn cancelled_before_start_is_interrupted() {
        let tmp = TempDir::new().unwrap();
        let fetcher = fetcher("127.0.0.1:9", 3);
        fetcher.cancel.store(true, Ordering::SeqCst);

        let result = fetcher.fetch("yt1", "mp4", tmp.path());

        assert!(matches!(result, Err(FetchError::Interrupted)));
        assert!(!tmp.path().join("yt1.mp4").exists());
    }

    #[test]
    fn placeholder_is_png() {
        assert!(PLACEHOLDER_PNG.starts_with(b"\x89PNG"));
    }

    #[test]
    fn uncommitted_partial_files_are_removed() {
        let tmp = TempDir::new().unwrap();
        let kept = tmp.path().join("kept");
        let dropped = tmp.path().join("dropped");
        fs::write(&kept, b"x").unwrap();
        fs::write(&dropped, b"x").unwrap();

        let mut committed = PartialFiles::new();
        committed.track(&kept);
        committed.commit();
        {
            let mut guard = PartialFiles::new();
            guard.track(&dropped);
        }

        assert!(kept.exists());
        assert!(!dropped.exists());
    }
}
