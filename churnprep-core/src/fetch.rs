//! Archive fetcher trait and the Kaggle implementation.
//!
//! The [`ArchiveFetcher`] trait keeps the pipeline independent of the remote
//! service so it can be driven by a fake in tests. [`KaggleFetcher`] talks to
//! the Kaggle REST API with a blocking client and HTTP basic auth.

use crate::config::KaggleConfig;
use crate::error::PrepError;
use serde::Deserialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retrieves a named competition archive into a directory.
pub trait ArchiveFetcher {
    /// Human-readable name of the remote source.
    fn name(&self) -> &str;

    /// Download the archive for `competition` into `destination_dir`,
    /// replacing any archive already there. Returns the archive path.
    fn fetch(&self, competition: &str, destination_dir: &Path) -> Result<PathBuf, PrepError>;
}

/// Kaggle API credentials.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials the way the official Kaggle client does:
    /// `KAGGLE_USERNAME` + `KAGGLE_KEY`, then `$KAGGLE_CONFIG_DIR/kaggle.json`,
    /// then `~/.kaggle/kaggle.json`.
    pub fn from_env() -> Result<Self, PrepError> {
        Self::resolve(|name| std::env::var(name).ok(), dirs::home_dir())
    }

    /// Resolution with injectable environment lookup and home directory.
    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Self, PrepError> {
        let non_empty = |name: &str| env(name).filter(|v| !v.is_empty());
        if let (Some(username), Some(key)) =
            (non_empty("KAGGLE_USERNAME"), non_empty("KAGGLE_KEY"))
        {
            return Ok(Self { username, key });
        }

        let config_dir = non_empty("KAGGLE_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| home.map(|h| h.join(".kaggle")))
            .ok_or_else(|| {
                PrepError::Authentication(
                    "no KAGGLE_USERNAME/KAGGLE_KEY and no home directory to find kaggle.json".into(),
                )
            })?;

        Self::from_file(&config_dir.join("kaggle.json"))
    }

    /// Read a `kaggle.json` credentials file.
    pub fn from_file(path: &Path) -> Result<Self, PrepError> {
        let content = fs::read_to_string(path).map_err(|e| {
            PrepError::Authentication(format!("cannot read {}: {e}", path.display()))
        })?;
        let creds: Self = serde_json::from_str(&content).map_err(|e| {
            PrepError::Authentication(format!("malformed {}: {e}", path.display()))
        })?;
        if creds.username.is_empty() || creds.key.is_empty() {
            return Err(PrepError::Authentication(format!(
                "{} has an empty username or key",
                path.display()
            )));
        }
        Ok(creds)
    }
}

/// Kaggle competition downloader.
pub struct KaggleFetcher {
    client: reqwest::blocking::Client,
    api_base: String,
    credentials: Option<Credentials>,
}

impl KaggleFetcher {
    pub fn new(config: &KaggleConfig) -> Result<Self, PrepError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("churnprep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PrepError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    /// Use fixed credentials instead of resolving them at fetch time.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn download_url(&self, competition: &str) -> String {
        format!(
            "{}/competitions/data/download-all/{competition}",
            self.api_base
        )
    }

    fn credentials(&self) -> Result<Credentials, PrepError> {
        match &self.credentials {
            Some(c) => Ok(c.clone()),
            None => Credentials::from_env(),
        }
    }
}

/// Map a non-success HTTP status to the matching error.
pub fn classify_status(status: reqwest::StatusCode, competition: &str) -> Option<PrepError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        reqwest::StatusCode::UNAUTHORIZED => {
            PrepError::Authentication("Kaggle rejected the supplied credentials".into())
        }
        reqwest::StatusCode::FORBIDDEN => PrepError::Authentication(format!(
            "access to '{competition}' denied; the competition rules may need to be accepted"
        )),
        reqwest::StatusCode::NOT_FOUND => {
            PrepError::NotFound(format!("competition '{competition}'"))
        }
        other => PrepError::Network(format!("HTTP {other} downloading '{competition}'")),
    })
}

impl ArchiveFetcher for KaggleFetcher {
    fn name(&self) -> &str {
        "kaggle"
    }

    fn fetch(&self, competition: &str, destination_dir: &Path) -> Result<PathBuf, PrepError> {
        let credentials = self.credentials()?;
        let url = self.download_url(competition);
        tracing::info!(competition, user = %credentials.username, "requesting archive");

        let mut resp = self
            .client
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.key))
            .send()
            .map_err(|e| PrepError::Network(e.to_string()))?;

        if let Some(err) = classify_status(resp.status(), competition) {
            return Err(err);
        }

        fs::create_dir_all(destination_dir).map_err(|e| PrepError::io(destination_dir, e))?;
        let archive_path = destination_dir.join(format!("{competition}.zip"));
        let part_path = archive_path.with_extension("zip.part");

        let written = {
            let mut file = File::create(&part_path).map_err(|e| PrepError::io(&part_path, e))?;
            resp.copy_to(&mut file)
        };
        let bytes = written.map_err(|e| {
            let _ = fs::remove_file(&part_path);
            PrepError::Network(format!("download of '{competition}' interrupted: {e}"))
        })?;

        if archive_path.exists() {
            tracing::warn!(path = %archive_path.display(), "replacing existing archive");
        }
        fs::rename(&part_path, &archive_path).map_err(|e| {
            let _ = fs::remove_file(&part_path);
            PrepError::io(&archive_path, e)
        })?;

        tracing::info!(path = %archive_path.display(), bytes, "archive downloaded");
        Ok(archive_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture_warnings;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer a single HTTP request with `status` and `body`. The join handle
    /// yields the raw request head.
    fn serve_once(status: &'static str, body: Vec<u8>) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn fetcher_for(api_base: String) -> KaggleFetcher {
        KaggleFetcher::new(&KaggleConfig {
            api_base,
            timeout_secs: 10,
        })
        .unwrap()
        .with_credentials(Credentials {
            username: "u".into(),
            key: "k".into(),
        })
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn env_credentials_take_precedence() {
        let temp = tempfile::tempdir().unwrap();
        let creds = Credentials::resolve(
            env_from(&[("KAGGLE_USERNAME", "alice"), ("KAGGLE_KEY", "s3cret")]),
            Some(temp.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.key, "s3cret");
    }

    #[test]
    fn falls_back_to_kaggle_json_in_home() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join(".kaggle");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("kaggle.json"), r#"{"username":"bob","key":"abc123"}"#).unwrap();

        let creds = Credentials::resolve(
            env_from(&[("KAGGLE_USERNAME", "only-half")]),
            Some(temp.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(creds.username, "bob");
    }

    #[test]
    fn config_dir_overrides_home() {
        let temp = tempfile::tempdir().unwrap();
        let custom = temp.path().join("custom");
        fs::create_dir_all(&custom).unwrap();
        fs::write(custom.join("kaggle.json"), r#"{"username":"carol","key":"k"}"#).unwrap();

        let creds = Credentials::resolve(
            env_from(&[("KAGGLE_CONFIG_DIR", custom.to_str().unwrap())]),
            None,
        )
        .unwrap();
        assert_eq!(creds.username, "carol");
    }

    #[test]
    fn missing_credentials_is_authentication_error() {
        let temp = tempfile::tempdir().unwrap();
        let err =
            Credentials::resolve(env_from(&[]), Some(temp.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, PrepError::Authentication(_)));

        let err = Credentials::resolve(env_from(&[]), None).unwrap_err();
        assert!(matches!(err, PrepError::Authentication(_)));
    }

    #[test]
    fn malformed_kaggle_json_is_authentication_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("kaggle.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Credentials::from_file(&path),
            Err(PrepError::Authentication(_))
        ));

        fs::write(&path, r#"{"username":"","key":"k"}"#).unwrap();
        assert!(matches!(
            Credentials::from_file(&path),
            Err(PrepError::Authentication(_))
        ));
    }

    #[test]
    fn debug_output_redacts_key() {
        let creds = Credentials {
            username: "alice".into(),
            key: "s3cret".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("alice"));
        assert!(!shown.contains("s3cret"));
    }

    #[test]
    fn status_mapping() {
        use reqwest::StatusCode;

        assert!(classify_status(StatusCode::OK, "c").is_none());
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "c"),
            Some(PrepError::Authentication(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "c"),
            Some(PrepError::Authentication(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "c"),
            Some(PrepError::NotFound(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "c"),
            Some(PrepError::Network(_))
        ));
    }

    #[test]
    fn download_url_strips_trailing_slash() {
        let fetcher = KaggleFetcher::new(&KaggleConfig {
            api_base: "https://example.test/api/v1/".into(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(
            fetcher.download_url("playground-series-s4e1"),
            "https://example.test/api/v1/competitions/data/download-all/playground-series-s4e1"
        );
        assert_eq!(fetcher.name(), "kaggle");
    }

    #[test]
    fn successful_download_replaces_existing_archive() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("comp.zip"), b"old archive").unwrap();

        let (base, server) = serve_once("200 OK", b"PK\x03\x04 new archive".to_vec());
        let fetcher = fetcher_for(base);
        let (result, logs) = capture_warnings(|| fetcher.fetch("comp", temp.path()));
        let request = server.join().unwrap();

        let path = result.unwrap();
        assert_eq!(path, temp.path().join("comp.zip"));
        assert_eq!(fs::read(&path).unwrap(), b"PK\x03\x04 new archive");
        assert!(!temp.path().join("comp.zip.part").exists());
        assert!(logs.contains("replacing existing archive"), "{logs}");

        assert!(
            request.starts_with("GET /competitions/data/download-all/comp "),
            "{request}"
        );
        // base64("u:k")
        assert!(
            request
                .to_ascii_lowercase()
                .contains("authorization: basic dtpr"),
            "{request}"
        );
    }

    #[test]
    fn download_creates_missing_destination() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("data/raw");

        let (base, server) = serve_once("200 OK", b"zip bytes".to_vec());
        let path = fetcher_for(base).fetch("comp", &dest).unwrap();
        server.join().unwrap();

        assert_eq!(path, dest.join("comp.zip"));
        assert_eq!(fs::read(&path).unwrap(), b"zip bytes");
    }

    #[test]
    fn not_found_response_keeps_prior_archive() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("comp.zip"), b"old archive").unwrap();

        let (base, server) = serve_once("404 Not Found", b"{}".to_vec());
        let err = fetcher_for(base).fetch("comp", temp.path()).unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, PrepError::NotFound(_)), "{err}");
        assert_eq!(
            fs::read(temp.path().join("comp.zip")).unwrap(),
            b"old archive"
        );
        assert!(!temp.path().join("comp.zip.part").exists());
    }

    #[test]
    fn unauthorized_response_is_authentication_error() {
        let temp = tempfile::tempdir().unwrap();

        let (base, server) = serve_once("401 Unauthorized", Vec::new());
        let err = fetcher_for(base).fetch("comp", temp.path()).unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, PrepError::Authentication(_)), "{err}");
        assert!(!temp.path().join("comp.zip").exists());
    }

    #[test]
    fn unreachable_host_is_network_error() {
        let temp = tempfile::tempdir().unwrap();
        let fetcher = KaggleFetcher::new(&KaggleConfig {
            api_base: "http://127.0.0.1:9".into(),
            timeout_secs: 5,
        })
        .unwrap()
        .with_credentials(Credentials {
            username: "u".into(),
            key: "k".into(),
        });

        let err = fetcher.fetch("titanic", temp.path()).unwrap_err();
        assert!(matches!(err, PrepError::Network(_)), "{err}");
        assert!(!temp.path().join("titanic.zip").exists());
    }
}
