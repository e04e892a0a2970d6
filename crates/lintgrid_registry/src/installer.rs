//! Module installer.
//!
//! Lists the repository tree at the pinned commit through the GitHub REST API
//! and downloads every blob into a staging directory next to the final
//! location. The staging directory is renamed into place once complete, so an
//! archive directory either exists in full or not at all.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ModuleArchive;

/// Default request timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default maximum size of a single module file (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_RAW_URL: &str = "https://raw.githubusercontent.com";

#[derive(Debug, Error)]
pub enum InstallError {
    /// Network request failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unexpected HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// A module file exceeds the size limit.
    #[error("{path} is too large: {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { path: String, size: u64, max: u64 },

    /// The repository tree contains a path that would escape the archive directory.
    #[error("Refusing to write unsafe path from repository tree: {0}")]
    UnsafePath(String),

    /// The API returned a partial tree listing.
    #[error("Repository tree of {0} is too large to list")]
    TruncatedTree(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What [`GitHubInstaller::install`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled,
    Installed { files: usize },
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    truncated: bool,
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Installs GitHub modules into the module cache.
pub struct GitHubInstaller {
    client: reqwest::Client,
    api_base_url: String,
    raw_base_url: String,
    token: Option<String>,
    max_file_size: u64,
}

impl GitHubInstaller {
    /// Create an installer talking to github.com.
    pub fn new() -> Result<Self, InstallError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("lintgrid/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base_url: GITHUB_API_URL.to_string(),
            raw_base_url: GITHUB_RAW_URL.to_string(),
            token: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        })
    }

    /// Set the base URLs for API and raw content requests (for testing).
    pub fn with_base_urls(mut self, api: impl Into<String>, raw: impl Into<String>) -> Self {
        self.api_base_url = api.into();
        self.raw_base_url = raw.into();
        self
    }

    /// Authenticate tree and blob requests with a token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// Install an archive under `root`. No-op if its directory already exists.
    pub async fn install(
        &self,
        archive: &ModuleArchive,
        root: &Path,
    ) -> Result<InstallOutcome, InstallError> {
        let dest = root.join(archive.file_path());
        if tokio::fs::try_exists(&dest).await? {
            debug!(module = %archive, "module is already installed");
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        let parent = dest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        tokio::fs::create_dir_all(&parent).await?;

        let staging = parent.join(format!(".{}.partial", archive.reference));
        if tokio::fs::try_exists(&staging).await? {
            tokio::fs::remove_dir_all(&staging).await?;
        }

        info!(module = %archive, "downloading module");
        let files = match self.download_tree(archive, &staging).await {
            Ok(files) => files,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                    warn!(path = %staging.display(), "failed to remove staging directory: {cleanup}");
                }
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&staging, &dest).await {
            // Another process may have installed the same archive meanwhile.
            if tokio::fs::try_exists(&dest).await? {
                tokio::fs::remove_dir_all(&staging).await?;
                return Ok(InstallOutcome::AlreadyInstalled);
            }
            return Err(e.into());
        }

        info!(module = %archive, files, "installed module");
        Ok(InstallOutcome::Installed { files })
    }

    async fn download_tree(
        &self,
        archive: &ModuleArchive,
        staging: &Path,
    ) -> Result<usize, InstallError> {
        tokio::fs::create_dir_all(staging).await?;

        let blobs = self.list_blobs(archive).await?;
        for blob in &blobs {
            let relative = safe_relative_path(blob)?;
            let bytes = self.fetch_blob(archive, blob).await?;

            let target = staging.join(relative);
            if let Some(dir) = target.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            tokio::fs::write(&target, bytes).await?;
        }

        Ok(blobs.len())
    }

    async fn list_blobs(&self, archive: &ModuleArchive) -> Result<Vec<String>, InstallError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base_url, archive.owner, archive.repo, archive.reference
        );

        let request = self
            .authorized(self.client.get(&url))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");

        let response = check_status(request.send().await?, &url)?;
        let tree: TreeResponse = response.json().await?;
        if tree.truncated {
            return Err(InstallError::TruncatedTree(archive.to_string()));
        }

        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_blob(&self, archive: &ModuleArchive, path: &str) -> Result<Vec<u8>, InstallError> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_base_url, archive.owner, archive.repo, archive.reference, path
        );

        let request = self.authorized(self.client.get(&url));
        let response = check_status(request.send().await?, &url)?;
        let too_large = |size: u64| InstallError::TooLarge {
            path: path.to_string(),
            size,
            max: self.max_file_size,
        };

        if let Some(len) = response.content_length()
            && len > self.max_file_size
        {
            return Err(too_large(len));
        }

        let bytes = response.bytes().await?;
        if bytes.len() as u64 > self.max_file_size {
            return Err(too_large(bytes.len() as u64));
        }
        Ok(bytes.to_vec())
    }
}

fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response, InstallError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(InstallError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(InstallError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

fn safe_relative_path(path: &str) -> Result<PathBuf, InstallError> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(candidate.to_path_buf())
    } else {
        Err(InstallError::UnsafePath(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArchiveType;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REF: &str = "fedcba9876543210fedcba9876543210fedcba98";

    fn archive() -> ModuleArchive {
        ModuleArchive {
            kind: ArchiveType::GithubArchive,
            host: "github.com".to_string(),
            owner: "acme".to_string(),
            repo: "policies".to_string(),
            reference: REF.to_string(),
            tag: Some("v1.0.0".to_string()),
        }
    }

    fn installer(server: &MockServer) -> GitHubInstaller {
        GitHubInstaller::new()
            .unwrap()
            .with_base_urls(server.uri(), server.uri())
    }

    async fn mount_tree(server: &MockServer, body: serde_json::Value, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/acme/policies/git/trees/{REF}")))
            .and(query_param("recursive", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn mount_blob(server: &MockServer, file: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(format!("/acme/policies/{REF}/{file}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_install_downloads_all_blobs() {
        let server = MockServer::start().await;
        mount_tree(
            &server,
            serde_json::json!({
                "truncated": false,
                "tree": [
                    {"path": "rules", "type": "tree"},
                    {"path": "rules/a.wasm", "type": "blob"},
                    {"path": "README.md", "type": "blob"}
                ]
            }),
            1,
        )
        .await;
        mount_blob(&server, "rules/a.wasm", b"\0asm").await;
        mount_blob(&server, "README.md", b"# policies").await;

        let root = tempfile::tempdir().unwrap();
        let outcome = installer(&server)
            .install(&archive(), root.path())
            .await
            .unwrap();

        assert_eq!(outcome, InstallOutcome::Installed { files: 2 });
        let dest = root.path().join(archive().file_path());
        assert_eq!(std::fs::read(dest.join("rules/a.wasm")).unwrap(), b"\0asm");
        assert_eq!(
            std::fs::read_to_string(dest.join("README.md")).unwrap(),
            "# policies"
        );
    }

    #[tokio::test]
    async fn test_install_sends_token_with_every_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/repos/acme/policies/git/trees/{REF}")))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tree": [{"path": "rules/a.wasm", "type": "blob"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/acme/policies/{REF}/rules/a.wasm")))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\0asm".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let outcome = installer(&server)
            .with_token(Some("secret".to_string()))
            .install(&archive(), root.path())
            .await
            .unwrap();
        assert_eq!(outcome, InstallOutcome::Installed { files: 1 });
    }

    #[tokio::test]
    async fn test_install_is_noop_when_destination_exists() {
        let server = MockServer::start().await;
        mount_tree(&server, serde_json::json!({"tree": []}), 0).await;

        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(archive().file_path())).unwrap();

        let outcome = installer(&server)
            .install(&archive(), root.path())
            .await
            .unwrap();
        assert_eq!(outcome, InstallOutcome::AlreadyInstalled);
    }

    #[tokio::test]
    async fn test_install_missing_commit_leaves_nothing_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/repos/acme/policies/git/trees/{REF}")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let err = installer(&server)
            .install(&archive(), root.path())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::NotFound(_)), "{err}");
        let dest = root.path().join(archive().file_path());
        assert!(!dest.exists());
        let parent = dest.parent().unwrap();
        assert_eq!(std::fs::read_dir(parent).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_install_rejects_escaping_paths() {
        let server = MockServer::start().await;
        mount_tree(
            &server,
            serde_json::json!({"tree": [{"path": "../escape.wasm", "type": "blob"}]}),
            1,
        )
        .await;

        let root = tempfile::tempdir().unwrap();
        let err = installer(&server)
            .install(&archive(), root.path())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::UnsafePath(_)), "{err}");
        assert!(!root.path().join(archive().file_path()).exists());
    }

    #[tokio::test]
    async fn test_install_enforces_size_limit() {
        let server = MockServer::start().await;
        mount_tree(
            &server,
            serde_json::json!({"tree": [{"path": "big.json", "type": "blob"}]}),
            1,
        )
        .await;
        mount_blob(&server, "big.json", &[b'x'; 64]).await;

        let root = tempfile::tempdir().unwrap();
        let err = installer(&server)
            .with_max_file_size(16)
            .install(&archive(), root.path())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::TooLarge { size: 64, max: 16, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_install_rejects_truncated_tree() {
        let server = MockServer::start().await;
        mount_tree(&server, serde_json::json!({"truncated": true, "tree": []}), 1).await;

        let root = tempfile::tempdir().unwrap();
        let err = installer(&server)
            .install(&archive(), root.path())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::TruncatedTree(_)), "{err}");
    }

    #[test]
    fn test_safe_relative_path() {
        assert!(safe_relative_path("rules/a.wasm").is_ok());
        assert!(safe_relative_path("").is_err());
        assert!(safe_relative_path("/etc/passwd").is_err());
        assert!(safe_relative_path("rules/../../x").is_err());
    }
}
