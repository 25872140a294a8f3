//! Child-process driver for the uploader CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use vodrelay_core::process::{run_quiet, run_streaming};
use vodrelay_core::{Config, PostValidator, RelayError, RelayResult, SubmitMode};

use crate::submission::{parse_list_line, parse_submission_id, show_output_is_valid, RemotePost};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Copyright {
    Original,
    Reprint,
}

impl Copyright {
    fn as_flag(&self) -> &'static str {
        match self {
            Copyright::Original => "1",
            Copyright::Reprint => "2",
        }
    }
}

/// Everything needed to create a new post from one file.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub title: String,
    pub description: String,
    pub category: u32,
    pub tags: Vec<String>,
    pub source: String,
    pub cover: Option<PathBuf>,
    pub copyright: Copyright,
}

pub struct PlatformClient {
    executable: PathBuf,
    cookie_file: PathBuf,
    proxy: Option<String>,
    submit_mode: SubmitMode,
}

impl PlatformClient {
    pub fn new(config: &Config) -> Self {
        PlatformClient {
            executable: config.platform_client.executable.clone(),
            cookie_file: config.platform_client.cookie_file.clone(),
            proxy: config.platform_client.proxy.clone(),
            submit_mode: config.platform_client.default_submit_mode,
        }
    }

    fn base_cmd(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-u").arg(&self.cookie_file);
        if let Some(proxy) = &self.proxy {
            cmd.arg("-p").arg(proxy);
        }
        cmd
    }

    /// Interactive login: the tool drives a QR/SMS flow on the terminal, so
    /// stdio is inherited rather than captured.
    pub async fn login(&self) -> RelayResult<()> {
        let status = self
            .base_cmd()
            .arg("login")
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;
        if !status.success() {
            return Err(RelayError::Submission("login failed".to_string()));
        }
        Ok(())
    }

    /// Cheap credential probe: a one-page listing succeeds only with a live
    /// cookie.
    pub async fn check_logged_in(&self) -> bool {
        let mut cmd = self.base_cmd();
        cmd.args(["list", "--max-pages", "1"]);
        match run_quiet(cmd).await {
            Ok((status, _, _)) => status.success(),
            Err(err) => {
                tracing::warn!(error = %err, "could not invoke uploader for login check");
                false
            }
        }
    }

    /// Create a new post and return its platform id, parsed from the tool's
    /// transcript.
    pub async fn upload(&self, request: &UploadRequest) -> RelayResult<String> {
        tracing::info!(
            file = %request.path.display(),
            title = request.title,
            mode = self.submit_mode.as_str(),
            "submitting new post"
        );

        let mut cmd = self.base_cmd();
        cmd.arg("upload")
            .arg(&request.path)
            .args(["--submit", self.submit_mode.as_str()])
            .args(["--copyright", request.copyright.as_flag()])
            .arg("--tid")
            .arg(request.category.to_string())
            .arg("--title")
            .arg(&request.title)
            .arg("--desc")
            .arg(&request.description)
            .arg("--source")
            .arg(&request.source);
        if !request.tags.is_empty() {
            cmd.arg("--tag").arg(request.tags.join(","));
        }
        if let Some(cover) = &request.cover {
            cmd.arg("--cover").arg(cover);
        }

        let (status, transcript) = run_streaming(cmd, "uploader").await?;
        if !status.success() {
            return Err(RelayError::Submission(format!(
                "uploader exited with {status} for {}",
                request.path.display()
            )));
        }

        match parse_submission_id(&transcript) {
            Some(id) => {
                tracing::info!(platform_id = id, "post created");
                Ok(id)
            }
            // Exit zero without an id means the submission state is unknown;
            // surface it rather than guess.
            None => Err(RelayError::Submission(format!(
                "uploader succeeded but printed no post id for {}",
                request.path.display()
            ))),
        }
    }

    /// Append one more file to an existing post.
    pub async fn append(&self, platform_id: &str, path: &Path) -> RelayResult<()> {
        tracing::info!(platform_id, file = %path.display(), "appending to post");

        let mut cmd = self.base_cmd();
        cmd.arg("append").args(["--vid", platform_id]).arg(path);

        let (status, _) = run_streaming(cmd, "uploader").await?;
        if !status.success() {
            return Err(RelayError::Submission(format!(
                "append to {platform_id} exited with {status} for {}",
                path.display()
            )));
        }
        Ok(())
    }

    /// Whether the post still resolves on the platform.
    pub async fn validate_post(&self, platform_id: &str) -> bool {
        let mut cmd = self.base_cmd();
        cmd.args(["show", platform_id]);
        match run_quiet(cmd).await {
            Ok((status, stdout, _)) => show_output_is_valid(status.success(), &stdout),
            Err(err) => {
                // An unreachable tool says nothing about the post.
                tracing::warn!(platform_id, error = %err, "could not invoke uploader, assuming post valid");
                true
            }
        }
    }

    /// The account's most recent posts, newest first, at most `limit`.
    pub async fn list_recent(&self, limit: usize) -> RelayResult<Vec<RemotePost>> {
        let mut cmd = self.base_cmd();
        cmd.args(["list", "--max-pages", "1", "--from-page", "1"]);
        let (status, stdout, stderr) = run_quiet(cmd).await?;
        if !status.success() {
            return Err(RelayError::Submission(format!(
                "list failed: {}",
                stderr.trim()
            )));
        }

        let mut posts: Vec<RemotePost> = stdout.lines().filter_map(parse_list_line).collect();
        posts.truncate(limit);
        Ok(posts)
    }
}

#[async_trait]
impl PostValidator for PlatformClient {
    async fn validate(&self, platform_id: &str) -> bool {
        self.validate_post(platform_id).await
    }
}
