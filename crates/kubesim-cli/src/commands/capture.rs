//! Capture command - record discovery responses from a real cluster.
//!
//! Every path is fetched with `GET`. Successful responses become seed
//! entries; bodies that are not JSON are kept as `{"text": <body>}`. Paths
//! that fail are reported and left out of the file.

use anyhow::{Context, Result};
use clap::Args;
use futures::stream::{self, StreamExt};
use kubesim_config::{SeedEntry, SeedFile};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::output::{self, CommandResult, OutputFormat};

/// Discovery paths captured when no paths file is given.
pub const DEFAULT_PATHS: &[&str] = &[
    "/api",
    "/api/v1",
    "/apis",
    "/apis/admissionregistration.k8s.io/v1",
    "/apis/apiextensions.k8s.io/v1",
    "/apis/apiregistration.k8s.io/v1",
    "/apis/apps/v1",
    "/apis/authentication.k8s.io/v1",
    "/apis/authorization.k8s.io/v1",
    "/apis/autoscaling/v1",
    "/apis/autoscaling/v2",
    "/apis/batch/v1",
    "/apis/certificates.k8s.io/v1",
    "/apis/coordination.k8s.io/v1",
    "/apis/discovery.k8s.io/v1",
    "/apis/events.k8s.io/v1",
    "/apis/flowcontrol.apiserver.k8s.io/v1",
    "/apis/flowcontrol.apiserver.k8s.io/v1beta3",
    "/apis/metrics.k8s.io/v1beta1",
    "/apis/networking.k8s.io/v1",
    "/apis/node.k8s.io/v1",
    "/apis/policy/v1",
    "/apis/rbac.authorization.k8s.io/v1",
    "/apis/scheduling.k8s.io/v1",
    "/apis/snapshot.storage.k8s.io/v1",
    "/apis/storage.k8s.io/v1",
    "/openapi/v2",
    "/openapi/v3",
    "/openapi/v3/api/v1",
];

/// Arguments for the capture command.
#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Cluster API endpoint, e.g. `https://10.0.0.1`
    #[arg(short, long, env = "KUBE_API_ENDPOINT")]
    pub endpoint: String,

    /// Bearer token for the cluster
    #[arg(short, long, env = "KUBE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// File with one path per line; `#` starts a comment
    #[arg(long)]
    pub paths_file: Option<PathBuf>,

    /// Output seed file
    #[arg(short, long, default_value = "predefined_cache.json")]
    pub out: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Requests in flight at once
    #[arg(long, default_value = "4")]
    pub concurrency: usize,
}

/// Capture output.
#[derive(Debug, Serialize)]
pub struct CaptureOutput {
    /// File written
    pub out: PathBuf,
    /// Paths captured
    pub captured: usize,
    /// Paths that failed, with the reason
    pub failed: Vec<FailedPath>,
}

/// A path that could not be captured.
#[derive(Debug, Serialize)]
pub struct FailedPath {
    /// Requested path
    pub api_path: String,
    /// What went wrong
    pub reason: String,
}

/// Execute the capture command.
pub async fn execute(args: CaptureArgs, json: bool) -> Result<()> {
    let format = OutputFormat::from_json_flag(json);

    let paths = match &args.paths_file {
        Some(file) => {
            let content = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            parse_paths(&content)
        }
        None => DEFAULT_PATHS.iter().map(|p| (*p).to_string()).collect(),
    };

    url::Url::parse(&args.endpoint)
        .with_context(|| format!("Invalid endpoint: {}", args.endpoint))?;
    let base = args.endpoint.trim_end_matches('/').to_string();
    let client = build_client(&args)?;

    let spinner = (!json).then(|| output::spinner(&format!("Capturing {} paths...", paths.len())));

    let results: Vec<(String, Result<Value, String>)> = stream::iter(paths)
        .map(|path| {
            let client = &client;
            let base = &base;
            async move {
                let result = fetch(client, base, &path).await;
                (path, result)
            }
        })
        .buffered(args.concurrency.max(1))
        .collect()
        .await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let mut seed = SeedFile::default();
    let mut failed = Vec::new();
    for (api_path, result) in results {
        match result {
            Ok(response) => seed.entries.push(SeedEntry { api_path, response }),
            Err(reason) => {
                warn!(%api_path, %reason, "Capture failed");
                if !json {
                    output::error(&format!("api {api_path} failed: {reason}"));
                }
                failed.push(FailedPath { api_path, reason });
            }
        }
    }

    seed.write(&args.out)
        .await
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    let message = format!(
        "Captured {} paths into {} ({} failed)",
        seed.len(),
        args.out.display(),
        failed.len()
    );
    CommandResult::success(
        CaptureOutput {
            out: args.out,
            captured: seed.len(),
            failed,
        },
        message,
    )
    .print(format)
}

fn build_client(args: &CaptureArgs) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .danger_accept_invalid_certs(args.insecure);

    if let Some(token) = &args.token {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
            .context("Token is not a valid header value")?;
        value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }

    Ok(builder.build()?)
}

async fn fetch(client: &reqwest::Client, base: &str, path: &str) -> Result<Value, String> {
    let url = format!("{base}{path}");
    debug!(%url, "Capturing");

    let response = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| e.without_url().to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }

    let body = response.text().await.map_err(|e| e.without_url().to_string())?;
    Ok(body_to_value(body))
}

/// JSON bodies are kept as parsed; anything else is wrapped as `{"text": ...}`
fn body_to_value(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or_else(|_| json!({ "text": body }))
}

fn parse_paths(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
