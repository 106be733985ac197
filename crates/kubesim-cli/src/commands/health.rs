//! Health check command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the health command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Simulator base URL
    #[arg(short, long, env = "KUBESIM_URL", default_value = "http://localhost:5000")]
    pub url: String,

    /// Timeout in seconds
    #[arg(short, long, default_value = "5")]
    pub timeout: u64,
}

/// Result of probing one endpoint.
#[derive(Debug, Serialize)]
pub struct ProbeOutput {
    /// Probed path
    pub endpoint: &'static str,
    /// Whether it answered 2xx
    pub ok: bool,
    /// HTTP status, if any response arrived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Round trip time
    pub response_time_ms: u64,
    /// Response body or connection error
    pub details: Value,
}

/// Execute the health command.
pub async fn execute(args: HealthArgs, json: bool) -> Result<()> {
    let format = OutputFormat::from_json_flag(json);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;
    let base = args.url.trim_end_matches('/');

    let mut probes = Vec::with_capacity(2);
    for endpoint in ["/healthz", "/readyz"] {
        probes.push(probe(&client, base, endpoint).await);
    }
    let healthy = probes.iter().all(|p| p.ok);

    if format == OutputFormat::Text {
        for p in &probes {
            output::status(
                &format!("{} ({}ms)", p.endpoint, p.response_time_ms),
                p.ok,
            );
        }
        if let Some(version) = probes[0].details.get("version").and_then(Value::as_str) {
            output::key_value("Version", version);
        }
    }

    let result = if healthy {
        CommandResult::success(probes, format!("Simulator at {base} is healthy"))
    } else {
        let mut result = CommandResult::failure(format!("Simulator at {base} is not healthy"));
        result.data = Some(probes);
        result
    };
    result.print(format)?;

    if healthy {
        Ok(())
    } else {
        anyhow::bail!("health check failed")
    }
}

async fn probe(client: &reqwest::Client, base: &str, endpoint: &'static str) -> ProbeOutput {
    let start = Instant::now();
    let response = client.get(format!("{base}{endpoint}")).send().await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match response {
        Ok(resp) => {
            let status = resp.status();
            let details = resp.json().await.unwrap_or(Value::Null);
            ProbeOutput {
                endpoint,
                ok: status.is_success(),
                status: Some(status.as_u16()),
                response_time_ms,
                details,
            }
        }
        Err(e) => ProbeOutput {
            endpoint,
            ok: false,
            status: None,
            response_time_ms,
            details: Value::String(format!("Failed to connect: {e}")),
        },
    }
}
