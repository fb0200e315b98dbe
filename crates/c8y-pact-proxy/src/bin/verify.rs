//! c8y Pact Verifier CLI Tool
//!
//! Replays the records of stored pacts against a live Cumulocity tenant and
//! checks each live response against the recorded one.
//!
//! Usage:
//!   c8y-pact-verify --folder ./c8ypact --base-url https://t123.example.com [OPTIONS]
//!
//! Objects created by a replayed POST get new ids on the live system. Later
//! request URLs that contain the recorded id are rewritten to the live id.

use anyhow::Context;
use c8y_pact_proxy::adapter::{FileAdapter, PactAdapter};
use c8y_pact_proxy::config::AuthConfig;
use c8y_pact_proxy::matching::{
    DefaultPactMatcher, DefaultUrlMatcher, MatchInput, MatchOptions, PactMatcher,
};
use c8y_pact_proxy::pact::{Pact, PactId, PactRecord, PactResponse};
use c8y_pact_proxy::schema::JsonSchemaMatcher;
use clap::Parser;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Request headers never replayed as recorded
const SKIPPED_HEADERS: [&str; 5] = [
    "authorization",
    "host",
    "content-length",
    "accept-encoding",
    "connection",
];

/// c8y Pact Verifier - replay recorded pacts against a live system
#[derive(Parser, Debug)]
#[command(name = "c8y-pact-verify")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder holding the pact files
    #[arg(short, long, env = "C8Y_PACT_FOLDER", default_value = "./c8ypact")]
    folder: PathBuf,

    /// Tenant URL the records are replayed against
    #[arg(short, long, env = "C8Y_BASEURL")]
    base_url: String,

    #[arg(long, env = "C8Y_TENANT")]
    tenant: Option<String>,

    #[arg(short, long, env = "C8Y_USERNAME")]
    user: String,

    #[arg(short, long, env = "C8Y_PASSWORD", hide_env_values = true)]
    password: String,

    /// Only verify these pact ids (repeatable)
    #[arg(long = "pact")]
    pacts: Vec<String>,

    /// Exit with a non-zero code when a record does not match
    #[arg(long)]
    fail_on_pact_validation: bool,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default)]
struct VerificationSummary {
    total_pacts: usize,
    total_records: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
    failures: Vec<FailureDetails>,
}

#[derive(Debug)]
struct FailureDetails {
    pact: PactId,
    record_index: usize,
    request: String,
    reason: String,
}

/// Recorded id to live id, filled from `createdObject` of replayed POSTs.
#[derive(Debug, Default)]
struct CreatedObjects {
    ids: HashMap<String, String>,
}

impl CreatedObjects {
    fn remember(&mut self, recorded: Option<&str>, live: Option<&str>) {
        if let (Some(recorded), Some(live)) = (recorded, live) {
            if recorded != live {
                self.ids.insert(recorded.to_string(), live.to_string());
            }
        }
    }

    /// Replace path segments and query values equal to a recorded id.
    fn remap(&self, url: &str) -> String {
        if self.ids.is_empty() {
            return url.to_string();
        }
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };
        let path = path
            .split('/')
            .map(|segment| self.ids.get(segment).map(String::as_str).unwrap_or(segment))
            .collect::<Vec<_>>()
            .join("/");
        match query {
            None => path,
            Some(query) => {
                let query = query
                    .split('&')
                    .map(|pair| match pair.split_once('=') {
                        Some((key, value)) => match self.ids.get(value) {
                            Some(live) => format!("{key}={live}"),
                            None => pair.to_string(),
                        },
                        None => pair.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("&");
                format!("{path}?{query}")
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let client = Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;
    let auth = AuthConfig {
        user: args.user.clone(),
        password: args.password.clone(),
        tenant: args.tenant.clone(),
    };

    println!("{BOLD}{CYAN}c8y Pact Verifier{RESET}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Folder:   {}", args.folder.display());
    println!("Base URL: {}", args.base_url);
    println!();

    let adapter = FileAdapter::new(&args.folder);
    let pacts = adapter
        .load_pacts()
        .with_context(|| format!("Failed to load pacts from {}", args.folder.display()))?;
    let selected: Vec<Pact> = pacts
        .into_values()
        .filter(|pact| {
            args.pacts.is_empty() || args.pacts.iter().any(|id| id.as_str() == pact.id.as_str())
        })
        .collect();

    if selected.is_empty() {
        println!("{YELLOW}Warning:{RESET} No pacts found");
        return Ok(());
    }

    let mut summary = VerificationSummary {
        total_pacts: selected.len(),
        ..Default::default()
    };

    for pact in &selected {
        println!("{}Pact:{} {} ({} records)", BOLD, RESET, pact.id, pact.len());
        verify_pact(&client, &args, &auth, pact, &mut summary).await;
        println!();
    }

    print_summary(&summary, args.fail_on_pact_validation);

    if summary.failed > 0 && args.fail_on_pact_validation {
        std::process::exit(1);
    }
    Ok(())
}

async fn verify_pact(
    client: &Client,
    args: &Args,
    auth: &AuthConfig,
    pact: &Pact,
    summary: &mut VerificationSummary,
) {
    let url_matcher = DefaultUrlMatcher::from_options(&[pact.info.request_matching.as_ref()]);
    let matcher = DefaultPactMatcher::new(Arc::new(JsonSchemaMatcher), Arc::new(url_matcher));
    let options = MatchOptions {
        strict_matching: pact.info.strict_matching.unwrap_or(true),
        ..Default::default()
    };
    let mut created = CreatedObjects::default();

    for (index, record) in pact.records.iter().enumerate() {
        summary.total_records += 1;
        let line = request_line(record);
        if !record.is_replayable() {
            summary.skipped += 1;
            if args.verbose {
                println!("   {YELLOW}SKIP{RESET} #{index} - no method or url");
            }
            continue;
        }

        let started = Instant::now();
        let outcome = match replay(client, &args.base_url, auth, record, &created).await {
            Ok(live) => {
                created.remember(record.created_object.as_deref(), live.created_object.as_deref());
                matcher
                    .check(&live, MatchInput::Record(record), &options)
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(format!("request failed: {e:#}")),
        };
        let elapsed = started.elapsed().as_millis();

        match outcome {
            Ok(()) => {
                summary.passed += 1;
                if args.verbose {
                    println!("   {GREEN}PASS{RESET} #{index} - {line} ({elapsed}ms)");
                }
            }
            Err(reason) => {
                summary.failed += 1;
                println!("   {RED}FAIL{RESET} #{index} - {line}");
                summary.failures.push(FailureDetails {
                    pact: pact.id.clone(),
                    record_index: index,
                    request: line,
                    reason,
                });
            }
        }
    }
}

/// Send `record`'s request to the live system. The returned record keeps the
/// recorded request so only the response side differs.
async fn replay(
    client: &Client,
    base_url: &str,
    auth: &AuthConfig,
    record: &PactRecord,
    created: &CreatedObjects,
) -> anyhow::Result<PactRecord> {
    let method = record.request.method.as_deref().unwrap_or("GET");
    let url = created.remap(record.request.url.as_deref().unwrap_or("/"));
    let target = if url.starts_with("http://") || url.starts_with("https://") {
        url
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), url)
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &record.request.headers {
        if SKIPPED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in value.values() {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(name.clone(), value);
            }
        }
    }
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth.basic_header())?);

    let mut request = client
        .request(Method::from_bytes(method.as_bytes())?, &target)
        .headers(headers);
    if let Some(body) = &record.request.body {
        request = match body {
            serde_json::Value::String(text) => request.body(text.clone()),
            other => request.json(other),
        };
    }

    let response = request.send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;
    let mut live = PactResponse::new(status.as_u16());
    live.status_text = status.canonical_reason().map(str::to_string);
    if !bytes.is_empty() {
        live.body = Some(serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }));
    }
    Ok(PactRecord::new(record.request.clone(), live))
}

fn request_line(record: &PactRecord) -> String {
    format!(
        "{} {}",
        record.request.method.as_deref().unwrap_or("?"),
        record.request.url.as_deref().unwrap_or("?")
    )
}

fn print_summary(summary: &VerificationSummary, failing: bool) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{BOLD}Verification Summary{RESET}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Pacts:    {}", summary.total_pacts);
    println!("  Records:  {}", summary.total_records);
    println!();
    println!("  {}Passed:  {}{}", GREEN, summary.passed, RESET);
    println!("  {}Failed:  {}{}", RED, summary.failed, RESET);
    println!("  {}Skipped: {}{}", YELLOW, summary.skipped, RESET);
    println!();

    if !summary.failures.is_empty() {
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("{RED}Failure Details{RESET}");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for (i, failure) in summary.failures.iter().enumerate() {
            println!();
            println!(
                "{}. Pact {} - Record #{}",
                i + 1,
                failure.pact,
                failure.record_index
            );
            println!("   Request: {}", failure.request);
            for line in failure.reason.lines() {
                println!("   {DIM}{line}{RESET}");
            }
        }
        println!();
    }

    if summary.failed == 0 {
        println!("{GREEN}All records matched!{RESET}");
    } else if failing {
        println!(
            "{}{} record(s) did not match. See details above.{}",
            RED, summary.failed, RESET
        );
    } else {
        println!(
            "{}{} record(s) did not match (not failing, --fail-on-pact-validation not set).{}",
            YELLOW, summary.failed, RESET
        );
    }
}
