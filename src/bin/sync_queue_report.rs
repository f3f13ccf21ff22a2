use anyhow::{Context, Result, bail};
use chrono::Utc;
use diag_sync::application::ports::record_store::{RecordFilter, RecordStore};
use diag_sync::application::ports::sync_queue::SyncQueueStore;
use diag_sync::domain::entities::QueueEntry;
use diag_sync::domain::value_objects::OwnerScope;
use diag_sync::infrastructure::{ConnectionPool, SqliteLocalStore};
use diag_sync::shared::AppConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tokio::runtime::Runtime;

const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone)]
struct CliOptions {
    output: Option<PathBuf>,
    pretty: bool,
    scope: Option<String>,
    limit: usize,
    database_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueueEntryView {
    id: i64,
    record_id: String,
    owner_scope: String,
    operation: String,
    attempts: u32,
    last_error: Option<String>,
    last_error_kind: Option<String>,
    next_attempt_at_ms: i64,
    ready: bool,
    created_at_ms: i64,
}

impl QueueEntryView {
    fn new(entry: &QueueEntry, now: i64) -> Self {
        Self {
            id: entry.id.value(),
            record_id: entry.record_id.to_string(),
            owner_scope: entry.owner_scope.to_string(),
            operation: entry.operation.as_str().to_string(),
            attempts: entry.attempts,
            last_error: entry.last_error.clone(),
            last_error_kind: entry.last_error_kind.map(|kind| kind.as_str().to_string()),
            next_attempt_at_ms: entry.next_attempt_at,
            ready: entry.is_ready(now),
            created_at_ms: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct QueueReport {
    generated_at_ms: i64,
    database_url: String,
    scope: Option<String>,
    total_entries: usize,
    ready_entries: usize,
    backing_off_entries: usize,
    by_operation: BTreeMap<String, usize>,
    pending_records: Option<u64>,
    needs_attention: Vec<String>,
    entries: Vec<QueueEntryView>,
}

fn usage() -> &'static str {
    "Usage: sync_queue_report [--scope <owner-scope>] [--output <path>] [--pretty] [--limit <n>] [--database-url <url>]"
}

fn write_output(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

fn emit_payload(target: Option<&Path>, payload: &str) -> Result<()> {
    if let Some(path) = target {
        write_output(path, payload)?;
        println!("Report written to {}", path.display());
    } else {
        println!("{payload}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(args)?;

    let database_url = resolve_database_url(&options);
    let rt = Runtime::new().context("Failed to create Tokio runtime")?;
    let report = rt.block_on(async {
        collect_report(&database_url, &options)
            .await
            .with_context(|| format!("Failed to read sync queue from {database_url}"))
    })?;

    let payload = to_json(&report, options.pretty)?;
    emit_payload(options.output.as_deref(), &payload)
}

async fn collect_report(database_url: &str, options: &CliOptions) -> Result<QueueReport> {
    let config = AppConfig::from_env();
    let pool = ConnectionPool::new(database_url, 1).await?;
    let store = SqliteLocalStore::from_config(pool.clone(), &config);
    store.initialize().await?;

    let scope = options
        .scope
        .as_deref()
        .map(|value| OwnerScope::new(value.to_string()))
        .transpose()
        .map_err(|e| anyhow::anyhow!("{e}\n{}", usage()))?;

    let now = Utc::now().timestamp_millis();
    let entries = store.list_entries(scope.as_ref()).await?;

    let mut by_operation: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &entries {
        *by_operation
            .entry(entry.operation.as_str().to_string())
            .or_default() += 1;
    }
    let ready_entries = entries.iter().filter(|entry| entry.is_ready(now)).count();

    let (pending_records, needs_attention) = match scope.as_ref() {
        Some(scope) => {
            let pending = store.count_pending(scope).await?;
            let flagged = store
                .list(scope, &RecordFilter::default())
                .await?
                .into_iter()
                .filter(|record| record.sync_meta.needs_attention)
                .map(|record| record.id.to_string())
                .collect();
            (Some(pending), flagged)
        }
        None => (None, Vec::new()),
    };

    let report = QueueReport {
        generated_at_ms: now,
        database_url: database_url.to_string(),
        scope: scope.map(|scope| scope.to_string()),
        total_entries: entries.len(),
        ready_entries,
        backing_off_entries: entries.len() - ready_entries,
        by_operation,
        pending_records,
        needs_attention,
        entries: entries
            .iter()
            .take(options.limit)
            .map(|entry| QueueEntryView::new(entry, now))
            .collect(),
    };

    pool.close().await;
    Ok(report)
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

fn parse_args<I>(args: I) -> Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut output: Option<PathBuf> = None;
    let mut pretty = false;
    let mut scope: Option<String> = None;
    let mut limit = DEFAULT_LIMIT;
    let mut database_url: Option<String> = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" | "--output" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--output requires a path\n{}", usage()))?;
                output = Some(PathBuf::from(path));
            }
            "--pretty" => {
                pretty = true;
            }
            "--scope" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--scope requires a value\n{}", usage()))?;
                scope = Some(value);
            }
            "--limit" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--limit requires a value\n{}", usage()))?;
                limit = parse_limit(&value)?;
            }
            "--database-url" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("--database-url requires a value\n{}", usage())
                })?;
                database_url = Some(value);
            }
            "-h" | "--help" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => {
                bail!("Unknown argument: {other}\n{}", usage());
            }
        }
    }

    Ok(CliOptions {
        output,
        pretty,
        scope,
        limit,
        database_url,
    })
}

fn parse_limit(value: &str) -> Result<usize> {
    let parsed: usize = value
        .parse()
        .with_context(|| format!("Invalid limit '{value}'. Expected a positive integer."))?;
    if parsed == 0 {
        bail!("--limit must be greater than 0");
    }
    Ok(parsed)
}

fn resolve_database_url(options: &CliOptions) -> String {
    if let Some(url) = &options.database_url {
        return url.clone();
    }
    AppConfig::from_env().database.url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_all_flags() {
        let options = parse_args(args(&[
            "--scope",
            "org-1",
            "--pretty",
            "--limit",
            "5",
            "--database-url",
            "sqlite::memory:",
            "-o",
            "out/report.json",
        ]))
        .unwrap();

        assert_eq!(options.scope.as_deref(), Some("org-1"));
        assert!(options.pretty);
        assert_eq!(options.limit, 5);
        assert_eq!(options.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(options.output, Some(PathBuf::from("out/report.json")));
    }

    #[test]
    fn rejects_zero_limit_and_unknown_flags() {
        assert!(parse_args(args(&["--limit", "0"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
        assert!(parse_args(args(&["--scope"])).is_err());
    }
}
