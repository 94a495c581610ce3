use std::io::Read;

use colored::Colorize;
use iamkv_store::{
    AttributeBackend, BackingLimits, DeleteOutcome, DeleteReport, InMemoryBacking, StoreError,
    TieredStore, UsageReport,
};
use serde_json::json;
use tracing::info;

use crate::cli::*;
use crate::config::{BackendKind, CliConfig};

type DynStore = TieredStore<Box<dyn AttributeBackend>>;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let backend = open_backend(&config).await?;
    let store = TieredStore::new(backend, config.store.clone())?;

    match cli.command {
        Command::Set(args) => cmd_set(&store, args, cli.format).await,
        Command::Get(args) => cmd_get(&store, args, cli.format).await,
        Command::Delete(args) => cmd_delete(&store, args, cli.format).await,
        Command::Usage => cmd_usage(&store, cli.format).await,
        Command::Demo => run_demo(&store).await,
    }
}

async fn open_backend(config: &CliConfig) -> anyhow::Result<Box<dyn AttributeBackend>> {
    match config.backend {
        BackendKind::Memory => {
            info!("using in-memory backend; nothing is persisted");
            Ok(Box::new(InMemoryBacking::with_limits(BackingLimits {
                primary_document_limit: config.store.primary_document_limit,
                secondary_document_limit: config.store.secondary_document_limit,
                ..Default::default()
            })))
        }
        BackendKind::Aws => open_aws(config).await,
    }
}

#[cfg(feature = "aws")]
async fn open_aws(config: &CliConfig) -> anyhow::Result<Box<dyn AttributeBackend>> {
    let backing = crate::aws::IamBacking::connect(&config.aws).await?;
    info!(region = ?config.aws.region, "using AWS IAM backend");
    Ok(Box::new(backing))
}

#[cfg(not(feature = "aws"))]
async fn open_aws(_config: &CliConfig) -> anyhow::Result<Box<dyn AttributeBackend>> {
    anyhow::bail!("iamkv was built without the `aws` feature")
}

async fn cmd_set(store: &DynStore, args: SetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value = match (args.value, args.file) {
        (Some(value), _) => value,
        (None, Some(path)) => std::fs::read_to_string(&path)?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    store.set(&args.key, &value).await?;
    let tiers = if value.len() > store.config().primary_capacity { 2 } else { 1 };
    println!("{}", render_set(&args.key, value.len(), tiers, format));
    Ok(())
}

async fn cmd_get(store: &DynStore, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value = store.get(&args.key).await?;
    println!("{}", render_get(&args.key, value.as_deref(), format));
    Ok(())
}

async fn cmd_delete(
    store: &DynStore,
    args: DeleteArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = store.delete(&args.key).await;
    println!("{}", render_delete(&args.key, &report, format)?);
    Ok(())
}

async fn cmd_usage(store: &DynStore, format: OutputFormat) -> anyhow::Result<()> {
    let usage = store.usage().await?;
    println!("{}", render_usage(&usage, format)?);
    Ok(())
}

fn render_set(key: &str, len: usize, tiers: u8, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({ "key": key, "len": len, "tiers": tiers }).to_string(),
        OutputFormat::Text => format!(
            "{} Stored {} ({} bytes, {} tier{})",
            "✓".green().bold(),
            key.bold(),
            len,
            tiers,
            if tiers == 1 { "" } else { "s" }
        ),
    }
}

fn render_get(key: &str, value: Option<&str>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({ "key": key, "value": value }).to_string(),
        OutputFormat::Text => match value {
            Some(value) => value.to_string(),
            None => "(not found)".dimmed().to_string(),
        },
    }
}

fn render_delete(key: &str, report: &DeleteReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::Text => Ok(delete_report_text(key, report)),
    }
}

fn render_usage(usage: &UsageReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(usage)?),
        OutputFormat::Text => Ok(usage.to_string()),
    }
}

fn delete_report_text(key: &str, report: &DeleteReport) -> String {
    if report.was_absent() {
        return format!("Nothing stored under {}.", key.yellow());
    }
    let mut lines = Vec::with_capacity(report.steps.len() + 1);
    for step in &report.steps {
        let outcome = match &step.outcome {
            DeleteOutcome::Removed => "removed".green(),
            DeleteOutcome::Absent => "absent".dimmed(),
            DeleteOutcome::Failed(reason) => format!("failed: {reason}").red(),
        };
        lines.push(format!("  {}: {}", step.target, outcome));
    }
    if report.is_clean() {
        lines.push(format!("{} Deleted {}", "✓".green().bold(), key.bold()));
    }
    lines.join("\n")
}

/// Walk through set, get, usage and delete against `store`, printing what
/// each step returns.
pub async fn run_demo<B: AttributeBackend>(store: &TieredStore<B>) -> anyhow::Result<()> {
    let small = "cats-are-cool";
    let large = "x".repeat(3000);

    println!("{}", "Setting".bold());
    store.set("some-key", small).await?;
    println!("{}", "Setting large".bold());
    store.set("some-large-key", &large).await?;

    println!("{}", "Getting".bold());
    let got = store.get("some-key").await?;
    println!("Expect {:?} got -> {:?}", small, got);

    let got = store.get("non-existent-key").await?;
    println!("Expect None got -> {:?}", got);

    let got = store.get("some-large-key").await?;
    println!(
        "Expect 3000 x's got -> {}",
        got.as_deref().map_or("None".to_string(), |v| format!("{} x's", v.len()))
    );
    if got.as_deref() != Some(large.as_str()) {
        anyhow::bail!("large value did not round-trip");
    }

    println!("\n{}\n", store.usage().await?);

    println!("{}", "Deleting some-large-key".bold());
    let report = store.delete("some-large-key").await;
    println!("{}", delete_report_text("some-large-key", &report));

    println!("{}", "Getting some-large-key".bold());
    match store.get("some-large-key").await {
        Ok(got) => println!("Expect None got -> {:?}", got),
        Err(StoreError::Incomplete { .. }) => println!("Expect None got -> incomplete record"),
        Err(e) => return Err(e.into()),
    }

    println!("\n{}", store.usage().await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamkv_store::HolderKind;

    #[tokio::test]
    async fn demo_runs_against_memory_backend() {
        let store = TieredStore::with_defaults(InMemoryBacking::new());
        run_demo(&store).await.unwrap();

        let backend = store.backend();
        assert!(backend.holder_exists(HolderKind::Primary, "u-some-key"));
        assert!(!backend.holder_exists(HolderKind::Primary, "u-some-large-key"));
        assert!(!backend.holder_exists(HolderKind::Secondary, "r-some-large-key"));
    }

    fn parse(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn json_output_is_a_single_document() {
        let store = TieredStore::with_defaults(InMemoryBacking::new());
        store.set("k", "cats-are-cool").await.unwrap();

        let got = store.get("k").await.unwrap();
        let v = parse(&render_get("k", got.as_deref(), OutputFormat::Json));
        assert_eq!(v["key"], "k");
        assert_eq!(v["value"], "cats-are-cool");

        let v = parse(&render_get("missing", None, OutputFormat::Json));
        assert!(v["value"].is_null());

        let usage = store.usage().await.unwrap();
        let v = parse(&render_usage(&usage, OutputFormat::Json).unwrap());
        assert_eq!(v["object_count"], 1);
        assert_eq!(v["object_quota"], 5000);

        let report = store.delete("k").await;
        let v = parse(&render_delete("k", &report, OutputFormat::Json).unwrap());
        assert_eq!(v["steps"].as_array().map(Vec::len), Some(4));
        assert_eq!(v["steps"][1]["target"], "primary_document");
        assert_eq!(v["steps"][1]["outcome"]["outcome"], "removed");
    }

    #[test]
    fn set_honours_json_format() {
        let v = parse(&render_set("big", 3000, 2, OutputFormat::Json));
        assert_eq!(v, serde_json::json!({ "key": "big", "len": 3000, "tiers": 2 }));

        let text = render_set("small", 5, 1, OutputFormat::Text);
        assert!(text.contains("small"));
        assert!(text.contains("5 bytes, 1 tier)"));
    }

    #[tokio::test]
    async fn text_output_for_missing_keys() {
        assert!(render_get("k", None, OutputFormat::Text).contains("(not found)"));

        let store = TieredStore::with_defaults(InMemoryBacking::new());
        let report = store.delete("never-set").await;
        let text = render_delete("never-set", &report, OutputFormat::Text).unwrap();
        assert!(text.contains("Nothing stored under"));
    }

    #[tokio::test]
    async fn memory_backend_respects_configured_limits() {
        let config = CliConfig::default();
        let backend = open_backend(&config).await.unwrap();
        let store = TieredStore::new(backend, config.store).unwrap();
        store.set("k", &"y".repeat(5000)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().map(|v| v.len()), Some(5000));
    }

    #[cfg(not(feature = "aws"))]
    #[tokio::test]
    async fn aws_backend_needs_feature() {
        let config = CliConfig {
            backend: BackendKind::Aws,
            ..Default::default()
        };
        let err = open_backend(&config).await.err().unwrap();
        assert!(err.to_string().contains("`aws` feature"));
    }
}
