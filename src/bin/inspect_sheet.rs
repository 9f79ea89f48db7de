//! Runs structure inference on a holdings export and prints the result as JSON.
//!
//! Usage: `inspect_sheet <file> [--sheet <glob>]...`
//!
//! Logs go to stderr; set `RUST_LOG=sheet_infer=debug` to see every score.
use anyhow::{bail, Context, Result};
use sheet_infer::Criteria;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut file = None::<String>;
    let mut patterns = Vec::<String>::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--sheet" => patterns.push(args.next().context("--sheet needs a glob pattern")?),
            _ if file.is_none() => file = Some(arg),
            _ => bail!("Unexpected argument '{arg}'"),
        }
    }
    let Some(file) = file else {
        bail!("Usage: inspect_sheet <file> [--sheet <glob>]");
    };

    let mut criteria = Criteria::default();
    if !patterns.is_empty() {
        criteria = criteria.with_sheet_patterns(&patterns).context("Invalid --sheet pattern")?;
    }

    let bytes = std::fs::read(&file).with_context(|| format!("Cannot read {file}"))?;
    let file_name = Path::new(&file)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file.as_str());
    let ingestion = sheet_infer::ingest_with(file_name, &bytes, &criteria)
        .with_context(|| format!("Cannot ingest {file}"))?;

    println!("{}", serde_json::to_string_pretty(&ingestion)?);
    Ok(())
}
