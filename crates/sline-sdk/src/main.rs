//! # Sline CLI
//!
//! Prices a cart against the Sline API and optionally creates a checkout
//! session.
//!
//! ## Usage
//!
//! ```bash
//! export SLINE_RETAILER_TOKEN=rt_test_...
//! export SLINE_BUTTON_ID=sline-checkout
//!
//! # Price two references, pick 6 instalments, create a session
//! sline sofa-3p=1 cushion=4 --duration 6 --checkout
//! ```

use anyhow::{bail, Context};
use sline_core::{LineItem, LoggingEventHandler, SlineConfig};
use sline_http::HttpTransport;
use sline_sdk::Sline;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONFIG_PATHS: &[&str] = &["config/sline.toml", "sline.toml"];

#[derive(Debug, Default, PartialEq)]
struct Args {
    items: Vec<(String, i64)>,
    duration: Option<u32>,
    checkout: bool,
    json: bool,
}

fn parse_args<I>(args: I) -> anyhow::Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--checkout" => parsed.checkout = true,
            "--json" => parsed.json = true,
            "--duration" => {
                let value = args.next().context("--duration needs a value")?;
                parsed.duration = Some(
                    value
                        .parse::<u32>()
                        .with_context(|| format!("invalid duration: {}", value))?,
                );
            }
            flag if flag.starts_with("--") => bail!("unknown flag: {}", flag),
            item => {
                let (reference, quantity) = match item.split_once('=') {
                    Some((reference, quantity)) => (
                        reference,
                        quantity
                            .parse::<i64>()
                            .with_context(|| format!("invalid quantity in {}", item))?,
                    ),
                    None => (item, 1),
                };
                if reference.is_empty() {
                    bail!("missing reference in {}", item);
                }
                parsed.items.push((reference.to_string(), quantity));
            }
        }
    }

    if parsed.items.is_empty() {
        bail!("usage: sline <reference>[=quantity]... [--duration N] [--checkout] [--json]");
    }
    Ok(parsed)
}

fn load_config() -> anyhow::Result<SlineConfig> {
    for path in CONFIG_PATHS {
        if Path::new(path).exists() {
            let contents =
                std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            info!("Configuration loaded from {}", path);
            return Ok(SlineConfig::from_toml(&contents)?);
        }
    }
    Ok(SlineConfig::from_env()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config()?;
    info!("Environment: {}", config.environment);
    info!("API: {}", config.api_url());

    let sline = Sline::new(Arc::new(HttpTransport::new()?));
    sline.initialize(config)?;
    sline.subscribe(Arc::new(LoggingEventHandler));

    let mut last = None;
    for (reference, quantity) in &args.items {
        last = Some(sline.add_line_item(LineItem::new(reference.as_str(), 1), *quantity)?);
    }
    if let Some(handle) = last {
        let refresh = handle.await?;
        info!(
            "Priced {} reference(s), durations {:?}",
            refresh.references.len(),
            refresh.durations
        );
    }

    if let Some(duration) = args.duration {
        sline.set_selected_duration(duration)?;
    }

    for (reference, _) in &args.items {
        match sline.instalment_summary(reference) {
            Some(summary) if args.json => println!("{}", serde_json::to_string(&summary)?),
            Some(summary) => {
                println!("{:<24} {}", reference, summary.label(&format!("{}x ", summary.duration)))
            }
            None => warn!("No price for {}", reference),
        }
    }

    if args.checkout {
        let session = sline.build_session().await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&session)?);
        } else {
            println!("Checkout: {}", session.checkout_url);
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  Sline checkout SDK
  ━━━━━━━━━━━━━━━━━━
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_items_and_flags() {
        let parsed = args(&["sofa=2", "cushion", "--duration", "6", "--checkout"]).unwrap();
        assert_eq!(
            parsed,
            Args {
                items: vec![("sofa".to_string(), 2), ("cushion".to_string(), 1)],
                duration: Some(6),
                checkout: true,
                json: false,
            }
        );
    }

    #[test]
    fn test_negative_quantity_reaches_engine() {
        // rejected later by the engine with a typed error
        let parsed = args(&["sofa=-1"]).unwrap();
        assert_eq!(parsed.items, vec![("sofa".to_string(), -1)]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["--duration"]).is_err());
        assert!(args(&["sofa", "--duration", "twelve"]).is_err());
        assert!(args(&["sofa=x"]).is_err());
        assert!(args(&["=2"]).is_err());
        assert!(args(&["sofa", "--verbose"]).is_err());
    }
}
