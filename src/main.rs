use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ptw_core::config::{
    blank_policy_from_env_value, fetch_timeout_from_env_value, notice_capacity_from_env_value,
    resolve_template_dir,
};
use ptw_core::constants::{
    ENV_BLANK_POLICY, ENV_FETCH_TIMEOUT_MS, ENV_NOTICE_CAPACITY, ENV_TEMPLATE_DIR,
};
use ptw_core::{SyncConfig, YamlTemplateCatalog};

mod replay;

#[derive(Parser)]
#[command(name = "ptw-run")]
#[command(about = "Replay a permit form event script against the PTW template catalog")]
struct Cli {
    /// YAML event script to replay
    script: PathBuf,
}

/// Development harness for the PTW form synchronizer.
///
/// Replays a YAML event script against the permit templates in `PTW_TEMPLATE_DIR` and prints
/// the resulting form state as JSON.
///
/// # Environment Variables
/// - `PTW_TEMPLATE_DIR`: directory of `<permit-type>.yaml` templates (required)
/// - `PTW_FETCH_TIMEOUT_MS`: template lookup timeout (default: none)
/// - `PTW_BLANK_POLICY`: `unset` or `set` (default: `unset`)
/// - `PTW_NOTICE_CAPACITY`: notice channel capacity (default: 64)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ptw_core=info".parse()?)
                .add_directive("ptw_run=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = SyncConfig::new(
        fetch_timeout_from_env_value(std::env::var(ENV_FETCH_TIMEOUT_MS).ok())?,
        blank_policy_from_env_value(std::env::var(ENV_BLANK_POLICY).ok())?,
        notice_capacity_from_env_value(std::env::var(ENV_NOTICE_CAPACITY).ok())?,
        resolve_template_dir(std::env::var(ENV_TEMPLATE_DIR).ok())?,
    )?;

    let template_dir = config
        .template_dir()
        .with_context(|| format!("{ENV_TEMPLATE_DIR} must be set"))?;
    let catalog = YamlTemplateCatalog::load(template_dir)?;

    let script_path = cli.script.display();
    let contents = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("failed to read script {script_path}"))?;
    let script: replay::ReplayScript = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse script {script_path}"))?;

    tracing::info!("++ Replaying {} against {} templates", script_path, catalog.len());

    let report = replay::run(script, Arc::new(catalog), Arc::new(config)).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_takes_script_path() {
        let cli = Cli::try_parse_from(["ptw-run", "scripts/hot-work.yaml"]).unwrap();
        assert_eq!(cli.script, PathBuf::from("scripts/hot-work.yaml"));
    }

    #[test]
    fn test_cli_requires_script_path() {
        assert!(Cli::try_parse_from(["ptw-run"]).is_err());
    }
}
