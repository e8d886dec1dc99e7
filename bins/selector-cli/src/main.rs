//! selector-cli: inspect and repair a persisted wallet selector session.
//!
//! Works directly on the file-backed store a selector was configured with,
//! without constructing any wallet backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use selector_core::constants::{
    CONTRACT, PACKAGE_NAME, PENDING_CONTRACT, PENDING_SELECTED_WALLET_ID, SELECTED_WALLET_ID,
};
use selector_core::options::{Network, NetworkId};
use selector_core::types::ContractState;
use selector_storage::{FileStorage, JsonStorage};
use serde::Serialize;
use tracing::{debug, info};

/// Environment variable overriding the default data directory.
const DATA_DIR_ENV: &str = "WALLET_SELECTOR_DATA_DIR";

/// Wallet selector session tool.
#[derive(Parser, Debug)]
#[command(name = "selector-cli", version, about = "Inspect and repair a persisted wallet selector session")]
struct Cli {
    /// Directory holding the selector's storage file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the persisted session and any pending sign-in.
    Show {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Drop a pending redirect sign-in.
    ClearPending,
    /// Forget the selected wallet, its contract and any pending sign-in.
    Reset,
    /// List built-in network presets.
    Networks,
}

/// Everything the selector keeps under its package namespace.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedView {
    selected_wallet_id: Option<String>,
    contract: Option<ContractState>,
    pending_selected_wallet_id: Option<String>,
    pending_contract: Option<ContractState>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Networks => print_networks(),
        command => {
            let package = open_package(cli.data_dir)?;
            run(command, &package).await?;
        }
    }

    Ok(())
}

fn open_package(data_dir: Option<PathBuf>) -> Result<JsonStorage> {
    let data_dir = resolve_data_dir(data_dir)?;
    debug!(data_dir = %data_dir.display(), "opening storage");
    let storage = FileStorage::open(&data_dir)
        .with_context(|| format!("Failed to open storage in {}", data_dir.display()))?;
    Ok(JsonStorage::new(Arc::new(storage), PACKAGE_NAME))
}

async fn run(command: Commands, package: &JsonStorage) -> Result<()> {
    match command {
        Commands::Show { json } => {
            let view = load_view(package).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view).context("Failed to encode session")?);
            } else {
                print_view(&view);
            }
        }
        Commands::ClearPending => {
            clear_pending(package).await?;
            info!("pending sign-in cleared");
            println!("Pending sign-in cleared.");
        }
        Commands::Reset => {
            reset(package).await?;
            info!("session reset");
            println!("Session reset.");
        }
        Commands::Networks => print_networks(),
    }
    Ok(())
}

/// `--data-dir`, then `$WALLET_SELECTOR_DATA_DIR`, then the platform data dir.
fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let base = dirs::data_dir().context("Could not determine data directory")?;
    Ok(base.join(PACKAGE_NAME))
}

async fn load_view(package: &JsonStorage) -> Result<PersistedView> {
    Ok(PersistedView {
        selected_wallet_id: package
            .get_item(SELECTED_WALLET_ID)
            .await
            .context("Failed to read selected wallet")?,
        contract: package.get_item(CONTRACT).await.context("Failed to read contract")?,
        pending_selected_wallet_id: package
            .get_item(PENDING_SELECTED_WALLET_ID)
            .await
            .context("Failed to read pending wallet")?,
        pending_contract: package
            .get_item(PENDING_CONTRACT)
            .await
            .context("Failed to read pending contract")?,
    })
}

async fn clear_pending(package: &JsonStorage) -> Result<()> {
    for key in [PENDING_SELECTED_WALLET_ID, PENDING_CONTRACT] {
        package
            .remove_item(key)
            .await
            .with_context(|| format!("Failed to remove {key}"))?;
    }
    Ok(())
}

async fn reset(package: &JsonStorage) -> Result<()> {
    for key in [SELECTED_WALLET_ID, CONTRACT] {
        package
            .remove_item(key)
            .await
            .with_context(|| format!("Failed to remove {key}"))?;
    }
    clear_pending(package).await
}

fn print_view(view: &PersistedView) {
    match (&view.selected_wallet_id, &view.contract) {
        (Some(wallet_id), Some(contract)) => {
            println!("Selected wallet: {wallet_id}");
            println!("Contract:        {}", describe_contract(contract));
        }
        (None, None) => println!("Selected wallet: none"),
        (wallet_id, contract) => {
            println!("Selected wallet: {}", wallet_id.as_deref().unwrap_or("none"));
            println!(
                "Contract:        {}",
                contract.as_ref().map(describe_contract).unwrap_or_else(|| "none".into())
            );
            println!("Warning: partial session, it will be reset on next startup");
        }
    }

    match (&view.pending_selected_wallet_id, &view.pending_contract) {
        (Some(wallet_id), Some(contract)) => {
            println!("Pending sign-in: {wallet_id} ({})", describe_contract(contract));
        }
        (None, None) => println!("Pending sign-in: none"),
        _ => println!("Pending sign-in: incomplete marker, it will be discarded on next startup"),
    }
}

fn describe_contract(contract: &ContractState) -> String {
    if contract.method_names.is_empty() {
        format!("{} (all methods)", contract.contract_id)
    } else {
        format!("{} [{}]", contract.contract_id, contract.method_names.join(", "))
    }
}

fn print_networks() {
    for id in NetworkId::ALL {
        let network = Network::preset(id);
        println!("{id}");
        println!("  node:     {}", network.node_url);
        println!("  helper:   {}", network.helper_url);
        println!("  explorer: {}", network.explorer_url);
        if network.indexer_url.is_empty() {
            println!("  indexer:  (none)");
        } else {
            println!("  indexer:  {}", network.indexer_url);
        }
    }
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_in(dir: &tempfile::TempDir) -> JsonStorage {
        let storage = FileStorage::open(dir.path()).unwrap();
        JsonStorage::new(Arc::new(storage), PACKAGE_NAME)
    }

    async fn seed(package: &JsonStorage) {
        let contract = ContractState::new("guest-book.testnet", vec!["addMessage".into()]);
        package.set_item(SELECTED_WALLET_ID, "sender").await.unwrap();
        package.set_item(CONTRACT, &contract).await.unwrap();
        package
            .set_item(PENDING_SELECTED_WALLET_ID, "my-near-wallet")
            .await
            .unwrap();
        package.set_item(PENDING_CONTRACT, &contract).await.unwrap();
    }

    #[test]
    fn flag_wins_over_environment() {
        let dir = resolve_data_dir(Some(PathBuf::from("/tmp/selector"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/selector"));
    }

    #[test]
    fn cli_parses_global_data_dir() {
        let cli = Cli::try_parse_from(["selector-cli", "show", "--json", "--data-dir", "/tmp/x"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Show { json: true }));
    }

    #[tokio::test]
    async fn show_reads_everything_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_in(&dir);
        seed(&package).await;

        let view = load_view(&package).await.unwrap();
        assert_eq!(view.selected_wallet_id.as_deref(), Some("sender"));
        assert_eq!(view.pending_selected_wallet_id.as_deref(), Some("my-near-wallet"));
        assert_eq!(view.contract.unwrap().contract_id, "guest-book.testnet");
    }

    #[tokio::test]
    async fn clear_pending_keeps_selected_session() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_in(&dir);
        seed(&package).await;

        clear_pending(&package).await.unwrap();

        let view = load_view(&package_in(&dir)).await.unwrap();
        assert_eq!(view.selected_wallet_id.as_deref(), Some("sender"));
        assert!(view.pending_selected_wallet_id.is_none());
        assert!(view.pending_contract.is_none());
    }

    #[tokio::test]
    async fn reset_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let package = package_in(&dir);
        seed(&package).await;

        reset(&package).await.unwrap();

        assert_eq!(load_view(&package_in(&dir)).await.unwrap(), PersistedView::default());
    }

    #[test]
    fn contract_description_lists_methods() {
        let open = ContractState::new("app.testnet", Vec::new());
        let scoped = ContractState::new("app.testnet", vec!["a".into(), "b".into()]);
        assert_eq!(describe_contract(&open), "app.testnet (all methods)");
        assert_eq!(describe_contract(&scoped), "app.testnet [a, b]");
    }
}
