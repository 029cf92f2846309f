//! Voting dApp CLI
//!
//! Command-line front end for the voting contract client.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use voting_dapp_client::contract::AlloyBinder;
use voting_dapp_client::wallet::{short_address, KeystoreWallet, WalletProvider};
use voting_dapp_client::{ClientState, Config, Error, Result, RpcConfig, VotingClient};

#[derive(Parser)]
#[command(name = "voting-client")]
#[command(about = "Vote on, and administer, an on-chain candidate ballot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print state as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Keystore account to act as (defaults to the first key)
    #[arg(short, long, global = true)]
    account: Option<alloy::primitives::Address>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Config,

    #[command(flatten)]
    Ballot(BallotCommand),
}

/// Commands that connect to the wallet and contract
#[derive(Subcommand)]
enum BallotCommand {
    /// Show connection and ballot status
    Status,

    /// List candidates
    Candidates,

    /// Vote for a candidate
    Vote {
        /// Candidate ID
        #[arg(long)]
        id: u64,
    },

    /// Register a new candidate (contract owner only)
    Add {
        /// Candidate name
        #[arg(long)]
        name: String,
    },

    /// Keep refreshing and print state changes until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let fmt_layer = if cli.log_json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();

    // Load config
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };
    if let Some(account) = cli.account {
        config.wallet.default_account = Some(account);
    }

    let command = match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::Ballot(command) => command,
    };

    let client = mount_client(&config).await?;
    client.connect_wallet().await;

    let ok = match command {
        BallotCommand::Status => {
            let state = client.state().await;
            print_status(&state, cli.json)?;
            state.is_connected && state.error.is_none()
        }
        BallotCommand::Candidates => {
            let state = client.state().await;
            print_candidates(&state, cli.json)?;
            state.is_connected && state.error.is_none()
        }
        BallotCommand::Vote { id } => run_vote(&client, id, cli.json).await?,
        BallotCommand::Add { name } => run_add(&client, &name, cli.json).await?,
        BallotCommand::Watch => run_watch(&client, &config, cli.json).await?,
    };

    client.unmount();
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn mount_client(config: &Config) -> Result<VotingClient> {
    let rpc = RpcConfig::from_env();
    let binder = AlloyBinder::from_config(config, &rpc)?;

    let provider: Option<Arc<dyn WalletProvider>> = match KeystoreWallet::detect(&config.wallet)
    {
        Ok(Some(wallet)) => {
            tracing::info!(
                accounts = wallet.addresses().len(),
                "Loaded keystore from {}",
                config.wallet.keys_env
            );
            Some(Arc::new(wallet))
        }
        Ok(None) => None,
        Err(e) => return Err(Error::Config(e.to_string())),
    };

    tracing::info!(
        contract = %config.contract.address,
        chain_id = config.contract.chain_id,
        "Mounting voting client"
    );

    Ok(VotingClient::mount(provider, Arc::new(binder)).await)
}

async fn run_vote(client: &VotingClient, id: u64, json: bool) -> Result<bool> {
    let state = client.state().await;
    if !state.is_connected {
        print_status(&state, json)?;
        return Ok(false);
    }

    let name = state
        .contract_state
        .candidate(id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "this candidate".to_string());

    let ok = client.vote_for_candidate(id).await;
    let state = client.state().await;
    if json {
        print_json(&state)?;
    } else if ok {
        println!("You voted for {}!", name);
    } else {
        println!("Failed to cast vote");
        if let Some(error) = &state.error {
            println!("  {}", error);
        }
    }
    Ok(ok)
}

async fn run_add(client: &VotingClient, name: &str, json: bool) -> Result<bool> {
    let state = client.state().await;
    if !state.is_connected {
        print_status(&state, json)?;
        return Ok(false);
    }

    let ok = client.add_candidate(name).await;
    let state = client.state().await;
    if json {
        print_json(&state)?;
    } else if ok {
        println!("Added candidate: {}", name.trim());
    } else {
        println!("Failed to add candidate");
        if let Some(error) = &state.error {
            println!("  {}", error);
        }
    }
    Ok(ok)
}

async fn run_watch(client: &VotingClient, config: &Config, json: bool) -> Result<bool> {
    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    let mut last = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                client.refresh_data().await;
                let state = client.state().await;
                let current = serde_json::to_value(&state.contract_state)?;
                if last.as_ref() != Some(&current) {
                    print_status(&state, json)?;
                    if !json {
                        print_candidates(&state, false)?;
                    }
                    last = Some(current);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping watch");
                return Ok(true);
            }
        }
    }
}

fn print_json(state: &ClientState) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}

fn print_status(state: &ClientState, json: bool) -> Result<()> {
    if json {
        return print_json(state);
    }

    match state.account {
        Some(account) if state.is_connected => println!("Connected: {}", short_address(&account)),
        _ => println!("Not connected"),
    }
    if let Some(error) = &state.error {
        println!("Error: {}", error);
    }
    if !state.is_connected {
        return Ok(());
    }

    let contract = &state.contract_state;
    println!(
        "Role:    {}",
        if contract.is_owner { "admin" } else { "voter" }
    );
    println!(
        "Voted:   {}",
        if contract.has_voted { "yes" } else { "no" }
    );
    if contract.winner.is_empty() {
        println!("Winner:  not decided yet");
    } else {
        println!("Winner:  {}", contract.winner);
    }
    Ok(())
}

fn print_candidates(state: &ClientState, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&state.contract_state.candidates)?
        );
        return Ok(());
    }

    let contract = &state.contract_state;
    if contract.candidates.is_empty() {
        if contract.is_owner {
            println!("No candidates yet. Add one with `voting-client add --name <NAME>`.");
        } else {
            println!("No candidates yet.");
        }
        return Ok(());
    }

    for candidate in &contract.candidates {
        let marker = if contract.is_winner(candidate) { "*" } else { " " };
        println!(
            "{} [{:>3}] {:<32} {:>6} votes",
            marker, candidate.id, candidate.name, candidate.vote_count
        );
    }
    Ok(())
}
