// SPDX-License-Identifier: AGPL-3.0-or-later

//! Operator tooling for a running Spectra deployment.
//!
//! Reads the same environment as the server (a `.env` file is honored), opens
//! the ledger database directly and talks to the configured Solana RPC. Meant
//! for maintenance tasks, not for regular operation.

use clap::{Parser, Subcommand};

use spectra_server::chain::{
    lamports_to_sol, ChainClient, RelayerSigner, SolanaRpc, FLAT_FEE_LAMPORTS,
};
use spectra_server::config::Config;
use spectra_server::storage::Store;

#[derive(Parser)]
#[command(name = "spectra-ops", about = "Spectra maintenance commands", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the relayer address and its on-chain balance.
    RelayerStatus,

    /// Show a user's ledger balance and custodial deposit balance.
    UserBalance {
        /// Wallet address the user signs in with.
        wallet: String,
    },

    /// Overwrite a user's private ledger balance.
    ///
    /// Bypasses the ledger; use only to correct a balance after a manual
    /// on-chain recovery.
    ResetBalance {
        wallet: String,
        /// New balance in lamports.
        lamports: u64,
    },

    /// Drain the relayer wallet to a recipient, keeping one flat fee behind.
    Sweep {
        /// Destination address.
        recipient: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let chain = SolanaRpc::new(config.solana_rpc_url.clone());

    match cli.command {
        Command::RelayerStatus => {
            let signer = relayer(&config)?;
            let balance = chain.balance(&signer.address()).await?;
            println!("relayer address: {}", signer.address());
            println!(
                "on-chain balance: {} SOL ({} lamports)",
                lamports_to_sol(balance),
                balance
            );
        }
        Command::UserBalance { wallet } => {
            let store = Store::open(&config.database_path())?;
            let user = store
                .users()
                .find_by_wallet(&wallet)?
                .ok_or_else(|| format!("no user for wallet {wallet}"))?;

            println!("user id: {}", user.user_id);
            println!(
                "private balance: {} SOL ({} lamports)",
                lamports_to_sol(user.private_balance_lamports),
                user.private_balance_lamports
            );
            match user.deposit_address {
                Some(address) => {
                    let balance = chain.balance(&address).await?;
                    println!("deposit address: {address}");
                    println!(
                        "deposit balance: {} SOL ({} lamports)",
                        lamports_to_sol(balance),
                        balance
                    );
                }
                None => println!("deposit address: not provisioned"),
            }
        }
        Command::ResetBalance { wallet, lamports } => {
            let store = Store::open(&config.database_path())?;
            let user = store
                .users()
                .find_by_wallet(&wallet)?
                .ok_or_else(|| format!("no user for wallet {wallet}"))?;

            let before = user.private_balance_lamports;
            let updated = store.users().force_set_balance(&user.user_id, lamports)?;
            println!(
                "balance for {wallet}: {} -> {} lamports (version {})",
                before, updated.private_balance_lamports, updated.version
            );
        }
        Command::Sweep { recipient } => {
            let signer = relayer(&config)?;
            let balance = chain.balance(&signer.address()).await?;
            let Some(amount) = balance.checked_sub(FLAT_FEE_LAMPORTS) else {
                return Err(format!(
                    "relayer balance {balance} lamports cannot cover the network fee"
                )
                .into());
            };
            if amount == 0 {
                return Err("nothing to sweep after the network fee".into());
            }

            let signature = chain
                .transfer_and_confirm(signer.keypair(), &recipient, amount)
                .await?;
            println!(
                "swept {} SOL ({} lamports) to {recipient}",
                lamports_to_sol(amount),
                amount
            );
            println!("signature: {signature}");
        }
    }

    Ok(())
}

fn relayer(config: &Config) -> Result<RelayerSigner, Box<dyn std::error::Error>> {
    let secret = config
        .relayer_secret_key
        .as_deref()
        .ok_or("RELAYER_SECRET_KEY is not set")?;
    Ok(RelayerSigner::from_base58(secret)?)
}
