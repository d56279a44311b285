//! Small CLI over `WalletStore`: generate a keypair, inspect balances, and
//! sign a transfer for submission to a node's `transaction` endpoint.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};

use ledgerchain::transaction::{Transaction, TransactionHandler, TxType};
use ledgerchain::wallet::WalletStore;

#[derive(Parser)]
#[command(name = "ledgerchain-wallet", version, about = "ledgerchain wallet CLI")]
struct Cli {
    /// Path to the wallet store JSON file.
    #[arg(short, long, default_value = "wallet.json")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new identity and add it to the wallet store.
    Create {
        /// Name to register; rejected if it collides with an existing wallet.
        name: String,
    },
    /// Print the public address for a registered name.
    Address {
        name: String,
    },
    /// Print both balance views (onChain and tx) for a token.
    Balance {
        name: String,
        #[arg(long, default_value = "COIN$")]
        token: String,
    },
    /// Build and sign a transfer, printing the resulting transaction JSON
    /// to stdout. Does not submit it anywhere.
    Send {
        from: String,
        to: String,
        amount: f64,
        #[arg(long, default_value = "COIN$")]
        token: String,
        #[arg(long, default_value_t = 0.0)]
        fee: f64,
    },
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = WalletStore::load(cli.file.clone())?;

    match cli.command {
        Commands::Create { name } => {
            let wallet = store.generate(&name)?;
            println!("{}:{}", wallet.name, wallet.public_key);
        }
        Commands::Address { name } => {
            let wallet = store.get_user(&name, false)?;
            println!("{}:{}", wallet.name, wallet.public_key);
        }
        Commands::Balance { name, token } => {
            let wallet = store.get_user(&name, false)?;
            let slot = wallet.token_slot(&token);
            println!("onChain: {}", slot.on_chain.balance);
            println!("tx:      {}", slot.tx.balance);
        }
        Commands::Send { from, to, amount, token, fee } => {
            let store = std::sync::Arc::new(store);
            let handler = TransactionHandler::new(store.clone());
            let wallet = store.get_user(&from, false)?;
            let computed_fee = handler.compute_fee(&from, amount, fee);
            let tx = Transaction {
                timestamp: now(),
                src: from.clone(),
                dest: to,
                amount,
                token,
                fee: computed_fee,
                tx_type: TxType::Transfer,
                seq: wallet.seq.tx + 1,
                tx_sig: None,
                hash: String::new(),
                source: None,
                note: None,
                meta: None,
            };
            let signed = handler.sign(tx)?;
            println!("{}", serde_json::to_string_pretty(&signed)?);
        }
    }

    Ok(())
}
