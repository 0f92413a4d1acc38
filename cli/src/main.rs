use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fractalpow")]
#[command(about = "FractalPoW node CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full node
    Node,
    /// Start the miner
    Miner,
    /// Wallet operations
    Wallet,
}

fn main() {
    let _cli = Cli::parse();
    // Command dispatch (config loading, node/miner/wallet wiring) is a
    // front-end concern that lives outside this crate's scope.
    println!("fractalpow CLI stub");
}
