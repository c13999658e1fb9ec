use digital_wallet_client::{cli::commands::run_cli, Result};

fn main() -> Result<()> {
    run_cli()
}
