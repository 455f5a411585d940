use anyhow::Result;
use poolbridge::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
