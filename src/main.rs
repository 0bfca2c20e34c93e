#[tokio::main]
async fn main() -> anyhow::Result<()> {
    auction_watch::run().await
}
