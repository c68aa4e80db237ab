#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = culina_rust::run().await {
        eprintln!("culina-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
