#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = culina_rust::run_worker().await {
        eprintln!("culina-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
