use arena::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ArenaConfig::from_env()?;
    tracing::info!(addr = %config.bind_addr, path = %config.path, "starting arena server");

    let store = Throttled::new(MemoryAccountStore::new(), config.storage_permits);
    let server = ArenaServer::builder()
        .config(config)
        .build(store, Argon2Hasher::new())
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
