use sonyci::{Client, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    // Config file path, defaulting to ./ci.toml
    let path = std::env::var("SONYCI_CONFIG").unwrap_or_else(|_| "ci.toml".to_string());
    info!("Loading config from {}", path);

    let config = Config::from_file(&path)?;
    let mut client = Client::new(config)?;

    for workspace in client.workspaces(&()).await? {
        info!(
            "{}  {}",
            workspace.id,
            workspace.name.unwrap_or_default()
        );
    }

    if client.workspace_id().is_some() {
        match client.workspace().await? {
            Some(workspace) => info!(
                "default workspace resolves to {}",
                workspace.name.unwrap_or_else(|| workspace.id.clone())
            ),
            None => info!("default workspace not found in the listing"),
        }
    }

    Ok(())
}
