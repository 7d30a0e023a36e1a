use sonyci::{Client, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let usage = "usage: upload_file <config.toml> <file> [content-type]";
    let config_path = args.next().expect(usage);
    let file = args.next().expect(usage);
    let content_type = args
        .next()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let config = Config::from_file(&config_path)?;
    let mut client = Client::new(config)?;

    info!("Uploading {} as {}", file, content_type);
    let receipt = client.upload(&file, &content_type).await?;

    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}
