//! Thin entry point: resolve the config path and hand off to `App`.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/cync-lan/config.toml".to_string());

    let app = cync_lan::App::bootstrap(&config_path)?;
    app.run().await?;
    Ok(())
}
