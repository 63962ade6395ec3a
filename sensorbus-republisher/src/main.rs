//! SensorBus republisher.
//!
//! Tails the sensor log and republishes new readings to Zenoh.

use std::sync::Arc;

use anyhow::{Context, Result};
use sensorbus_framework::{ServiceArgs, ServiceConfig, ServiceRunner};
use sensorbus_republisher::config::RepublisherConfig;
use sensorbus_republisher::publisher::{Topics, ZenohPublisher};
use sensorbus_republisher::republisher::Republisher;
use sensorbus_republisher::session;
use sensorbus_republisher::tail::LogTailer;
use sensorbus_republisher::watermark::Watermark;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServiceArgs::parse_with_default("sensorbus-republisher.json5");

    let config = RepublisherConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut runner = ServiceRunner::new_with_args("sensorbus-republisher", config, Some(&args))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Loaded configuration from {:?}", args.config);

    let config = runner.config().clone();

    let watermark = Watermark::open(&config.watermark_path).with_context(|| {
        format!(
            "Could not take {}. Is another sensorbus-republisher running?",
            config.watermark_path.display()
        )
    })?;

    let session = Arc::new(
        session::connect(&config.zenoh)
            .await
            .context("Failed to connect to Zenoh")?,
    );

    let republisher = Republisher::new(
        LogTailer::new(&config.log_path),
        watermark,
        ZenohPublisher::new(Arc::clone(&session)),
        Topics::new(&config.topic),
        config.payload,
        config.scan_interval(),
    );

    let shutdown = runner.shutdown();
    runner.spawn(republisher.run(shutdown));

    runner.run().await.map_err(|e| anyhow::anyhow!("{}", e))?;

    session
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close Zenoh session: {}", e))?;

    Ok(())
}
