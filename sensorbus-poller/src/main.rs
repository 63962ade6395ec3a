//! SensorBus poller.
//!
//! Scans the I2C bus for sensor devices, polls them on a schedule, appends
//! the readings to a CSV log and power-cycles the devices on faults.

use anyhow::Result;
use sensorbus_framework::{ServiceArgs, ServiceConfig, ServiceRunner};
use sensorbus_poller::config::PollerConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServiceArgs::parse_with_default("sensorbus-poller.json5");

    let config = PollerConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut runner = ServiceRunner::new_with_args("sensorbus-poller", config, Some(&args))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Loaded configuration from {:?}", args.config);

    start(&mut runner).await?;

    runner.run().await.map_err(|e| anyhow::anyhow!("{}", e))
}

#[cfg(target_os = "linux")]
async fn start(runner: &mut ServiceRunner<PollerConfig>) -> Result<()> {
    use anyhow::Context;
    use sensorbus_poller::TimedExchange;
    use sensorbus_poller::gpio::SysfsGpio;
    use sensorbus_poller::i2c::I2cBus;
    use sensorbus_poller::orchestrator::Orchestrator;
    use sensorbus_poller::recovery::FaultRecovery;
    use sensorbus_poller::sink::{ConsoleSink, CsvLogSink};

    let config = runner.config().clone();

    let range = config
        .bus
        .range()
        .context("bus.start_address must not exceed bus.end_address")?;

    let bus = I2cBus::open(&config.bus.device).with_context(|| {
        format!(
            "Could not open {}. Is the I2C kernel module loaded?",
            config.bus.device.display()
        )
    })?;

    let recovery = if config.power.enabled {
        let gpio = SysfsGpio::open(&config.power.sysfs_root, config.power.gpio)
            .await
            .with_context(|| {
                format!(
                    "Could not configure GPIO {} under {}. Is sysfs GPIO available and writable?",
                    config.power.gpio,
                    config.power.sysfs_root.display()
                )
            })?;
        FaultRecovery::power_cycling(gpio, config.power.cycle())
    } else {
        FaultRecovery::disabled()
    };

    let log = CsvLogSink::open(&config.sink.path).with_context(|| {
        format!(
            "Could not open sensor log {}. Is the directory writable?",
            config.sink.path.display()
        )
    })?;

    let mut orchestrator = Orchestrator::new(
        TimedExchange::new(bus, config.bus.timeout()),
        range,
        config.poll_interval(),
        recovery,
    )
    .with_sink(log);

    if config.sink.echo {
        orchestrator = orchestrator.with_sink(ConsoleSink::stdout());
    }

    orchestrator
        .power_on()
        .await
        .context("Could not switch bus power on")?;

    info!(
        "Logging readings to {} (echo: {})",
        config.sink.path.display(),
        config.sink.echo
    );

    let shutdown = runner.shutdown();
    runner.spawn(orchestrator.run(shutdown));

    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn start(_runner: &mut ServiceRunner<PollerConfig>) -> Result<()> {
    anyhow::bail!("The poller needs Linux I2C device support (/dev/i2c-*)")
}
