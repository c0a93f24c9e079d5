use std::{io::ErrorKind, net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use homectl_common::SiteConfig;

use crate::{
    api,
    hardware::{ActuatorDriver, HostSensors, SensorReader, SimulatedHardware, SysfsGpio, W1Bus},
    site::Site,
};

const DEFAULT_CONFIG_PATH: &str = "./homectl.json";
const DEFAULT_W1_DIR: &str = "/sys/bus/w1/devices";
const DEFAULT_GPIO_DIR: &str = "/sys/class/gpio";

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = env_or("HOMECTL_CONFIG", DEFAULT_CONFIG_PATH);
    let config = load_site_config(Path::new(&config_path)).await?;

    let (sensors, actuators) = open_hardware(&config)?;
    let site = Site::start(config, sensors, actuators);

    let port = std::env::var("HOMECTL_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    let served = axum::serve(listener, api::router(site.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    site.shutdown().await;
    served?;
    Ok(())
}

/// Reads the site description. A missing file falls back to the built-in
/// site; anything unreadable or invalid is a startup error.
pub async fn load_site_config(path: &Path) -> anyhow::Result<SiteConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => SiteConfig::from_json_slice(&raw)
            .with_context(|| format!("invalid site config {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(
                "no site config at {}, using built-in defaults",
                path.display()
            );
            Ok(SiteConfig::default())
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to read site config {}", path.display()))
        }
    }
}

fn open_hardware(
    config: &SiteConfig,
) -> anyhow::Result<(Arc<dyn SensorReader>, Arc<dyn ActuatorDriver>)> {
    let backend = env_or("HOMECTL_HARDWARE", "sysfs");
    match backend.as_str() {
        "sim" => {
            warn!("running against simulated hardware");
            let hardware = Arc::new(SimulatedHardware::new());
            for room in &config.rooms {
                hardware.set_temperature(&room.sensor, 21.0);
            }
            let sensors: Arc<dyn SensorReader> = hardware.clone();
            let actuators: Arc<dyn ActuatorDriver> = hardware;
            Ok((sensors, actuators))
        }
        "sysfs" => {
            let gpio_dir = env_or("HOMECTL_GPIO_DIR", DEFAULT_GPIO_DIR);
            let gpio = SysfsGpio::open(&gpio_dir, &config.output_pins(), &config.input_pins())
                .with_context(|| format!("failed to export gpio pins under {gpio_dir}"))?;
            let gpio = Arc::new(gpio);
            let w1 = W1Bus::new(env_or("HOMECTL_W1_DIR", DEFAULT_W1_DIR));
            let sensors: Arc<dyn SensorReader> = Arc::new(HostSensors::new(w1, gpio.clone()));
            let actuators: Arc<dyn ActuatorDriver> = gpio;
            Ok((sensors, actuators))
        }
        other => anyhow::bail!("unknown HOMECTL_HARDWARE '{other}', expected 'sysfs' or 'sim'"),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
