use clap::Parser;
use tracing_subscriber::EnvFilter;

use jaguar_zenoh_runtime::config::BaseConfig;

/// Jaguar 4x4 base motor-control runtime
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Motor board address
    #[arg(long)]
    robot_ip: Option<String>,

    /// Motor board port
    #[arg(long)]
    robot_port: Option<u16>,

    /// Wheel diameter in metres
    #[arg(long)]
    wheel_diameter: Option<f64>,

    /// Maximum linear speed per side in m/s
    #[arg(long)]
    max_speed: Option<f64>,
}

impl Args {
    fn into_config(self) -> Result<BaseConfig, Box<dyn std::error::Error + Send + Sync>> {
        let mut config = match &self.config {
            Some(path) => BaseConfig::from_file(path)?,
            None => BaseConfig::default(),
        };
        if let Some(ip) = self.robot_ip {
            config.robot_ip = ip;
        }
        if let Some(port) = self.robot_port {
            config.robot_port = port;
        }
        if let Some(diameter) = self.wheel_diameter {
            config.wheel_diameter = diameter;
        }
        if let Some(speed) = self.max_speed {
            config.max_speed = speed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init(); // installs the subscriber globally

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = jaguar_zenoh_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
