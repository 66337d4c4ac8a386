//! Binary entrypoint for the fieldrelay CLI.
//!
//! Commands:
//! - `run [--modem-port <path>] [--radio-port <path>]` - run the gateway
//! - `node [--radio-port <path>]` - run the sensor-node transmitter (simulated sensor)
//! - `init` - create a starter `config.toml`
//! - `probe --port <path> [-b <baud>] [--timeout <s>]` - probe a modem's AT link
//! - `decode <frame>` - decode a frame with the configured strategy
//!
//! See the library crate docs for module-level details: `fieldrelay::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};

use fieldrelay::codec::DecodeStrategy;
use fieldrelay::config::Config;

/// Process exit code when the radio cannot be brought up.
const EXIT_INIT_FATAL: i32 = 3;
/// Seconds between status lines while the gateway runs.
const STATUS_INTERVAL_SECS: u64 = 300;

#[derive(Parser)]
#[command(name = "fieldrelay")]
#[command(about = "Field telemetry gateway: radio sensor readings relayed over SMS and MQTT")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway
    Run {
        /// Modem serial port (overrides [modem].port)
        #[arg(long)]
        modem_port: Option<String>,
        /// Radio bridge serial port (overrides [radio].port)
        #[arg(long)]
        radio_port: Option<String>,
    },
    /// Run the sensor-node transmitter with a simulated sensor
    Node {
        /// Radio bridge serial port (overrides [radio].port)
        #[arg(long)]
        radio_port: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Send `AT` to a modem and report whether it answered
    Probe {
        /// Modem serial port
        #[arg(short, long)]
        port: String,
        /// Baud rate
        #[arg(short = 'b', long, default_value_t = 115200)]
        baud: u32,
        /// Seconds to wait for the answer
        #[arg(short, long, default_value_t = 2)]
        timeout: u64,
    },
    /// Decode a sensor frame and print the re-encoded reading
    Decode {
        /// Frame text, e.g. "T:21.50,H:55.30,P:1013.25"
        frame: String,
        /// Decoder to use (defaults to [decode].strategy)
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<DecodeStrategy>,
    },
}

fn parse_strategy(s: &str) -> Result<DecodeStrategy, String> {
    match s.to_ascii_lowercase().as_str() {
        "lenient" => Ok(DecodeStrategy::Lenient),
        "strict" => Ok(DecodeStrategy::Strict),
        other => Err(format!("unknown strategy '{other}' (lenient|strict)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the file it would otherwise read
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Run {
            modem_port,
            radio_port,
        } => {
            let mut config = config_or_load(pre_config, &cli.config).await?;
            config.validate()?;
            if let Some(p) = modem_port {
                config.modem.port = p;
            }
            if let Some(p) = radio_port {
                config.radio.port = p;
            }
            info!("Starting fieldrelay v{}", env!("CARGO_PKG_VERSION"));
            run_gateway(config).await?;
        }
        Commands::Node { radio_port } => {
            let mut config = config_or_load(pre_config, &cli.config).await?;
            if let Some(p) = radio_port {
                config.radio.port = p;
            }
            run_node(config).await?;
        }
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Probe {
            port,
            baud,
            timeout,
        } => {
            probe(&port, baud, timeout).await?;
        }
        Commands::Decode { frame, strategy } => {
            let strategy = match strategy {
                Some(s) => s,
                None => config_or_load(pre_config, &cli.config).await?.decode.strategy,
            };
            match strategy.decode(&frame) {
                Ok(reading) => println!("{}", reading.encode()),
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Reuse the config read for logging setup; if that read failed, load again so
/// the error reaches the user instead of falling back to defaults.
async fn config_or_load(pre_config: Option<Config>, path: &str) -> Result<Config> {
    match pre_config {
        Some(config) => Ok(config),
        None => Config::load(path).await,
    }
}

#[cfg(not(feature = "serial"))]
async fn run_gateway(_config: Config) -> Result<()> {
    error!("run requires the 'serial' feature");
    std::process::exit(2);
}

/// Run the gateway; a device reset tears everything down and builds it again.
#[cfg(feature = "serial")]
async fn run_gateway(config: Config) -> Result<()> {
    use fieldrelay::clock::TokioClock;
    use fieldrelay::events::{Event, EventSink, LogSink};
    use fieldrelay::gateway::{Gateway, RunExit};
    use fieldrelay::modem::{serial::SerialModem, AtPort, Modem};
    use fieldrelay::radio::serial::SerialRadio;
    use std::time::Duration;

    let status = tokio::spawn(async {
        let mut ticker = tokio::time::interval(Duration::from_secs(STATUS_INTERVAL_SECS));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            log_status();
        }
    });

    loop {
        let radio = match SerialRadio::open(&config.radio.port, config.radio.baud_rate) {
            Ok(r) => r,
            Err(e) => {
                error!("{}", e);
                LogSink.emit(Event::InitFatal);
                std::process::exit(EXIT_INIT_FATAL);
            }
        };
        let transport = SerialModem::open(&config.modem.port, config.modem.baud_rate)?;
        let port = AtPort::new(transport, TokioClock)
            .with_poll_interval(Duration::from_millis(config.modem.poll_interval_ms.max(1)));
        let modem = Modem::new(port, config.modem_timing(), config.session());

        let mut gateway = Gateway::new(radio, modem, config.gateway_settings(), LogSink);
        if let Err(e) = gateway.start().await {
            error!("{}", e);
            std::process::exit(EXIT_INIT_FATAL);
        }

        match gateway.run(tokio::signal::ctrl_c()).await {
            RunExit::Shutdown => break,
            RunExit::DeviceReset => info!("Device reset: reopening peripherals"),
        }
    }

    status.abort();
    log_status();
    Ok(())
}

#[cfg(not(feature = "serial"))]
async fn run_node(_config: Config) -> Result<()> {
    error!("node requires the 'serial' feature");
    std::process::exit(2);
}

#[cfg(feature = "serial")]
async fn run_node(config: Config) -> Result<()> {
    use fieldrelay::clock::TokioClock;
    use fieldrelay::node::{SensorNode, SimulatedSensor};
    use fieldrelay::radio::serial::SerialRadio;
    use std::time::Duration;

    let radio = SerialRadio::open(&config.radio.port, config.radio.baud_rate)?;
    let mut node = SensorNode::new(
        SimulatedSensor::new(),
        radio,
        TokioClock,
        Duration::from_millis(config.node.transmit_interval_ms),
    );
    if let Err(e) = node.start(config.radio.frequency_mhz, config.radio.tx_power_dbm) {
        error!("{}", e);
        std::process::exit(EXIT_INIT_FATAL);
    }
    info!(
        "Sensor node transmitting every {} ms",
        config.node.transmit_interval_ms
    );
    node.run(tokio::signal::ctrl_c()).await;
    Ok(())
}

#[cfg(not(feature = "serial"))]
async fn probe(_port: &str, _baud: u32, _timeout: u64) -> Result<()> {
    error!("probe requires the 'serial' feature");
    std::process::exit(2);
}

#[cfg(feature = "serial")]
async fn probe(port: &str, baud: u32, timeout: u64) -> Result<()> {
    use fieldrelay::clock::{Clock, TokioClock};
    use fieldrelay::logutil::escape_log;
    use fieldrelay::modem::{serial::SerialModem, AtPort};
    use std::time::Duration;

    info!("Probing modem on {} @ {} baud", port, baud);
    let mut at = AtPort::new(SerialModem::open(port, baud)?, TokioClock);
    let started = TokioClock.now();
    let response = at.send_and_wait("AT", Duration::from_secs(timeout)).await;
    let elapsed = TokioClock.now().saturating_duration_since(started);
    let status_ok = response.contains("OK");
    let payload = serde_json::json!({
        "status": if status_ok { "ok" } else { "no-answer" },
        "port": port,
        "baud": baud,
        "elapsed_ms": elapsed.as_millis() as u64,
        "response": escape_log(&response),
        "timeout_seconds": timeout,
    });
    println!("{}", payload);
    std::process::exit(if status_ok { 0 } else { 1 });
}

fn log_status() {
    let snap = fieldrelay::metrics::snapshot();
    match serde_json::to_string(&snap) {
        Ok(json) => info!("status {}", json),
        Err(e) => error!("status snapshot not serializable: {}", e),
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Console copy only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_config_is_reported_not_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let err = config_or_load(None, path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[tokio::test]
    async fn malformed_config_is_reported_not_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[radio\nport = 1").unwrap();
        let err = config_or_load(None, path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[tokio::test]
    async fn already_loaded_config_is_reused() {
        let mut config = Config::default();
        config.radio.port = "/dev/ttyS9".into();
        let got = config_or_load(Some(config.clone()), "/nonexistent/config.toml")
            .await
            .unwrap();
        assert_eq!(got, config);
    }
}
