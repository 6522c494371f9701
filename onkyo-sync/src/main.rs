use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use onkyo_discovery::{Device, Discover, StaticDiscovery};
use onkyo_link::{LinkEvent, LoopbackLink, ReceiverLink, TcpLink, DEFAULT_PORT};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use onkyo_sync::logging::{self, LoggingMode};
use onkyo_sync::{
    ActionUpdate, ChannelPlayer, EngineHandle, PlaybackNotification, PlayerMessage,
    ReceiverChoice, Reconciler, Settings, SharedSettings, SyncEngine,
};

/// Keep an Onkyo receiver in step with a media player
///
/// Reads playback notifications as JSON lines on stdin, e.g.
/// `{"status":"play","volume":40}`, and writes messages for the player as
/// JSON lines on stdout.
#[derive(Parser, Debug)]
#[command(name = "onkyo-sync")]
#[command(version)]
pub struct Args {
    /// Settings file in config.json format
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Receiver address; disables auto discovery
    #[arg(long)]
    pub host: Option<String>,

    /// Receiver eISCP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Receiver model, used to pick its zones
    #[arg(short, long)]
    pub model: Option<String>,

    /// Known receiver, `host[:port][/model]`; repeat for several
    #[arg(short, long = "device", value_name = "DEVICE")]
    pub devices: Vec<String>,

    /// Discovery timeout in seconds
    #[arg(long, default_value = "3")]
    pub discovery_timeout: u64,

    /// Log output; falls back to ONKYO_LOG_MODE
    #[arg(long, value_enum)]
    pub log_mode: Option<LoggingMode>,

    /// Print commands instead of sending them to a receiver
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    pub fn discovery_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery_timeout == 0 {
            return Err(anyhow::anyhow!("Discovery timeout must be positive"));
        }

        if self.port == Some(0) {
            return Err(anyhow::anyhow!("Port must not be 0"));
        }

        if matches!(&self.host, Some(host) if host.trim().is_empty()) {
            return Err(anyhow::anyhow!("Host must not be empty"));
        }

        for device in &self.devices {
            parse_device(device)?;
        }

        Ok(())
    }

    /// Settings from the config file with command line overrides applied
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => Settings::default(),
        };

        if let Some(host) = &self.host {
            settings.receiver_ip = Some(host.trim().to_string());
            settings.auto_discovery = false;
        }
        if let Some(port) = self.port {
            settings.receiver_port = Some(port);
        }
        if let Some(model) = &self.model {
            settings.receiver_model = Some(model.clone());
        }
        if settings.receiver_ip.is_some() && settings.receiver_port.is_none() {
            settings.receiver_port = Some(DEFAULT_PORT);
        }

        Ok(settings)
    }
}

/// Parse a `host[:port][/model]` device argument
fn parse_device(value: &str) -> Result<Device> {
    let (address, model) = match value.split_once('/') {
        Some((address, model)) => (address, model),
        None => (value, ""),
    };
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>()
                .with_context(|| format!("Invalid port in device '{}'", value))?,
        ),
        None => (address, DEFAULT_PORT),
    };

    if host.is_empty() || port == 0 {
        return Err(anyhow::anyhow!("Invalid device '{}'", value));
    }

    Ok(Device {
        host: host.to_string(),
        port,
        model: model.to_string(),
        mac: String::new(),
    })
}

/// Settings form submissions accepted on stdin
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Control {
    SaveConnection(ConnectionForm),
    SaveActions(ActionUpdate),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConnectionForm {
    /// Selector value of the chosen receiver, or `manual`
    receiver: String,
    host: String,
    port: String,
    model: String,
}

const CONTROL_KEYS: &[&str] = &["saveConnection", "saveActions"];

fn handle_line(line: &str, engine: &EngineHandle, settings: &SharedSettings) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(line).with_context(|| format!("Invalid JSON: {}", line))?;

    let is_control = value
        .as_object()
        .is_some_and(|object| CONTROL_KEYS.iter().any(|key| object.contains_key(*key)));
    if is_control {
        let control: Control = serde_json::from_value(value)
            .with_context(|| format!("Invalid settings update: {}", line))?;
        match control {
            Control::SaveConnection(form) => {
                let connection = ReceiverChoice::parse(&form.receiver)?.into_connection(
                    &form.host,
                    &form.port,
                    &form.model,
                );
                settings.update(|s| {
                    s.receiver_ip = Some(connection.host.clone());
                    s.receiver_port = Some(connection.port);
                    s.receiver_model = Some(connection.model.clone()).filter(|m| !m.is_empty());
                });
                info!("Connection settings saved: {}", connection);
                engine.rebind(connection)?;
            }
            Control::SaveActions(update) => {
                settings.apply_actions(&update);
                info!("Action settings saved");
            }
        }
        return Ok(());
    }

    let notification: PlaybackNotification = serde_json::from_value(value)
        .with_context(|| format!("Invalid notification: {}", line))?;
    engine.notify_playback(notification)?;
    Ok(())
}

fn print_message(message: &PlayerMessage) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, message)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up shutdown
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn build_link(dry_run: bool) -> Result<(Arc<dyn ReceiverLink>, mpsc::UnboundedReceiver<LinkEvent>)> {
    if dry_run {
        info!("Dry run: commands are logged, not sent");
        let (link, events) = LoopbackLink::new();
        Ok((Arc::new(link), events))
    } else {
        let (link, events) = TcpLink::new().context("Failed to create receiver link")?;
        Ok((Arc::new(link), events))
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = SharedSettings::new(args.settings()?);
    let (link, link_events) = build_link(args.dry_run)?;
    let (player, mut player_messages) = ChannelPlayer::new();

    let reconciler = Reconciler::new(link, Arc::new(settings.clone()), Arc::new(player));
    let (engine, engine_task) = SyncEngine::start(reconciler, link_events);

    let printer = tokio::spawn(async move {
        while let Some(message) = player_messages.recv().await {
            if let Err(e) = print_message(&message) {
                warn!("Failed to write player message: {}", e);
            }
        }
    });

    let devices = args
        .devices
        .iter()
        .map(|d| parse_device(d))
        .collect::<Result<Vec<_>>>()?;
    let discovery = StaticDiscovery::new(devices);
    let timeout = args.discovery_timeout_duration();
    let outcome = tokio::task::spawn_blocking(move || discovery.discover(timeout))
        .await
        .context("Discovery task failed")?;
    info!("Discovery finished with {} receiver(s)", outcome.devices().len());
    engine.discovery_finished(outcome)?;

    let mut lines = spawn_stdin_reader();
    loop {
        tokio::select! {
            line = lines.recv() => match line.transpose().context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Err(e) = handle_line(line.trim(), &engine, &settings) {
                        warn!("{:#}", e);
                    }
                }
                None => {
                    info!("Input closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    engine.shutdown()?;
    engine_task.await.context("Sync engine task failed")?;
    printer.await.context("Output task failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    match args.log_mode {
        Some(mode) => logging::init_logging(mode)?,
        None => logging::init_logging_from_env()?,
    }

    run(args).await
}
