//! potholed - live pothole alert daemon
//!
//! This daemon:
//! 1. Loads configuration (POTHOLE_CONFIG + env overrides)
//! 2. Opens the rear camera and starts loading the model in the background
//! 3. Reads `start` / `stop` / `quit` from stdin and drives the detection loop
//! 4. Flashes the status line when a pothole is detected

use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::sync::Arc;
use tokio::sync::mpsc;

use pothole_watch::ingest::open_source;
use pothole_watch::{
    Command, Controls, DetectionEvent, DetectionLoop, Detector, ModelSession, Preprocessor,
    TerminalAlertSink, UiMode, WatchConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Status line style: auto, plain or pretty.
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = WatchConfig::load()?;
    log::info!(
        "potholed starting: model {}, source {}",
        config.model_path.display(),
        config.source.url
    );

    let (tx, mut commands) = mpsc::unbounded_channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Command::Quit);
    })?;
    spawn_stdin_reader(tx)?;

    let session = ModelSession::loading();
    let (mut controls, detection) = match open_source(&config.source) {
        Ok(source) => {
            load_model(&session, &config);
            let detector = Detector::new(Preprocessor::new(config.resize_filter), session.clone());
            let sink = Arc::new(TerminalAlertSink::new(
                UiMode::parse(Some(&args.ui)),
                std::io::stderr().is_terminal(),
            ));
            let detection =
                DetectionLoop::new(source, detector, sink).with_vibrate_duration(config.vibrate);
            spawn_event_logger(&detection);
            (Controls::new(), Some(detection))
        }
        Err(err) => {
            log::error!("camera unavailable, detection disabled: {:#}", err);
            (Controls::disabled(), None)
        }
    };

    log::info!("potholed ready; type 'start', 'stop' or 'quit'");
    while let Some(command) = commands.recv().await {
        match command {
            Command::Start => {
                if !controls.click_start() {
                    log::warn!("start is not available right now");
                    continue;
                }
                if let Some(detection) = &detection {
                    detection.start()?;
                }
            }
            Command::Stop => {
                if !controls.click_stop() {
                    log::warn!("stop is not available right now");
                    continue;
                }
                if let Some(detection) = &detection {
                    detection.stop();
                }
            }
            Command::Quit => break,
        }
    }

    if let Some(detection) = &detection {
        detection.stop();
    }
    log::info!("potholed stopped");
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn load_model(session: &ModelSession, config: &WatchConfig) {
    session.load_onnx_in_background(config.model_path.clone());
}

#[cfg(not(feature = "backend-tract"))]
fn load_model(session: &ModelSession, config: &WatchConfig) {
    session.install(Err(anyhow::anyhow!(
        "cannot load {}: built without the backend-tract feature",
        config.model_path.display()
    )));
}

fn spawn_stdin_reader(tx: mpsc::UnboundedSender<Command>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            return;
                        }
                    }
                    None => log::warn!("unknown command '{}'", line.trim()),
                }
            }
            // EOF on stdin quits.
            let _ = tx.send(Command::Quit);
        })?;
    Ok(())
}

fn spawn_event_logger(detection: &DetectionLoop) {
    let mut events = detection.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DetectionEvent::Clear { confidence }) => {
                    log::debug!("clear: confidence {:.4}", confidence);
                }
                Ok(DetectionEvent::Alert { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("event logger skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
