use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use assistive_visions::agent::{Assistant, UnconfiguredAssistant};
use assistive_visions::display::DisplayUpdate;
use assistive_visions::location::{FixedLocation, LocationProvider, NoLocation};
use assistive_visions::providers::{ChatAssistant, HttpDetector, VisionDescriber};
use assistive_visions::vision::{
    CameraSource, DetectedObject, LabelDescriber, NoDetector, ObjectDetector, SceneDescriber, StillCamera,
    UnavailableCamera,
};
use assistive_visions::voice::TerminalSpeech;
use assistive_visions::{
    Config, Daemon, Display, GestureEvent, Input, ModeRequest, Point, PointerEvent, Services,
};

/// Assistive Visions - gesture driven scene description and voice assistant
#[derive(Parser)]
#[command(name = "visions", version, about)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(short, long, env = "VISIONS_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Simulated speaking time per word, in milliseconds
    #[arg(long, default_value = "250")]
    pace_ms: u64,

    /// Finish every utterance immediately
    #[arg(long)]
    instant_speech: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run interactively, reading gestures and speech from stdin (default)
    Run,
    /// Load and validate configuration, then print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,assistive_visions=info",
        1 => "info,assistive_visions=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match cli.config {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    if matches!(cli.command, Some(Command::CheckConfig)) {
        print_config(&config);
        return Ok(());
    }

    let services = build_services(&config)?;
    let per_word = (!cli.instant_speech).then(|| Duration::from_millis(cli.pace_ms));

    let (speech_tx, speech_rx) = mpsc::unbounded_channel();
    let speech = Arc::new(TerminalSpeech::new(speech_tx, per_word));
    let (display, updates) = Display::channel();

    let (daemon, inputs) = Daemon::new(&config, speech.clone(), speech_rx, services, display);

    tokio::spawn(render(updates));
    spawn_stdin_reader(inputs, speech);
    print_help();

    daemon.run(shutdown_signal()).await;
    Ok(())
}

fn build_services(config: &Config) -> anyhow::Result<Services> {
    let providers = &config.providers;

    let camera: Arc<dyn CameraSource> = match &config.camera_image {
        Some(path) => Arc::new(StillCamera::new(path.clone())),
        None => {
            tracing::warn!("no camera image configured, camera mode will be unavailable");
            Arc::new(UnavailableCamera)
        }
    };

    let detector: Arc<dyn ObjectDetector> = match &providers.detector_url {
        Some(url) => Arc::new(HttpDetector::new(url.clone())?),
        None => Arc::new(NoDetector),
    };

    let (describer, assistant): (Arc<dyn SceneDescriber>, Arc<dyn Assistant>) =
        match &providers.api_key {
            Some(key) => (
                Arc::new(VisionDescriber::new(
                    &providers.base_url,
                    key.clone(),
                    providers.vision_model.clone(),
                )?),
                Arc::new(ChatAssistant::new(
                    &providers.base_url,
                    key.clone(),
                    providers.chat_model.clone(),
                    config.assistant.system_prompt.clone(),
                )?),
            ),
            None => {
                tracing::warn!("OPENAI_API_KEY not set, using detector labels and no assistant");
                (Arc::new(LabelDescriber), Arc::new(UnconfiguredAssistant))
            }
        };

    let location: Arc<dyn LocationProvider> = match config.location {
        Some(coordinates) => Arc::new(FixedLocation(coordinates)),
        None => Arc::new(NoLocation),
    };

    Ok(Services {
        camera,
        detector,
        describer,
        assistant,
        location,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Print display updates; speech is printed by the adapter
async fn render(mut updates: mpsc::UnboundedReceiver<DisplayUpdate>) {
    while let Some(update) = updates.recv().await {
        match update {
            DisplayUpdate::Status(text) => tracing::debug!(status = %text, "status"),
            DisplayUpdate::Notice(text) => println!("ℹ️  {text}"),
            DisplayUpdate::Description(text) => println!("👁  {text}"),
            DisplayUpdate::Overlay(objects) if !objects.is_empty() => {
                let captions: Vec<String> = objects.iter().map(DetectedObject::caption).collect();
                println!("▢  {}", captions.join(", "));
            }
            DisplayUpdate::Overlay(_) | DisplayUpdate::ClearOverlay => {}
            DisplayUpdate::Mode(mode) => println!("── mode: {mode}"),
        }
    }
}

/// One line typed at the terminal
#[derive(Debug, Clone, PartialEq)]
enum Line {
    Input(Input),
    Hear { text: String, is_final: bool },
    MicError(String),
    Help,
    Quit,
}

fn parse_line(line: &str) -> Result<Line, String> {
    let line = line.trim();
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let parsed = match command {
        "tap" => Line::Input(Input::Gesture(GestureEvent::SingleTap)),
        "double" => Line::Input(Input::Gesture(GestureEvent::DoubleTap)),
        "hold" => Line::Input(Input::Gesture(GestureEvent::LongPressStart)),
        "swipe" => Line::Input(Input::Gesture(GestureEvent::SwipeUp)),
        "down" => Line::Input(Input::Pointer(PointerEvent::Down(Some(parse_point(rest)?)))),
        "move" => Line::Input(Input::Pointer(PointerEvent::Move(parse_point(rest)?))),
        "up" => Line::Input(Input::Pointer(PointerEvent::Up(Some(parse_point(rest)?)))),
        "camera" => Line::Input(Input::Request(ModeRequest::Camera)),
        "assistant" => Line::Input(Input::Request(ModeRequest::Assistant)),
        "stop" => Line::Input(Input::Request(ModeRequest::Stop)),
        "say" | "partial" if rest.is_empty() => return Err(format!("usage: {command} <text>")),
        "say" => Line::Hear {
            text: rest.to_string(),
            is_final: true,
        },
        "partial" => Line::Hear {
            text: rest.to_string(),
            is_final: false,
        },
        "mic-error" if rest.is_empty() => return Err("usage: mic-error <code>".to_string()),
        "mic-error" => Line::MicError(rest.to_string()),
        "help" | "?" => Line::Help,
        "quit" | "exit" => Line::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(parsed)
}

fn parse_point(args: &str) -> Result<Point, String> {
    let mut coords = args.split_whitespace().map(str::parse::<f32>);
    match (coords.next(), coords.next(), coords.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) => Ok(Point::new(x, y)),
        _ => Err(format!("expected <x> <y>, got {args:?}")),
    }
}

/// Read commands on a plain thread so a pending read never blocks shutdown
fn spawn_stdin_reader(inputs: mpsc::Sender<Input>, speech: Arc<TerminalSpeech>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line) {
                Ok(Line::Input(input)) => {
                    if inputs.blocking_send(input).is_err() {
                        break;
                    }
                }
                Ok(Line::Hear { text, is_final }) => {
                    if !speech.hear(&text, is_final) {
                        println!("(not listening)");
                    }
                }
                Ok(Line::MicError(code)) => {
                    if !speech.fail(&code) {
                        println!("(not listening)");
                    }
                }
                Ok(Line::Help) => print_help(),
                Ok(Line::Quit) => break,
                Err(e) => println!("{e}"),
            }
        }
        tracing::debug!("stdin closed");
    });
}

fn print_help() {
    println!(
        "Commands:
  tap | double | hold | swipe     gestures
  down X Y | move X Y | up X Y    raw pointer events
  camera | assistant | stop       mode requests
  say TEXT | partial TEXT         speech heard by the assistant
  mic-error CODE                  fail recognition (e.g. no-speech, network)
  help | quit"
    );
}

fn print_config(config: &Config) {
    let providers = &config.providers;
    println!("Configuration OK");
    println!(
        "  gestures:  long press {:?}, double tap {:?}, swipe >= {}px (drift <= {}px)",
        config.gestures.long_press,
        config.gestures.double_tap,
        config.gestures.swipe_min_distance,
        config.gestures.swipe_max_drift
    );
    println!(
        "  detection: every {:?}, min confidence {}, camera timeout {:?}",
        config.detection.interval, config.detection.min_confidence, config.detection.camera_timeout
    );
    println!(
        "  assistant: location timeout {:?}, ends after {} silent sessions",
        config.assistant.location_timeout, config.assistant.max_silent_sessions
    );
    println!("  base url:  {}", providers.base_url);
    println!("  models:    chat {}, vision {}", providers.chat_model, providers.vision_model);
    println!(
        "  detector:  {}",
        providers.detector_url.as_deref().unwrap_or("(none)")
    );
    println!(
        "  api key:   {}",
        if providers.api_key.is_some() { "set" } else { "(not set)" }
    );
    match &config.camera_image {
        Some(path) => println!("  camera:    {}", path.display()),
        None => println!("  camera:    (none)"),
    }
    match &config.location {
        Some(location) => println!("  location:  {location}"),
        None => println!("  location:  (none)"),
    }
}
