use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use herogen_contracts::commands::{parse_command, WizardCommand, WIZARD_HELP_COMMANDS};
use herogen_contracts::session::{Gender, HeroDetails, DEFAULT_THEME, THEME_PRESETS};
use herogen_contracts::wizard::Step;
use herogen_engine::acquire::{
    AcquisitionError, CameraSource, CaptureAction, FfmpegCamera, FileSource, ImageSource,
};
use herogen_engine::config::{resolve_api_key, GenerationConfig, API_KEY_VARS};
use herogen_engine::gemini::GeminiClient;
use herogen_engine::HeroEngine;
use image::RgbImage;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "herogen",
    version,
    about = "Turn a photo into a cinematic superhero movie poster"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive four-step wizard: scan, identity, generate, premiere.
    Wizard(WizardArgs),
    /// One-shot generation from flags.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct ClientArgs {
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    api_base: Option<String>,
}

#[derive(Debug, Args)]
struct WizardArgs {
    #[arg(long, default_value = "herogen-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    name: String,
    #[arg(long, conflicts_with = "camera", required_unless_present = "camera")]
    image: Option<PathBuf>,
    #[arg(long)]
    camera: bool,
    #[arg(long, requires = "camera")]
    device: Option<String>,
    #[arg(long, default_value = "Male")]
    gender: Gender,
    #[arg(long, default_value = DEFAULT_THEME)]
    theme: String,
    #[arg(long, default_value = "herogen-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    client: ClientArgs,
}

const PREVIEW_REPORT_EVERY: u64 = 30;

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("herogen error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Wizard(args) => {
            run_wizard(args)?;
            Ok(0)
        }
        Command::Run(args) => run_once(args),
    }
}

fn build_engine(client: &ClientArgs, out: &Path, events: Option<PathBuf>) -> Result<HeroEngine> {
    let config = GenerationConfig::from_env()
        .with_overrides(client.api_base.as_deref(), client.model.as_deref());
    info!(model = %config.model, endpoint = %config.endpoint(), "generation client configured");
    if resolve_api_key().is_none() {
        warn!(
            "no credential found in {}; generation will fail until one is set",
            API_KEY_VARS.join(", ")
        );
    }
    let events_path = events.unwrap_or_else(|| out.join("events.jsonl"));
    let engine = HeroEngine::new(Box::new(GeminiClient::new(config)), Some(events_path))
        .context("failed to start wizard session")?;
    if let Some(path) = engine.event_log_path() {
        info!(path = %path.display(), session = engine.session().id(), "recording session events");
    }
    Ok(engine)
}

/// Lines from stdin, read on a helper thread so a live camera preview can poll them.
fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let text = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(text).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
    rx
}

fn capture_action_for(input: &str) -> CaptureAction {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "capture" | "/capture" => CaptureAction::Capture,
        "c" | "cancel" | "/cancel" => CaptureAction::Cancel,
        "r" | "restart" | "/restart" => CaptureAction::Restart,
        _ => CaptureAction::Continue,
    }
}

fn capture_from_camera(
    engine: &mut HeroEngine,
    device: Option<&str>,
    lines: &Receiver<String>,
) -> Result<bool, AcquisitionError> {
    println!("Camera starting. Press Enter to capture, 'c' to cancel, 'r' to restart.");
    let control = |frame: &RgbImage, index: u64| {
        if index % PREVIEW_REPORT_EVERY == 0 {
            let (width, height) = frame.dimensions();
            eprint!("\rlive preview: frame {index} ({width}x{height})   ");
        }
        match lines.try_recv() {
            Ok(input) => capture_action_for(&input),
            Err(TryRecvError::Empty) => CaptureAction::Continue,
            Err(TryRecvError::Disconnected) => CaptureAction::Cancel,
        }
    };
    let mut source = CameraSource::new(FfmpegCamera::new(device), control);
    let result = engine.acquire(&mut source);
    eprintln!();
    result
}

fn acquire_with(engine: &mut HeroEngine, source: &mut dyn ImageSource) {
    match engine.acquire(source) {
        Ok(true) => println!("Photo locked in."),
        Ok(false) => println!("No photo chosen."),
        Err(err) => println!("Error: {err}"),
    }
}

fn print_step_banner(step: Step) {
    let order = [Step::AcquireImage, Step::CollectDetails, Step::ShowResult];
    let header = order
        .iter()
        .enumerate()
        .map(|(idx, candidate)| {
            let label = format!("{}. {}", idx + 1, candidate.label());
            if *candidate == step {
                format!("[{label}]")
            } else {
                label
            }
        })
        .collect::<Vec<String>>()
        .join(" - ");
    println!("{header}");
    match step {
        Step::AcquireImage => {
            println!("Upload a photo (/upload <path> or just type the path) or use /camera.")
        }
        Step::CollectDetails => println!(
            "Set /name, /gender, /theme, then /generate. Themes: {}",
            THEME_PRESETS
                .iter()
                .enumerate()
                .map(|(idx, theme)| format!("{} {theme}", idx + 1))
                .collect::<Vec<String>>()
                .join(", ")
        ),
        Step::Generating => println!("Generating your scene..."),
        Step::ShowResult => println!("Your premiere is ready: /save, /regenerate, or /reset."),
    }
}

fn print_status(engine: &HeroEngine, draft: &HeroDetails) {
    let session = engine.session();
    println!("Step: {}", session.step());
    match session.image() {
        Some(photo) => println!(
            "Photo: {} ({} base64 chars)",
            photo.mime_type(),
            photo.raw_base64().len()
        ),
        None => println!("Photo: none"),
    }
    println!(
        "Alias: {:?}  Gender: {}  Theme: {}",
        draft.hero_name, draft.gender, draft.theme
    );
    if let Some(generated) = session.generated() {
        println!("Poster: {} ready", generated.mime_type());
    }
    if let Some(error) = session.last_error() {
        println!("Error: {error}");
    }
}

fn print_result(engine: &HeroEngine) {
    let session = engine.session();
    match session.step() {
        Step::ShowResult => {
            let details = session.details();
            println!("{}", details.hero_name.to_uppercase());
            println!("A {} Original Movie", details.theme);
        }
        _ => {
            if let Some(error) = session.last_error() {
                println!("Error: {error}");
            }
        }
    }
}

fn run_wizard(args: WizardArgs) -> Result<()> {
    let mut engine = build_engine(&args.client, &args.out, args.events.clone())?;
    let lines = stdin_lines();
    let mut draft = HeroDetails::default();
    let mut shown_step: Option<Step> = None;

    println!("HeroGen wizard started. Type /help for commands.");

    loop {
        let step = engine.step();
        if shown_step != Some(step) {
            if step == Step::CollectDetails {
                draft = engine.session().details().clone();
            }
            print_step_banner(step);
            shown_step = Some(step);
        }
        print!("> ");
        io::stdout().flush()?;

        let Ok(line) = lines.recv() else {
            break;
        };

        match parse_command(&line) {
            WizardCommand::Noop => {}
            WizardCommand::Help => println!("Commands: {}", WIZARD_HELP_COMMANDS.join(" ")),
            WizardCommand::Quit => break,
            WizardCommand::Status => print_status(&engine, &draft),
            WizardCommand::Dismiss => engine.dismiss_error(),
            WizardCommand::Upload(path) => acquire_with(&mut engine, &mut FileSource::from_path(path)),
            WizardCommand::Camera(device) => {
                if let Err(err) = capture_from_camera(&mut engine, device.as_deref(), &lines) {
                    println!("Error: {err}");
                    println!("Use /camera to try again or /upload <path> to pick a file.");
                }
            }
            WizardCommand::Text(text) => match step {
                Step::AcquireImage => {
                    acquire_with(&mut engine, &mut FileSource::from_path(PathBuf::from(text)))
                }
                Step::CollectDetails => {
                    draft.hero_name = text;
                    println!("Alias set to {}", draft.hero_name);
                }
                _ => println!("Type /help for commands."),
            },
            WizardCommand::Name(name) => {
                draft.hero_name = name;
                println!("Alias set to {}", draft.hero_name);
            }
            WizardCommand::Gender(gender) => {
                draft.gender = gender;
                println!("Gender set to {gender}");
            }
            WizardCommand::Theme(theme) => {
                draft.theme = theme;
                println!("Theme set to {}", draft.theme);
            }
            WizardCommand::Generate => {
                if step == Step::CollectDetails && draft.has_alias() {
                    print_step_banner(Step::Generating);
                }
                match engine.submit_details(draft.clone()) {
                    Ok(_) => print_result(&engine),
                    Err(err) => println!("Error: {err}"),
                }
            }
            WizardCommand::Regenerate => {
                if step == Step::ShowResult {
                    print_step_banner(Step::Generating);
                }
                match engine.regenerate() {
                    Ok(_) => print_result(&engine),
                    Err(err) => println!("Error: {err}"),
                }
            }
            WizardCommand::Back => {
                if let Err(err) = engine.back() {
                    println!("Error: {err}");
                }
            }
            WizardCommand::Reset => match engine.reset() {
                Ok(()) => draft = HeroDetails::default(),
                Err(err) => println!("Error: {err}"),
            },
            WizardCommand::Save(dir) => {
                let dir = dir.unwrap_or_else(|| args.out.clone());
                match engine.save_poster(&dir) {
                    Ok(path) => println!("Poster saved to {}", path.display()),
                    Err(err) => println!("Error: {err:#}"),
                }
            }
            WizardCommand::Invalid { reason, .. } => println!("{reason}"),
            WizardCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help for commands.")
            }
        }
    }

    Ok(())
}

fn run_once(args: RunArgs) -> Result<i32> {
    let mut engine = build_engine(&args.client, &args.out, args.events.clone())?;

    let acquired = if args.camera {
        let lines = stdin_lines();
        capture_from_camera(&mut engine, args.device.as_deref(), &lines)?
    } else {
        engine.acquire(&mut FileSource::new(args.image.clone()))?
    };
    if !acquired {
        bail!("no photo was captured");
    }

    let details = HeroDetails::new(args.gender, args.name.clone(), args.theme.clone());
    let step = engine.submit_details(details)?;
    if step != Step::ShowResult {
        print_result(&engine);
        return Ok(1);
    }

    print_result(&engine);
    let path = engine.save_poster(&args.out)?;
    println!("Poster saved to {}", path.display());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use herogen_contracts::session::Gender;
    use herogen_engine::acquire::CaptureAction;

    use super::{capture_action_for, Cli, Command};

    #[test]
    fn run_args_parse_with_defaults() {
        let cli = Cli::try_parse_from(["herogen", "run", "--name", "Nightwatcher", "--image", "me.jpg"])
            .expect("parse run");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.gender, Gender::Male);
        assert_eq!(args.theme, "Sci-Fi Action");
        assert!(!args.camera);
    }

    #[test]
    fn run_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["herogen", "run", "--name", "X"]).is_err());
        assert!(Cli::try_parse_from([
            "herogen", "run", "--name", "X", "--image", "a.jpg", "--camera"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["herogen", "run", "--name", "X", "--camera", "--gender", "nb"]).is_ok());
    }

    #[test]
    fn camera_keys_map_to_actions() {
        assert_eq!(capture_action_for(""), CaptureAction::Capture);
        assert_eq!(capture_action_for(" C "), CaptureAction::Cancel);
        assert_eq!(capture_action_for("/restart"), CaptureAction::Restart);
        assert_eq!(capture_action_for("hello"), CaptureAction::Continue);
    }
}
