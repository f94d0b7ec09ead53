use std::cell::RefCell;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use studio_contracts::events::{event_payload, EventWriter};
use studio_contracts::jobs::{progress_message, PollTick};
use studio_contracts::media::{AspectRatio, MediaResult, Resolution};
use studio_contracts::models::{Capability, ModelSelector};
use studio_contracts::shell::{parse_intent, SHELL_HELP_COMMANDS};
use studio_engine::{
    ApiCredential, CancelToken, DirectorySink, EnvKeySelector, GeminiMediaClient, ImageStudio,
    KeySelector, MediaError, ObjectUrlStore, StudioConfig, StudioResult, VideoStudio,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

const DEFAULT_LOG_FILTER: &str = "media_studio=info,studio_engine=info";
const EXIT_FAILURE: i32 = 1;
const EXIT_API_KEY_REQUIRED: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "media-studio",
    version,
    about = "Gemini image and Veo video studio"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate an image from a prompt, optionally editing a source image.
    Image(ImageArgs),
    /// Enhance an existing image.
    Enhance(EnhanceArgs),
    /// Generate a video from a prompt, optionally seeded with a first frame.
    Video(VideoArgs),
    /// Interactive shell with the image and video surfaces.
    Studio(StudioArgs),
}

#[derive(Debug, Args)]
struct SharedArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    video_model: Option<String>,
}

#[derive(Debug, Parser)]
struct ImageArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    source: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    filename: Option<String>,
    #[command(flatten)]
    shared: SharedArgs,
}

#[derive(Debug, Parser)]
struct EnhanceArgs {
    #[arg(long)]
    source: PathBuf,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    filename: Option<String>,
    #[command(flatten)]
    shared: SharedArgs,
}

#[derive(Debug, Parser)]
struct VideoArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "16:9")]
    aspect_ratio: AspectRatio,
    #[arg(long, default_value = "720p")]
    resolution: Resolution,
    #[arg(long)]
    source: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    filename: Option<String>,
    #[command(flatten)]
    shared: SharedArgs,
}

#[derive(Debug, Parser)]
struct StudioArgs {
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[command(flatten)]
    shared: SharedArgs,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("media-studio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Image(args) => run_image(args),
        Command::Enhance(args) => run_enhance(args),
        Command::Video(args) => run_video(args),
        Command::Studio(args) => run_studio(args),
    }
}

/// Where the key prompt reads its answer from.
trait LineSource {
    fn next_line(&self, buf: &mut String) -> io::Result<usize>;
}

impl LineSource for io::Stdin {
    fn next_line(&self, buf: &mut String) -> io::Result<usize> {
        self.read_line(buf)
    }
}

/// Keys typed at the terminal, layered over the environment.
struct PromptKeySelector<R> {
    input: R,
    entered: RefCell<Option<ApiCredential>>,
    fallback: EnvKeySelector,
}

impl<R: LineSource> PromptKeySelector<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            entered: RefCell::new(None),
            fallback: EnvKeySelector,
        }
    }
}

impl<R: LineSource> KeySelector for PromptKeySelector<R> {
    fn open_select_key(&self) -> StudioResult<()> {
        eprint!("Enter a Gemini API key from a project with billing enabled (blank keeps the current key): ");
        io::stderr().flush().map_err(stdin_error)?;
        let mut line = String::new();
        self.input.next_line(&mut line).map_err(stdin_error)?;
        if let Some(key) = ApiCredential::new(line) {
            *self.entered.borrow_mut() = Some(key);
            tracing::info!("API key updated for this session");
        }
        Ok(())
    }

    fn current_key(&self) -> Option<ApiCredential> {
        self.entered
            .borrow()
            .clone()
            .or_else(|| self.fallback.current_key())
    }
}

fn stdin_error(source: io::Error) -> MediaError {
    MediaError::Read {
        path: PathBuf::from("<stdin>"),
        source,
    }
}

/// Everything a run needs besides its surface: client, keys, event log and
/// output directory.
struct Session {
    client: GeminiMediaClient,
    keys: PromptKeySelector<io::Stdin>,
    events: EventWriter,
    sink: DirectorySink,
}

impl Session {
    fn open(out: &Path, shared: &SharedArgs, kind: &str) -> Result<Self> {
        std::fs::create_dir_all(out)
            .with_context(|| format!("failed creating {}", out.display()))?;
        let mut config = StudioConfig::from_env();
        if shared.image_model.is_some() {
            config.set_image_model(shared.image_model.as_deref());
        }
        if shared.video_model.is_some() {
            config.set_video_model(shared.video_model.as_deref());
        }
        for warning in &config.warnings {
            tracing::warn!("{warning}");
        }

        let events_path = shared
            .events
            .clone()
            .unwrap_or_else(|| out.join("events.jsonl"));
        let session_id = format!("{kind}-{}", Uuid::new_v4().simple());
        let events = EventWriter::new(events_path, session_id);
        events.emit(
            "session_started",
            event_payload(json!({
                "command": kind,
                "out_dir": out.to_string_lossy(),
                "image_model": config.image_model,
                "video_model": config.video_model,
            })),
        )?;

        Ok(Self {
            client: GeminiMediaClient::new(config, ObjectUrlStore::new()),
            keys: PromptKeySelector::new(io::stdin()),
            events,
            sink: DirectorySink::new(out),
        })
    }
}

fn run_image(args: ImageArgs) -> Result<i32> {
    let session = Session::open(&args.out, &args.shared, "image")?;
    let mut studio = ImageStudio::new(Some(session.events.clone()));
    let outcome = (|| -> StudioResult<PathBuf> {
        if let Some(source) = args.source.as_deref() {
            studio.upload(source)?;
        }
        studio.generate(&session.client, &session.keys, &args.prompt)?;
        studio.save(&session.client, &session.sink, args.filename.as_deref())
    })();
    exit_code(outcome)
}

fn run_enhance(args: EnhanceArgs) -> Result<i32> {
    let session = Session::open(&args.out, &args.shared, "enhance")?;
    let mut studio = ImageStudio::new(Some(session.events.clone()));
    let outcome = (|| -> StudioResult<PathBuf> {
        studio.upload(&args.source)?;
        studio.enhance(&session.client, &session.keys)?;
        studio.save(&session.client, &session.sink, args.filename.as_deref())
    })();
    exit_code(outcome)
}

fn run_video(args: VideoArgs) -> Result<i32> {
    let session = Session::open(&args.out, &args.shared, "video")?;
    let mut studio = VideoStudio::new(Some(session.events.clone()));
    let outcome = (|| -> StudioResult<PathBuf> {
        studio.set_aspect_ratio(args.aspect_ratio)?;
        studio.set_resolution(args.resolution);
        if let Some(source) = args.source.as_deref() {
            studio.upload(source)?;
        }
        eprintln!("Starting the video engine...");
        studio.generate(
            &session.client,
            &session.keys,
            &args.prompt,
            // Never cancelled: the poll deadline is the only bound here.
            &CancelToken::new(),
            &mut report_progress,
        )?;
        studio.save(&session.client, &session.sink, args.filename.as_deref())
    })();
    exit_code(outcome)
}

fn exit_code(outcome: StudioResult<PathBuf>) -> Result<i32> {
    match outcome {
        Ok(path) => {
            println!("Saved {}", path.display());
            Ok(0)
        }
        Err(err) if err.is_api_key_required() => {
            eprintln!("{}", err.user_message());
            Ok(EXIT_API_KEY_REQUIRED)
        }
        Err(err) => {
            tracing::debug!(error = %err, "one-shot request failed");
            eprintln!("{}", err.user_message());
            Ok(EXIT_FAILURE)
        }
    }
}

fn report_progress(tick: &PollTick) {
    eprintln!(
        "[{:>4}s] {}",
        tick.waited.as_secs(),
        progress_message(tick.cycle.saturating_sub(1))
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Image,
    Video,
}

impl Surface {
    fn label(self) -> &'static str {
        match self {
            Surface::Image => "image",
            Surface::Video => "video",
        }
    }
}

fn run_studio(args: StudioArgs) -> Result<i32> {
    let mut session = Session::open(&args.out, &args.shared, "studio")?;
    let mut image = ImageStudio::new(Some(session.events.clone()));
    let mut video = VideoStudio::new(Some(session.events.clone()));
    let mut surface = Surface::Image;
    let stdin = io::stdin();
    let mut line = String::new();

    println!("Media studio started. Type /help for commands.");

    loop {
        print!("{}> ", surface.label());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.lock().read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => {}
            "quit" => break,
            "help" => {
                println!("Commands: {}", SHELL_HELP_COMMANDS.join(" "));
                println!("Anything else is a prompt for the active studio.");
            }
            "switch_image" => {
                surface = Surface::Image;
                println!("Image studio active.");
            }
            "switch_video" => {
                surface = Surface::Video;
                let options = video.options();
                println!(
                    "Video studio active ({}, {}).",
                    options.aspect_ratio, options.resolution
                );
            }
            "upload" => {
                let Some(path) = intent.arg_str("path") else {
                    println!("/upload requires a path");
                    continue;
                };
                let uploaded = match surface {
                    Surface::Image => image.upload(Path::new(path)).cloned(),
                    Surface::Video => video.upload(Path::new(path)).cloned(),
                };
                match uploaded {
                    Ok(source) => println!("Source image set ({}).", source.mime_type),
                    Err(err) => report_failure(&err),
                }
            }
            "clear_source" => {
                match surface {
                    Surface::Image => image.clear_source(),
                    Surface::Video => video.clear_source(),
                }
                println!("Source image cleared.");
            }
            "enhance" => {
                if surface != Surface::Image {
                    println!("/enhance is only available in the image studio.");
                    continue;
                }
                println!("Enhancing...");
                match image.enhance(&session.client, &session.keys) {
                    Ok(result) => announce_result(&result),
                    Err(err) => report_failure(&err),
                }
            }
            "set_aspect_ratio" | "set_resolution" if surface == Surface::Image => {
                println!("{}", image_surface_refusal(intent.action.as_str()));
            }
            "set_aspect_ratio" => {
                let raw = intent.arg_str("value").unwrap_or_default();
                match raw.parse::<AspectRatio>() {
                    Ok(ratio) => match video.set_aspect_ratio(ratio) {
                        Ok(()) => println!("Aspect ratio set to {ratio}"),
                        Err(err) => report_failure(&err),
                    },
                    Err(reason) => println!("{reason}"),
                }
            }
            "set_resolution" => {
                let raw = intent.arg_str("value").unwrap_or_default();
                match raw.parse::<Resolution>() {
                    Ok(resolution) => {
                        video.set_resolution(resolution);
                        println!("Video resolution set to {resolution}");
                    }
                    Err(reason) => println!("{reason}"),
                }
            }
            "save" => {
                let filename = intent.arg_str("filename");
                let saved = match surface {
                    Surface::Image => image.save(&session.client, &session.sink, filename),
                    Surface::Video => video.save(&session.client, &session.sink, filename),
                };
                match saved {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(err) => report_failure(&err),
                }
            }
            "set_image_model" => {
                let Some(model) = intent.arg_str("model") else {
                    print_models(Capability::Image, &session.client.config().image_model);
                    continue;
                };
                let config = session.client.config_mut();
                config.warnings.clear();
                config.set_image_model(Some(model));
                for warning in &config.warnings {
                    println!("{warning}");
                }
                println!("Image model set to {}", config.image_model);
            }
            "set_video_model" => {
                let Some(model) = intent.arg_str("model") else {
                    print_models(Capability::Video, &session.client.config().video_model);
                    continue;
                };
                let config = session.client.config_mut();
                config.warnings.clear();
                config.set_video_model(Some(model));
                for warning in &config.warnings {
                    println!("{warning}");
                }
                println!("Video model set to {}", config.video_model);
            }
            "select_key" => {
                session
                    .events
                    .emit("api_key_prompted", event_payload(json!({ "reason": "manual" })))?;
                if let Err(err) = session.keys.open_select_key() {
                    report_failure(&err);
                }
            }
            "generate" => {
                let prompt = intent.prompt.as_deref().unwrap_or_default();
                let outcome = match surface {
                    Surface::Image => {
                        println!("Generating image...");
                        image.generate(&session.client, &session.keys, prompt)
                    }
                    Surface::Video => {
                        println!("Starting the video engine...");
                        video.generate(
                            &session.client,
                            &session.keys,
                            prompt,
                            // Never cancelled: the poll deadline is the only bound here.
                            &CancelToken::new(),
                            &mut report_progress,
                        )
                    }
                };
                match outcome {
                    Ok(result) => announce_result(&result),
                    Err(err) => report_failure(&err),
                }
            }
            "unknown" => {
                let command = intent.arg_str("command").unwrap_or_default();
                println!("Unknown command: /{command}. Type /help for commands.");
            }
            other => {
                tracing::debug!(action = other, "unhandled shell action");
            }
        }
    }

    Ok(0)
}

fn announce_result(result: &MediaResult) {
    if result.is_data_url() {
        println!(
            "{} ready ({} chars of inline data). Use /save to write it.",
            result.kind.as_str(),
            result.url.len()
        );
    } else {
        println!("{} ready at {}. Use /save to write it.", result.kind.as_str(), result.url);
    }
}

fn print_models(capability: Capability, current: &str) {
    let selector = ModelSelector::new(None);
    for model in selector.registry().by_capability(capability) {
        let marker = if model.name == current { "*" } else { " " };
        println!("{marker} {}", model.name);
    }
}

/// Reply to a video-only option issued in the image studio.
fn image_surface_refusal(action: &str) -> &'static str {
    match action {
        "set_aspect_ratio" => "Images are always generated at 1:1.",
        _ => "Resolution only applies to the video studio.",
    }
}

fn report_failure(err: &MediaError) {
    tracing::debug!(error = %err, "studio action failed");
    println!("{}", err.user_message());
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use clap::Parser;

    use super::*;

    impl LineSource for RefCell<Cursor<&'static str>> {
        fn next_line(&self, buf: &mut String) -> io::Result<usize> {
            self.borrow_mut().read_line(buf)
        }
    }

    #[test]
    fn image_command_parses_prompt_and_defaults() {
        let cli = Cli::try_parse_from(["media-studio", "image", "--prompt", "a red cube"])
            .expect("image args");
        let Command::Image(args) = cli.command else {
            panic!("expected image command");
        };
        assert_eq!(args.prompt, "a red cube");
        assert_eq!(args.out, PathBuf::from("."));
        assert!(args.source.is_none());
        assert!(args.shared.events.is_none());
    }

    #[test]
    fn video_command_parses_ratio_and_resolution() {
        let cli = Cli::try_parse_from([
            "media-studio",
            "video",
            "--prompt",
            "waves at dusk",
            "--aspect-ratio",
            "9:16",
            "--resolution",
            "1080p",
            "--video-model",
            "veo-3.1-generate-preview",
        ])
        .expect("video args");
        let Command::Video(args) = cli.command else {
            panic!("expected video command");
        };
        assert_eq!(args.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(args.resolution, Resolution::FullHd);
        assert_eq!(
            args.shared.video_model.as_deref(),
            Some("veo-3.1-generate-preview")
        );
    }

    #[test]
    fn video_defaults_to_widescreen_720p() {
        let cli = Cli::try_parse_from(["media-studio", "video", "--prompt", "rain"])
            .expect("video args");
        let Command::Video(args) = cli.command else {
            panic!("expected video command");
        };
        assert_eq!(args.aspect_ratio, AspectRatio::Landscape);
        assert_eq!(args.resolution, Resolution::Hd);
    }

    #[test]
    fn unknown_aspect_ratio_is_a_parse_error() {
        let result = Cli::try_parse_from([
            "media-studio",
            "video",
            "--prompt",
            "rain",
            "--aspect-ratio",
            "2:1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn enhance_requires_a_source() {
        assert!(Cli::try_parse_from(["media-studio", "enhance"]).is_err());
        assert!(Cli::try_parse_from(["media-studio", "enhance", "--source", "in.png"]).is_ok());
    }

    #[test]
    fn prompted_key_overrides_and_blank_keeps_current() {
        let keys = PromptKeySelector::new(RefCell::new(Cursor::new("typed-key\n\n")));
        keys.open_select_key().expect("first prompt");
        assert_eq!(
            keys.current_key().map(|key| key.expose().to_string()),
            Some("typed-key".to_string())
        );
        keys.open_select_key().expect("second prompt");
        assert_eq!(
            keys.current_key().map(|key| key.expose().to_string()),
            Some("typed-key".to_string())
        );
        assert!(keys.has_selected_key());
    }

    #[test]
    fn api_key_required_maps_to_its_own_exit_code() {
        assert_eq!(
            exit_code(Err(MediaError::ApiKeyRequired)).ok(),
            Some(EXIT_API_KEY_REQUIRED)
        );
        assert_eq!(
            exit_code(Err(MediaError::VideoLinkMissing)).ok(),
            Some(EXIT_FAILURE)
        );
        assert_eq!(exit_code(Ok(PathBuf::from("studio-image.png"))).ok(), Some(0));
    }

    #[test]
    fn video_only_options_are_refused_in_the_image_studio() {
        assert_eq!(
            image_surface_refusal("set_resolution"),
            "Resolution only applies to the video studio."
        );
        assert_eq!(
            image_surface_refusal("set_aspect_ratio"),
            "Images are always generated at 1:1."
        );
    }
}
