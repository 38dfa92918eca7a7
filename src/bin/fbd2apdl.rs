//! CLI binary for edgequake-fbd2apdl.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig`, runs one generation (or an interactive session) and
//! writes the script.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_fbd2apdl::pipeline::input::load_source;
use edgequake_fbd2apdl::{
    generate, generate_to_file, write_script, Dispatch, GeneratorConfig, ImageRequirement,
    ObserverHandle, Pipeline, PipelineObserver, RegenerationPolicy, Session, SessionEvent,
    SessionView, Stage, TriggerMode, SCRIPT_FILE_NAME,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI busy indicator using indicatif ───────────────────────────────────────

/// Terminal observer: one spinner whose message follows the current stage,
/// plus a log line per finished stage.
///
/// A bar is cleared when its run ends or a stage fails; the next stage start
/// draws a fresh one, so an interactive session gets a live spinner per run.
struct SpinnerObserver {
    bar: Mutex<ProgressBar>,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(spinner()),
        })
    }

    fn bar(&self) -> ProgressBar {
        self.bar.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Current bar, replaced by a new one if the previous run finished it.
    fn live_bar(&self) -> ProgressBar {
        let mut bar = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if bar.is_finished() {
            *bar = spinner();
        }
        bar.clone()
    }
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Working");
    bar
}

impl PipelineObserver for SpinnerObserver {
    fn on_stage_start(&self, stage: Stage) {
        let msg = match stage {
            Stage::Extracting => "Extracting text from PDF…",
            Stage::Interpreting => "Analyzing FBD image…",
            Stage::Synthesizing => "Generating APDL script…",
        };
        let bar = self.live_bar();
        bar.reset_elapsed();
        bar.set_message(msg);
        bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        self.bar().println(format!(
            "  {} {:<20} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{output_len:>6} chars")),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        let bar = self.bar();
        bar.println(format!("  {} {:<20} {}", red("✗"), stage.label(), red(&msg)));
        bar.finish_and_clear();
    }

    fn on_pipeline_complete(&self, _script_len: usize) {
        self.bar().finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Problem statement only; writes ./generated_apdl_script.inp
  fbd2apdl problem.pdf

  # With a Free Body Diagram
  fbd2apdl problem.pdf --image fbd.png -o beam.inp

  # Print the script instead of writing a file
  fbd2apdl problem.pdf --stdout

  # Structured JSON (problem text, FBD description, script, diagnostics)
  fbd2apdl problem.pdf --image fbd.jpg --json > run.json

  # Interactive session (type `help` at the prompt)
  fbd2apdl --interactive --require-image --auto

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

const INTERACTIVE_HELP: &str = "Commands:
  pdf <path|url>     upload the problem statement
  image <path|url>   upload the FBD image
  clear-image        remove the FBD image
  generate           run the pipeline
  show               redraw the current view
  save [path]        write the script (default: generated_apdl_script.inp)
  reset              start over
  quit               exit";

/// Generate ANSYS APDL scripts from PDF problem statements and FBD images.
#[derive(Parser, Debug)]
#[command(
    name = "fbd2apdl",
    version,
    about = "Generate ANSYS APDL scripts from a PDF problem statement and a Free Body Diagram",
    long_about = "Extract the problem statement from a PDF, optionally describe a Free Body \
Diagram image with a vision model, then have a language model write an ANSYS APDL script \
covering material properties, nodes and elements, boundary conditions, and loads.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Problem-statement PDF: local path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "interactive")]
    document: Option<String>,

    /// Free Body Diagram image (JPEG or PNG): local path or URL.
    #[arg(short, long, env = "FBD2APDL_IMAGE")]
    image: Option<String>,

    /// Write the script to this file.
    #[arg(short, long, env = "FBD2APDL_OUTPUT", default_value = SCRIPT_FILE_NAME)]
    output: PathBuf,

    /// Print the script to stdout instead of writing a file.
    #[arg(long, conflicts_with = "json")]
    stdout: bool,

    /// Print the full generation output as JSON instead of writing a file.
    #[arg(long, env = "FBD2APDL_JSON")]
    json: bool,

    /// LLM model ID for script synthesis.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision model ID for FBD interpretation (defaults to --model).
    #[arg(long, env = "FBD2APDL_VISION_MODEL")]
    vision_model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Sampling temperature for script synthesis (0.0–2.0, non-zero).
    #[arg(long, env = "FBD2APDL_TEMPERATURE", default_value_t = 0.5)]
    temperature: f32,

    /// Max output tokens for the script.
    #[arg(long, env = "FBD2APDL_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: usize,

    /// Max output tokens for the FBD description.
    #[arg(long, env = "FBD2APDL_VISION_MAX_TOKENS", default_value_t = 500)]
    vision_max_tokens: usize,

    /// Refuse to generate without an FBD image.
    #[arg(long, env = "FBD2APDL_REQUIRE_IMAGE")]
    require_image: bool,

    /// Keep going without the FBD description if the vision call fails.
    #[arg(long, env = "FBD2APDL_CONTINUE_WITHOUT_IMAGE")]
    continue_without_image: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "FBD2APDL_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FBD2APDL_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Interactive session reading commands from stdin.
    #[arg(long)]
    interactive: bool,

    /// Interactive: run as soon as the required uploads are present.
    #[arg(long, requires = "interactive")]
    auto: bool,

    /// Interactive: lock the session after the first successful run.
    #[arg(long, requires = "interactive")]
    lock: bool,

    /// Disable the busy spinner.
    #[arg(long, env = "FBD2APDL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FBD2APDL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FBD2APDL_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep library INFO
    // logs out of its way unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer: Option<ObserverHandle> = if show_progress {
        Some(SpinnerObserver::new() as Arc<dyn PipelineObserver>)
    } else {
        None
    };

    let config = build_config(&cli, observer)?;

    if cli.interactive {
        return run_interactive(&cli, config).await;
    }

    // ── One-shot generation ──────────────────────────────────────────────
    let document_src = cli
        .document
        .as_deref()
        .context("A problem-statement PDF is required")?;
    let image_src = cli.image.as_deref();

    let output = if cli.json || cli.stdout {
        generate(document_src, image_src, &config)
            .await
            .context("Generation failed")?
    } else {
        generate_to_file(document_src, image_src, &cli.output, &config)
            .await
            .context("Generation failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.script.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.script.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        for w in &output.warnings {
            eprintln!("{} {}", cyan("⚠"), w);
        }
        let target = if cli.stdout {
            "stdout".to_string()
        } else {
            cli.output.display().to_string()
        };
        eprintln!(
            "{}  {} remote calls  {}ms  →  {}",
            green("✔"),
            output.stats.remote_calls,
            output.stats.total_duration_ms,
            bold(&target),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(cli: &Cli, observer: Option<ObserverHandle>) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .vision_max_tokens(cli.vision_max_tokens)
        .continue_without_image(cli.continue_without_image)
        .download_timeout_secs(cli.download_timeout)
        .image_requirement(if cli.require_image {
            ImageRequirement::Required
        } else {
            ImageRequirement::Optional
        })
        .trigger(if cli.auto {
            TriggerMode::Auto
        } else {
            TriggerMode::Manual
        })
        .regeneration(if cli.lock {
            RegenerationPolicy::LockAfterSuccess
        } else {
            RegenerationPolicy::AllowRegenerate
        });

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref model) = cli.vision_model {
        builder = builder.vision_model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

// ── Interactive session ──────────────────────────────────────────────────────

/// One parsed line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Pdf(String),
    Image(String),
    ClearImage,
    Generate,
    Show,
    Save(Option<PathBuf>),
    Reset,
    Help,
    Quit,
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let line = line.trim();
    let (verb, arg) = match line.split_once(char::is_whitespace) {
        Some((v, a)) => (v, Some(a.trim()).filter(|a| !a.is_empty())),
        None => (line, None),
    };

    match (verb.to_lowercase().as_str(), arg) {
        ("pdf", Some(a)) => Ok(Command::Pdf(a.to_string())),
        ("image", Some(a)) => Ok(Command::Image(a.to_string())),
        ("pdf", None) | ("image", None) => Err(format!("usage: {verb} <path|url>")),
        ("clear-image", _) => Ok(Command::ClearImage),
        ("generate", _) | ("g", _) => Ok(Command::Generate),
        ("show", _) => Ok(Command::Show),
        ("save", a) => Ok(Command::Save(a.map(PathBuf::from))),
        ("reset", _) => Ok(Command::Reset),
        ("help", _) | ("?", _) => Ok(Command::Help),
        ("quit", _) | ("exit", _) | ("q", _) => Ok(Command::Quit),
        _ => Err(format!("unknown command '{verb}' (try `help`)")),
    }
}

async fn run_interactive(cli: &Cli, config: GeneratorConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(&config);
    let timeout = config.download_timeout_secs;
    let mut session = Session::new(pipeline);

    // Preload uploads given on the command line.
    if let Some(ref src) = cli.document {
        let upload = load_source(src, timeout).await?;
        report(session.dispatch(SessionEvent::DocumentUploaded(upload)).await);
    }
    if let Some(ref src) = cli.image {
        let upload = load_source(src, timeout).await?;
        report(session.dispatch(SessionEvent::ImageUploaded(upload)).await);
    }

    eprintln!("{}", dim(INTERACTIVE_HELP));
    render(&session.view());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", cyan("fbd2apdl>"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => {
                eprintln!("{INTERACTIVE_HELP}");
                continue;
            }
            Ok(Command::Save(path)) => {
                save(&session.view(), path.unwrap_or_else(|| cli.output.clone())).await;
                continue;
            }
            Ok(Command::Pdf(src)) => match load_source(&src, timeout).await {
                Ok(upload) => SessionEvent::DocumentUploaded(upload),
                Err(e) => {
                    eprintln!("{} {}", red("✗"), e);
                    continue;
                }
            },
            Ok(Command::Image(src)) => match load_source(&src, timeout).await {
                Ok(upload) => SessionEvent::ImageUploaded(upload),
                Err(e) => {
                    eprintln!("{} {}", red("✗"), e);
                    continue;
                }
            },
            Ok(Command::ClearImage) => SessionEvent::ImageCleared,
            Ok(Command::Generate) => SessionEvent::GenerateRequested,
            Ok(Command::Show) => SessionEvent::Rerender,
            Ok(Command::Reset) => SessionEvent::Reset,
            Err(msg) => {
                eprintln!("{} {}", red("✗"), msg);
                continue;
            }
        };

        report(session.dispatch(event).await);
        render(&session.view());
    }

    Ok(())
}

fn report(result: std::result::Result<Dispatch, edgequake_fbd2apdl::Fbd2ApdlError>) {
    match result {
        Ok(Dispatch::Ignored(reason)) => eprintln!("{} {}", cyan("⚠"), reason),
        Ok(_) => {}
        Err(e) => eprintln!("{} {}", red("✗"), e),
    }
}

fn render(view: &SessionView) {
    eprintln!(
        "{} {:?}  pdf: {}  image: {}",
        bold("state:"),
        view.state,
        view.document_name.as_deref().unwrap_or("-"),
        view.image_name.as_deref().unwrap_or("-"),
    );
    if let Some(ref banner) = view.banner {
        eprintln!("{} {}", green("✔"), banner);
    }
    if let Some(ref text) = view.extracted_text {
        eprintln!("{}\n{}", bold("Extracted Problem Description"), dim(text));
    }
    if let Some(ref script) = view.script {
        eprintln!("{}\n{}", bold("Generated APDL Script"), script);
    }
    if let Some(ref download) = view.download {
        eprintln!(
            "{} `save` writes {} ({}, {} bytes)",
            dim("download:"),
            download.file_name,
            download.mime_type,
            download.contents.len()
        );
    }
    if let Some(ref error) = view.error {
        eprintln!("{} {}", red("error:"), error);
    }
}

async fn save(view: &SessionView, path: PathBuf) {
    match view.download {
        Some(ref artifact) => match write_script(&path, artifact).await {
            Ok(()) => eprintln!("{} wrote {}", green("✔"), bold(&path.display().to_string())),
            Err(e) => eprintln!("{} {}", red("✗"), e),
        },
        None => eprintln!("{} nothing to save yet; run `generate` first", cyan("⚠")),
    }
}
