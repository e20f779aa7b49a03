//! CLI binary for edgequake-docclass.
//!
//! A thin shim over the library crate: maps CLI flags to `ClassifierConfig`,
//! loads the model once, and either classifies local files, serves HTTP,
//! prints the label table or validates the artifacts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_docclass::server::{self, AppState, DEFAULT_BODY_LIMIT};
use edgequake_docclass::{
    classify_upload, ClassifierConfig, DocumentLabel, ExtractOptions, ModelState,
    RequestWorkspace, UploadResponse, UploadedDocument,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::Subscriber;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Classify a local document
  docclass classify contrato.pdf

  # JSON output, exactly as POST /upload answers
  docclass classify --json planilha.xlsx

  # Serve the HTTP API (POST /upload, GET /labels, GET /health)
  docclass serve --bind 0.0.0.0:8000

  # Validate model + tokenizer artifacts and exit
  docclass check --model-path models/bigbird_trained.onnx

SUPPORTED FORMATS:
  .png .jpg .jpeg   OCR via tesseract (language: --ocr-language, default por)
  .pdf              text layer via pdfium
  .docx .xlsx .txt  read directly
  anything else     classified as "text not extracted"

ENVIRONMENT VARIABLES:
  DOCCLASS_MODEL_PATH     ONNX model file
  DOCCLASS_TOKENIZER_DIR  Directory with tokenizer.json (and config.json)
  DOCCLASS_WORKSPACE_DIR  Scratch directory for staged uploads
  DOCCLASS_BIND           Listen address for `serve`
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Overrides the log filter
"#;

/// Classify business documents with a fine-tuned transformer.
#[derive(Parser, Debug)]
#[command(
    name = "docclass",
    version,
    about = "Classify business documents (PDF, DOCX, XLSX, images, text) into document types",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// ONNX model file.
    #[arg(long, global = true, env = "DOCCLASS_MODEL_PATH",
          default_value = "models/bigbird_trained.onnx")]
    model_path: PathBuf,

    /// Directory containing tokenizer.json.
    #[arg(long, global = true, env = "DOCCLASS_TOKENIZER_DIR",
          default_value = "models/bigbird_trained")]
    tokenizer_dir: PathBuf,

    /// Token sequence length fed to the model.
    #[arg(long, global = true, env = "DOCCLASS_MAX_LEN", default_value_t = 704)]
    max_len: usize,

    /// Scratch directory for staged uploads.
    #[arg(long, global = true, env = "DOCCLASS_WORKSPACE_DIR", default_value = "process")]
    workspace_dir: PathBuf,

    /// ONNX Runtime intra-op threads.
    #[arg(long, global = true, env = "DOCCLASS_INTRA_THREADS", default_value_t = 1)]
    intra_threads: usize,

    /// OCR executable used for images.
    #[arg(long, global = true, env = "DOCCLASS_TESSERACT", default_value = "tesseract")]
    tesseract_cmd: String,

    /// Tesseract language pack.
    #[arg(long, global = true, env = "DOCCLASS_OCR_LANGUAGE", default_value = "por")]
    ocr_language: String,

    /// Directory containing the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "DOCCLASS_LOG_JSON")]
    log_json: bool,

    /// Also append logs to this file.
    #[arg(long, global = true, env = "DOCCLASS_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCCLASS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCCLASS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a local file, staged exactly like an upload.
    Classify {
        /// Document to classify.
        file: PathBuf,

        /// Print the JSON response instead of a summary line.
        #[arg(long)]
        json: bool,

        /// Disable the progress spinner.
        #[arg(long)]
        no_progress: bool,
    },
    /// Load the model once and serve the HTTP API.
    Serve {
        /// Listen address.
        #[arg(long, env = "DOCCLASS_BIND", default_value = "0.0.0.0:8000")]
        bind: String,

        /// Maximum upload body size in MiB.
        #[arg(long, env = "DOCCLASS_BODY_LIMIT_MB", default_value_t = DEFAULT_BODY_LIMIT / (1024 * 1024))]
        body_limit_mb: usize,
    },
    /// Print the label table in model output order.
    Labels {
        #[arg(long)]
        json: bool,
    },
    /// Load and validate the model artifacts, then exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let progress_active = matches!(
        &cli.command,
        Command::Classify { json: false, no_progress: false, .. }
    ) && !cli.quiet;
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet || progress_active {
        "error"
    } else {
        "info"
    };
    init_tracing(&cli, level)?;

    match &cli.command {
        Command::Labels { json } => print_labels(*json),
        Command::Check => {
            let config = build_config(&cli)?;
            let start = Instant::now();
            let model = load_model(&config)?;
            if !cli.quiet {
                eprintln!(
                    "{} artifacts OK  {}",
                    green("✔"),
                    dim(&format!("{model:?} in {}ms", start.elapsed().as_millis()))
                );
            }
            Ok(())
        }
        Command::Serve {
            bind,
            body_limit_mb,
        } => {
            let config = build_config(&cli)?;
            let model = load_model(&config)?;
            let workspace = RequestWorkspace::open(&config.workspace_dir)
                .context("Failed to open workspace")?;
            let state = AppState::new(model, workspace, config.extract_options());
            let router = server::create_router(state, body_limit_mb * 1024 * 1024);
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            server::serve(listener, router).await.context("Server error")
        }
        Command::Classify {
            file,
            json,
            ..
        } => {
            let spinner = progress_active.then(spinner);
            let config = build_config(&cli)?;
            let model = load_model(&config)?;
            let workspace = RequestWorkspace::open(&config.workspace_dir)
                .context("Failed to open workspace")?;

            if let Some(ref bar) = spinner {
                bar.set_prefix("Classifying");
                bar.set_message(file.display().to_string());
            }
            let start = Instant::now();
            let response = classify_path(file, &workspace, &model, &config.extract_options()).await;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }

            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&response).context("Failed to serialise output")?
                );
            } else {
                println!("{}", format_row(&response));
                if !cli.quiet {
                    eprintln!("   {}", dim(&format!("{}ms", start.elapsed().as_millis())));
                }
            }
            Ok(())
        }
    }
}

/// Install the process-wide subscriber: stderr (text or JSON) plus an
/// optional plain-text log file.
fn init_tracing(cli: &Cli, level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_file = match &cli.log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?,
        ),
        None => None,
    };
    build_subscriber(env_filter, cli.log_json, log_file).init();
    Ok(())
}

/// Stderr layer (text or JSON) plus an optional plain-text file layer.
fn build_subscriber(
    env_filter: EnvFilter,
    json: bool,
    log_file: Option<File>,
) -> impl Subscriber + Send + Sync {
    let stderr_layer: Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync> = if json {
        fmt::layer().json().with_writer(io::stderr).boxed()
    } else {
        fmt::layer().with_writer(io::stderr).boxed()
    };
    let file_layer = log_file.map(|f| fmt::layer().with_ansi(false).with_writer(Mutex::new(f)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
}

/// Map CLI args to `ClassifierConfig`.
fn build_config(cli: &Cli) -> Result<ClassifierConfig> {
    let mut builder = ClassifierConfig::builder()
        .model_path(&cli.model_path)
        .tokenizer_dir(&cli.tokenizer_dir)
        .max_len(cli.max_len)
        .workspace_dir(&cli.workspace_dir)
        .intra_threads(cli.intra_threads)
        .tesseract_cmd(&cli.tesseract_cmd)
        .ocr_language(&cli.ocr_language);
    if let Some(ref dir) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir);
    }
    builder.build().context("Invalid configuration")
}

/// Load the model; any failure here aborts the process.
fn load_model(config: &ClassifierConfig) -> Result<ModelState> {
    tokio::task::block_in_place(|| ModelState::load(config)).context("Failed to load model")
}

async fn classify_path(
    path: &Path,
    workspace: &RequestWorkspace,
    model: &ModelState,
    options: &ExtractOptions,
) -> UploadResponse {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            classify_upload(UploadedDocument::new(filename, bytes), workspace, model, options)
                .await
        }
        Err(e) => UploadResponse::failed(filename, format!("cannot read file: {e}")),
    }
}

fn format_row(response: &UploadResponse) -> String {
    match response {
        UploadResponse::Classified {
            filename,
            classification_label,
            confidence_percentage,
        } => format!(
            "  {} {:<40} {:<30} {}",
            green("✓"),
            filename,
            bold(classification_label.as_str()),
            dim(confidence_percentage)
        ),
        UploadResponse::NotExtracted {
            filename,
            classification,
        } => format!("  {} {:<40} {}", yellow("–"), filename, dim(classification)),
        UploadResponse::Failed {
            filename,
            classification,
        } => format!("  {} {:<40} {}", red("✗"), filename, red(classification)),
    }
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed_precise}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Loading");
    bar.set_message("model…");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn print_labels(json: bool) -> Result<()> {
    if json {
        let labels: Vec<_> = DocumentLabel::ALL
            .iter()
            .map(|l| serde_json::json!({ "index": l.index(), "label": l, "display_name": l.display_name() }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&labels).context("Failed to serialise labels")?
        );
    } else {
        for label in DocumentLabel::ALL {
            println!("{:>2}  {:<32} {}", label.index(), label.as_str(), dim(&label.display_name()));
        }
    }
    Ok(())
}
