//! ask: command-line front end for the question-answering service.
//! Reads config, sends the query (argument or stdin), prints the answer to
//! stdout. Ctrl-C cancels a running request.

use ask_client::config::{self, Config};
use ask_client::{AskSession, ImageUpload, QueryClient, QueryError};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const EXIT_FAILURE: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(name = "ask")]
#[command(about = "Ask the question-answering service a question", long_about = None)]
#[command(version)]
struct Cli {
    /// Question to ask (read from stdin when omitted)
    #[arg(trailing_var_arg = true, num_args = 0..)]
    query: Vec<String>,

    /// Config file (default: ~/.ask-client/config.yaml)
    #[arg(long, env = "ASK_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Service base URL, overrides the config file
    #[arg(long, env = "ASK_BASE_URL")]
    base_url: Option<String>,

    /// Image to attach; sends the question to /ask-image
    #[arg(long)]
    image: Option<PathBuf>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(EXIT_FAILURE);
}

fn load_config(cli: &Cli) -> Config {
    let mut cfg = match &cli.config {
        Some(path) => config::load(path).unwrap_or_else(|e| {
            fail(format_args!("failed to load config from {}: {}", path.display(), e))
        }),
        None => match config::default_config_path() {
            Some(path) => config::load_or_default(&path).unwrap_or_else(|e| {
                fail(format_args!("failed to load config from {}: {}", path.display(), e))
            }),
            None => Config::default(),
        },
    };
    if let Some(url) = &cli.base_url {
        cfg.server.base_url = Some(url.clone());
    }
    cfg
}

fn read_query(cli: &Cli) -> String {
    if !cli.query.is_empty() {
        return cli.query.join(" ");
    }
    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        fail(format_args!("failed to read stdin: {}", e));
    }
    line.trim().to_string()
}

fn read_image(path: &Path) -> ImageUpload {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| fail(format_args!("failed to read {}: {}", path.display(), e)));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let upload = ImageUpload::new(file_name.clone(), bytes);
    match ImageUpload::guess_mime_type(&file_name) {
        Some(mime) => upload.with_mime_type(mime),
        None => upload,
    }
}

fn main() {
    let filter = if std::env::var("ASK_DEBUG").is_ok() {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli);
    let query = read_query(&cli);
    let image = cli.image.as_deref().map(read_image);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap_or_else(|e| fail(format_args!("failed to create runtime: {}", e)));

    let client = QueryClient::from_config(&cfg, rt.handle().clone()).unwrap_or_else(|e| fail(e));
    let mut session = AskSession::new(client);

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    let submitted = match image {
        Some(image) => session.ask_with_image(&query, image),
        None => session.ask(&query),
    };
    if submitted.is_err() {
        eprintln!("Error: {}", session.display());
        process::exit(EXIT_FAILURE);
    }

    // This thread owns the session; completions are applied here.
    session.wait_or_cancel(&interrupted, Duration::from_millis(100));

    match session.last_outcome() {
        Some(Ok(answer)) => println!("{}", answer),
        Some(Err(QueryError::Cancelled)) => {
            eprintln!("{}", session.display());
            process::exit(EXIT_CANCELLED);
        }
        Some(Err(_)) => {
            eprintln!("Error: {}", session.display());
            process::exit(EXIT_FAILURE);
        }
        None => fail("request ended without a result"),
    }
}
