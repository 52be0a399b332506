//! hermod: command-line HTTP client
//!
//! Issues one request through the full hermod pipeline and prints the
//! response payload.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hermod::{ApiClient, ApiResponse, ClientConfig, RequestConfig, ResponseBody};

/// Hermod CLI client
#[derive(Parser)]
#[command(name = "hermod")]
#[command(version)]
#[command(about = "HTTP client with caching, rate limiting and retries")]
struct Args {
    /// Config file (default: ~/.hermod/config.toml, then /etc/hermod/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL for relative request paths
    #[arg(short, long, env = "HERMOD_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GET a resource
    Get(Target),
    /// POST a JSON body
    Post(Target),
    /// PUT a JSON body
    Put(Target),
    /// PATCH a JSON body
    Patch(Target),
    /// DELETE a resource
    Delete(Target),
}

#[derive(clap::Args)]
struct Target {
    /// Absolute URL or path relative to the base URL
    url: String,

    /// JSON request body (or pipe it via stdin)
    #[arg(short, long)]
    data: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => ClientConfig::load(Some(path))?,
        None => ClientConfig::load(None).unwrap_or_default(),
    };
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    let client = ApiClient::new(config)?;

    let (request, target) = match args.command {
        Command::Get(t) => (RequestConfig::get(t.url.clone()), t),
        Command::Post(t) => (RequestConfig::post(t.url.clone()), t),
        Command::Put(t) => (RequestConfig::put(t.url.clone()), t),
        Command::Patch(t) => (RequestConfig::patch(t.url.clone()), t),
        Command::Delete(t) => (RequestConfig::delete(t.url.clone()), t),
    };

    let mut request = request.params(target.params);
    if let Some(body) = resolve_data(target.data)? {
        let value: serde_json::Value = serde_json::from_str(&body)?;
        request = request.json(&value)?;
    }

    match client.request(request).await {
        Ok(response) => {
            print_response(&response)?;
            Ok(())
        }
        Err(err) => {
            eprintln!(
                "error: {}{}",
                err.message,
                err.status.map(|s| format!(" (status {s})")).unwrap_or_default()
            );
            if let Some(body) = err.body().filter(|b| !b.is_empty()) {
                eprintln!("{}", render_body(body)?);
            }
            std::process::exit(1);
        }
    }
}

/// Request body from `--data` or piped stdin; `--data` wins when both exist.
fn resolve_data(arg: Option<String>) -> Result<Option<String>, Box<dyn std::error::Error>> {
    if arg.is_some() {
        return Ok(arg);
    }
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    let trimmed = buf.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

fn print_response(response: &ApiResponse) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!(
        "{} {}{}",
        response.status,
        response.status_text,
        if response.metadata.from_cache {
            " (cached)"
        } else {
            ""
        }
    );
    if !response.data.is_empty() {
        println!("{}", render_body(&response.data)?);
    }
    Ok(())
}

fn render_body(body: &ResponseBody) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match body {
        ResponseBody::Json(value) => serde_json::to_string_pretty(value)?,
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Binary(bytes) => format!("<{} bytes of binary data>", bytes.len()),
        ResponseBody::Empty => String::new(),
    })
}
