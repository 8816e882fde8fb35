use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use http::header::ORIGIN;
use http::HeaderValue;
use tracing_subscriber::EnvFilter;
use url::Url;

use intercept_loader::generations;
use intercept_loader::network::DirectoryNetwork;
use intercept_loader::storage::FsCacheStorage;
use intercept_loader::{CacheStorage, Interceptor, InterceptorConfig, Request, WorkerContext};

const USAGE: &str = "usage: intercept-loader [--config <file>] --state-dir <dir> --scope <url> [--root <dir>] <command>

commands:
  keys                         list cache generations
  version                      resolve the version and sweep stale generations
  sweep                        sweep generations not whitelisted for the current version
  kv <key>                     print a value from the key-value store
  fetch <url> [--cross-origin] run one request through the interceptor";

#[derive(Debug)]
enum Command {
    Keys,
    Version,
    Sweep,
    Kv(String),
    Fetch { url: String, cross_origin: bool },
}

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    state_dir: PathBuf,
    scope: Url,
    root: PathBuf,
    command: Command,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("[intercept-loader] {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(execute(args))
}

async fn execute(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => InterceptorConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => InterceptorConfig::default(),
    };

    let storage = Arc::new(FsCacheStorage::new(&args.state_dir));
    let network = Arc::new(DirectoryNetwork::new(&args.scope, &args.root));
    let ctx = WorkerContext::builder(config, args.scope.clone(), network, storage.clone())
        .build()
        .context("invalid worker configuration")?;
    let interceptor = Interceptor::new(ctx);

    let mut stdout = io::stdout().lock();
    match args.command {
        Command::Keys => {
            for name in storage.keys().await? {
                writeln!(stdout, "{name}")?;
            }
        }
        Command::Version => {
            let check = interceptor.resolve_version().await?;
            writeln!(stdout, "version: {}", check.version)?;
            if let Some(previous) = &check.previous {
                writeln!(stdout, "previous: {previous}")?;
            }
            for name in &check.deleted {
                writeln!(stdout, "deleted: {name}")?;
            }
        }
        Command::Sweep => {
            let version = interceptor.check_version().await?;
            for name in generations::sweep(interceptor.context(), &version).await {
                writeln!(stdout, "deleted: {name}")?;
            }
        }
        Command::Kv(key) => match interceptor.context().kv().read(&key).await {
            Some(value) => writeln!(stdout, "{value}")?,
            None => bail!("no value stored under '{key}'"),
        },
        Command::Fetch { url, cross_origin } => {
            let url = args
                .scope
                .join(&url)
                .with_context(|| format!("invalid request URL '{url}'"))?;
            let mut request = Request::get(url);
            if cross_origin {
                let origin = HeaderValue::from_str(&args.scope.origin().ascii_serialization())?;
                request = request.with_header(ORIGIN, origin);
            }
            let response = interceptor.handle(request).await?;
            eprintln!(
                "[intercept-loader] {} {}",
                response.status,
                response.content_type().unwrap_or("-")
            );
            stdout.write_all(&response.body)?;
        }
    }
    stdout.flush()?;
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut config = None;
    let mut state_dir = None;
    let mut scope = None;
    let mut root = PathBuf::from(".");
    let mut positional = Vec::new();
    let mut cross_origin = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(flag_value(&mut args, "--config")?)),
            "--state-dir" => state_dir = Some(PathBuf::from(flag_value(&mut args, "--state-dir")?)),
            "--root" => root = PathBuf::from(flag_value(&mut args, "--root")?),
            "--scope" => {
                let value = flag_value(&mut args, "--scope")?;
                scope = Some(Url::parse(&value).with_context(|| format!("invalid --scope '{value}'"))?);
            }
            "--cross-origin" => cross_origin = true,
            "-h" | "--help" => bail!("{USAGE}"),
            flag if flag.starts_with("--") => bail!("unknown flag '{flag}'\n{USAGE}"),
            _ => positional.push(arg),
        }
    }

    let state_dir = state_dir.with_context(|| format!("missing --state-dir\n{USAGE}"))?;
    let scope = scope.with_context(|| format!("missing --scope\n{USAGE}"))?;

    let mut positional = positional.into_iter();
    let command = match (positional.next().as_deref(), positional.next()) {
        (Some("keys"), None) => Command::Keys,
        (Some("version"), None) => Command::Version,
        (Some("sweep"), None) => Command::Sweep,
        (Some("kv"), Some(key)) => Command::Kv(key),
        (Some("fetch"), Some(url)) => Command::Fetch { url, cross_origin },
        (Some(other), _) => bail!("unexpected command '{other}'\n{USAGE}"),
        (None, _) => bail!("missing command\n{USAGE}"),
    };
    if let Some(extra) = positional.next() {
        bail!("unexpected argument '{extra}'");
    }

    Ok(Args {
        config,
        state_dir,
        scope,
        root,
        command,
    })
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .with_context(|| format!("{flag} requires a value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Args> {
        parse_args(line.split_whitespace().map(String::from))
    }

    #[test]
    fn parses_fetch_with_cross_origin() {
        let args = parse("--state-dir /tmp/s --scope https://app.test/ fetch a.css --cross-origin")
            .unwrap();
        assert_eq!(args.root, PathBuf::from("."));
        assert!(matches!(
            args.command,
            Command::Fetch { ref url, cross_origin: true } if url == "a.css"
        ));
    }

    #[test]
    fn parses_kv() {
        let args = parse("kv rootUrl --scope https://app.test/ --state-dir s").unwrap();
        assert!(matches!(args.command, Command::Kv(ref key) if key == "rootUrl"));
    }

    #[test]
    fn rejects_missing_scope() {
        assert!(parse("--state-dir s keys").is_err());
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(parse("--state-dir s --scope https://app.test/ build").is_err());
    }
}
