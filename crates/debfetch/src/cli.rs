use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use debfetch::{FetchTool, Logger, PipeCommand, ScopedDownload, environment, load_environment};
use debfetch_config::{AptConfig, Settings};
use debfetch_platform::env::{FTP_PROXY, HTTP_PROXY};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "debfetch", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Settings file layered over the user config
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Append D:/I:/E: log lines here instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// More diagnostics on stderr (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "g", about = "Stream a URL or local file, optionally through a filter")]
    Get(GetArg),
    #[command(about = "Print the mirror URL of a path")]
    Url(UrlArg),
    #[command(alias = "cfg", about = "Print effective settings and proxies")]
    Config(ConfigArg),
    #[command(about = "Print shell completions")]
    Completions(CompletionsArg),
}

#[derive(Args, Clone, Debug)]
pub struct GetArg {
    /// URL, or a path starting with `/` or `.`
    source: String,

    /// Write to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Package name for the I:/E: log lines
    #[arg(long, requires = "pkg_version")]
    package: Option<String>,

    /// Package version for the I:/E: log lines
    #[arg(long = "pkg-version", id = "pkg_version", requires = "package")]
    pkg_version: Option<String>,

    /// Filter command after `--`, e.g. `-- gzip -dc`
    #[arg(last = true, value_name = "PIPE")]
    pipe: Vec<String>,
}

#[derive(Args, Clone, Debug)]
pub struct UrlArg {
    /// Path below the mirror; defaults to the distribution's Release file
    path: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArg {
    /// Also dump every APT configuration value read
    #[arg(long)]
    apt: bool,
}

#[derive(Args, Clone, Debug)]
pub struct CompletionsArg {
    shell: Shell,
}

pub fn run(app: App) -> Result<()> {
    let settings = Settings::load(app.config.as_deref()).context("failed to load settings")?;

    match app.cmd {
        Commands::Get(arg) => {
            let log = match app.log.as_ref().or(settings.log_file.as_ref()) {
                Some(path) => Logger::to_file(path)?,
                None => Logger::stderr(),
            };
            get(&settings, &log, arg)
        }
        Commands::Url(arg) => {
            let path = arg
                .path
                .unwrap_or_else(|| format!("dists/{}/Release", settings.distribution));
            println!("{}", settings.mirror_url(&path));
            Ok(())
        }
        Commands::Config(arg) => show_config(&settings, arg.apt),
        Commands::Completions(arg) => {
            generate(arg.shell, &mut App::command(), "debfetch", &mut io::stdout());
            Ok(())
        }
    }
}

fn get(settings: &Settings, log: &Logger, arg: GetArg) -> Result<()> {
    let env = load_environment().context("failed to read apt configuration")?;
    // SAFETY: the CLI is single-threaded and has not spawned anything yet.
    unsafe { env.export() };

    let mut download =
        ScopedDownload::new(arg.source.as_str()).fetcher(FetchTool::new(settings.fetcher.clone()));
    if !arg.pipe.is_empty() {
        download = download.pipe(PipeCommand::new(arg.pipe.clone()));
    }

    let result = download.run(log, |stream| -> Result<u64> {
        let copied = match &arg.output {
            Some(path) => {
                let mut file = File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                io::copy(stream, &mut file)?
            }
            None => {
                let mut stdout = io::stdout().lock();
                let copied = io::copy(stream, &mut stdout)?;
                stdout.flush()?;
                copied
            }
        };
        Ok(copied)
    });

    let package = arg.package.as_deref().zip(arg.pkg_version.as_deref());
    match (result, package) {
        (Ok(bytes), Some((name, version))) => {
            log.action(name, version, "downloaded");
            info!(bytes, "download finished");
            Ok(())
        }
        (Ok(bytes), None) => {
            info!(bytes, "download finished");
            Ok(())
        }
        (Err(e), Some((name, version))) => {
            log.error(name, version, &format!("{e:#}"));
            Err(e)
        }
        (Err(e), None) => Err(e),
    }
}

fn show_config(settings: &Settings, dump_apt: bool) -> Result<()> {
    let apt = AptConfig::load().context("failed to read apt configuration")?;
    let env = environment(&apt);
    let log_file = settings
        .log_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".into());

    let mut out = io::stdout().lock();
    writeln!(out, "mirror       = {}", settings.mirror)?;
    writeln!(out, "distribution = {}", settings.distribution)?;
    writeln!(out, "log_file     = {log_file}")?;
    writeln!(out, "fetcher      = {}", settings.fetcher.join(" "))?;
    writeln!(out, "http_proxy   = {}", env.get(HTTP_PROXY).unwrap_or_default())?;
    writeln!(out, "ftp_proxy    = {}", env.get(FTP_PROXY).unwrap_or_default())?;

    if dump_apt {
        writeln!(out)?;
        write_apt(&mut out, &apt)?;
    }
    Ok(())
}

/// `key "value";` per line, list entries as `key:: "value";`.
fn write_apt(out: &mut impl Write, apt: &AptConfig) -> io::Result<()> {
    for (key, value) in apt.iter() {
        writeln!(out, "{key} \"{value}\";")?;
    }
    for (key, entries) in apt.lists() {
        for value in entries {
            writeln!(out, "{key}:: \"{value}\";")?;
        }
    }
    Ok(())
}
