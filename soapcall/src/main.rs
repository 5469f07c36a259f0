//! soapcall - send a SOAP envelope through the soaphttp adapter
//!
//! ```text
//! soapcall call https://example.org/ws request.xml --action urn:Ping
//! soapcall call https://example.org/ws - --soap-version 1.2 --attach scan.png --dump-headers
//! soapcall secret billing password
//! soapcall profile billing
//! ```
//!
//! Client profiles (transport, redirect limit, options) are read from the
//! `clients` section of the configuration; see `soapconfig`.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use soapconfig::{Config, get_config};
use soaphttp::config_ext::DEFAULT_PROFILE;
use soaphttp::{HttpClientFactory, HttpClientKind, SoapClient, SoapClientConfigExt};
use soapkernel::{Attachment, SoapVersion};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Send SOAP requests over HTTP with pluggable transports.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory (default: $SOAPCALL_CONFIG, ./.soapcall, ~/.soapcall)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send an envelope and print the response envelope
    Call(CallArgs),

    /// Store an encrypted secret in a client profile
    Secret {
        /// Client profile
        profile: String,

        /// Field name (password, proxy_password, passphrase, ssl_keypasswd)
        field: String,

        /// Secret value; read from stdin when absent
        value: Option<String>,
    },

    /// Show the effective settings of a client profile
    Profile {
        #[arg(default_value = DEFAULT_PROFILE)]
        profile: String,
    },
}

#[derive(Args, Debug)]
struct CallArgs {
    /// Endpoint URL
    endpoint: String,

    /// Envelope file, `-` for stdin
    envelope: PathBuf,

    /// SOAP action
    #[arg(short, long, default_value = "")]
    action: String,

    /// SOAP version (1.1 or 1.2)
    #[arg(long, default_value = "1.1")]
    soap_version: SoapVersion,

    /// HTTP client (ureq or reqwest), overrides the profile
    #[arg(long)]
    client: Option<HttpClientKind>,

    /// Client profile from the configuration
    #[arg(short, long, default_value = DEFAULT_PROFILE)]
    profile: String,

    /// File sent as a MIME attachment (repeatable)
    #[arg(long = "attach", value_name = "FILE")]
    attachments: Vec<PathBuf>,

    /// Directory receiving the attachments of the response
    #[arg(long, value_name = "DIR")]
    save_attachments: Option<PathBuf>,

    /// Print request and response headers on stderr
    #[arg(long)]
    dump_headers: bool,

    /// Maximum number of 307 redirects followed, overrides the profile
    #[arg(long)]
    max_redirects: Option<u32>,

    /// Overall request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config_dir.as_deref())?;
    init_logging(&config, cli.verbose)?;

    match cli.command {
        Command::Call(args) => call(&config, args),
        Command::Secret {
            profile,
            field,
            value,
        } => {
            let value = match value {
                Some(value) => value,
                None => read_secret()?,
            };
            config.set_client_secret(&profile, &field, &value)?;
            info!(profile = %profile, field = %field, "Secret stored");
            Ok(ExitCode::SUCCESS)
        }
        Command::Profile { profile } => {
            println!("profile:       {}", profile);
            println!("transport:     {}", config.get_client_kind(&profile)?);
            println!("max redirects: {}", config.get_client_max_redirects(&profile)?);
            println!("options:       {:#?}", config.get_client_options(&profile)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(dir: Option<&Path>) -> Result<Arc<Config>> {
    match dir {
        Some(dir) => {
            let dir = dir
                .to_str()
                .with_context(|| format!("Invalid configuration directory: {}", dir.display()))?;
            Ok(Arc::new(Config::load_config(dir)?))
        }
        None => Ok(get_config()),
    }
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    if !config.get_log_enable_console()? {
        return Ok(());
    }

    let level = if verbose {
        "debug".to_string()
    } else {
        config.get_log_min_level()?.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

fn call(config: &Config, args: CallArgs) -> Result<ExitCode> {
    let envelope = read_envelope(&args.envelope)?;

    let kind = match args.client {
        Some(kind) => kind,
        None => config.get_client_kind(&args.profile)?,
    };
    let max_redirects = match args.max_redirects {
        Some(max) => max,
        None => config.get_client_max_redirects(&args.profile)?,
    };
    let options = config.get_client_options(&args.profile)?;

    let http = HttpClientFactory::new()
        .with_max_redirects(max_redirects)
        .create(kind, &options)
        .with_context(|| format!("Cannot create {} client", kind))?;

    let mut client = SoapClient::new(http, &args.endpoint, args.soap_version);
    client.set_timeout(args.timeout.map(Duration::from_secs));

    for path in &args.attachments {
        client.add_attachment(read_attachment(path)?);
    }

    info!(
        endpoint = %args.endpoint,
        client = %kind,
        version = %args.soap_version,
        "Calling SOAP endpoint"
    );
    let result = client.call(&args.action, &envelope);

    if args.dump_headers {
        eprint!("{}", client.last_request_headers());
        eprint!("{}", client.last_response_headers());
    }

    let response = result.context("SOAP call failed")?;

    io::stdout()
        .write_all(&response.content)
        .context("Cannot write response")?;
    if !response.content.ends_with(b"\n") {
        println!();
    }

    if let Some(dir) = &args.save_attachments {
        save_attachments(&mut client, dir)?;
    } else if !client.attachments().is_empty() {
        warn!(
            count = client.attachments().len(),
            "Response attachments discarded (use --save-attachments)"
        );
    }

    match client.last_status_code() {
        Some(status) if status >= 400 => {
            warn!(status, "Endpoint answered with an error status");
            Ok(ExitCode::from(2))
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn read_envelope(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut envelope = String::new();
        io::stdin()
            .read_to_string(&mut envelope)
            .context("Cannot read envelope from stdin")?;
        return Ok(envelope);
    }
    fs::read_to_string(path).with_context(|| format!("Cannot read envelope {}", path.display()))
}

fn read_secret() -> Result<String> {
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Cannot read secret from stdin")?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        bail!("Empty secret");
    }
    Ok(secret)
}

fn read_attachment(path: &Path) -> Result<Attachment> {
    let content =
        fs::read(path).with_context(|| format!("Cannot read attachment {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid attachment name: {}", path.display()))?;

    let content_type = guess_content_type(path);
    // Les types texte voyagent tels quels, le reste en base64
    let encoding = if content_type.starts_with("text/") || content_type.ends_with("xml") {
        "8bit"
    } else {
        "base64"
    };
    debug!(file = %path.display(), content_type, encoding, "Adding attachment");

    Ok(Attachment::new(name, content_type, content).transfer_encoding(encoding))
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "xml" => "application/xml",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

fn save_attachments(client: &mut SoapClient, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;

    let ids: Vec<String> = client
        .attachments()
        .iter()
        .map(|a| a.content_id.clone())
        .collect();
    for id in ids {
        let Some(attachment) = client.take_attachment(&id) else {
            continue;
        };
        let path = dir.join(file_name_for(&attachment.content_id));
        fs::write(&path, &attachment.content)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        info!(
            content_id = %attachment.content_id,
            content_type = %attachment.content_type,
            file = %path.display(),
            "Attachment saved"
        );
    }
    Ok(())
}

/// Content ids may hold `/` or `@`, keep a flat safe name
fn file_name_for(content_id: &str) -> String {
    let name: String = content_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        "attachment".to_string()
    } else {
        name
    }
}
