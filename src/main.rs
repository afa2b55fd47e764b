/*!
 * Riptide CLI - Command Line Interface
 *
 * Runs tidal-dl-ng downloads on a remote host over SSH and manages the
 * remote settings document. One invocation is one connection.
 */

use clap::Parser;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use dialoguer::Password;
use secrecy::SecretString;
use std::path::PathBuf;

use riptide::{
    config::{self, ConnectionSpec},
    error::{Result, RiptideError, EXIT_SUCCESS},
    logging,
    orchestrator::{self, ExecutionResult, Outcome, Request},
    remote_config::SETTINGS_PATH,
    command::DEFAULT_REMOTE_BIN,
};

#[derive(Parser)]
#[command(name = "riptide")]
#[command(
    version,
    about = "Run tidal-dl-ng downloads on a remote host over SSH",
    long_about = None
)]
struct Cli {
    /// Remote host name or address
    #[arg(value_name = "SERVER")]
    server: String,

    /// Tidal URL or bare numeric track id
    #[arg(value_name = "INPUT")]
    input: Option<String>,

    /// Remote username (default: local username)
    #[arg(short = 'u', long = "username", value_name = "USER")]
    username: Option<String>,

    /// SSH port
    #[arg(short = 'p', long = "port", default_value = "22")]
    port: u16,

    /// Private key file ('~' expands to the local home directory)
    #[arg(short = 'k', long = "key", value_name = "FILE")]
    key: Option<PathBuf>,

    /// Passphrase for the private key
    #[arg(long = "key-passphrase", value_name = "PHRASE", requires = "key")]
    key_passphrase: Option<String>,

    /// Password for password authentication
    #[arg(short = 'w', long = "password", value_name = "PASS")]
    password: Option<String>,

    /// Prompt for the password instead of taking it as an argument
    #[arg(long = "ask-password", conflicts_with = "password")]
    ask_password: bool,

    /// Set a remote tidal-dl-ng option (KEY=VALUE, repeatable)
    #[arg(
        short = 'c',
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value
    )]
    set: Vec<(String, String)>,

    /// Print the remote tidal-dl-ng settings
    #[arg(long = "show-config")]
    show_config: bool,

    /// Show what would run without touching the remote host's state
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Remote downloader binary
    #[arg(long = "remote-bin", default_value = DEFAULT_REMOTE_BIN, value_name = "BIN")]
    remote_bin: String,

    /// Connection timeout in seconds
    #[arg(long = "timeout", default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Write logs as JSON Lines to a file instead of stderr
    #[arg(long = "log-file", value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!(
            "expected KEY=VALUE with a non-empty key, got '{}'",
            raw
        )),
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    if cli.input.is_none() && cli.set.is_empty() && !cli.show_config {
        return Err(RiptideError::InvalidInput(
            "nothing to do: give a URL/id, or use --set / --show-config".to_string(),
        ));
    }

    let request = build_request(cli)?;
    let outcome = orchestrator::execute(&request)?;
    Ok(report(&request, &outcome))
}

fn build_request(cli: Cli) -> Result<Request> {
    let username = cli.username.unwrap_or_else(config::local_username);

    let mut connection = ConnectionSpec::new(&cli.server)
        .with_port(cli.port)
        .with_username(username)
        .with_timeout(std::time::Duration::from_secs(cli.timeout));

    if let Some(key) = cli.key {
        connection = connection.with_key_path(key);
    }
    if let Some(phrase) = cli.key_passphrase {
        connection = connection.with_key_passphrase(SecretString::from(phrase));
    }
    if let Some(password) = cli.password {
        connection = connection.with_password(SecretString::from(password));
    } else if cli.ask_password {
        let password = Password::new()
            .with_prompt(format!("Password for {}", connection.endpoint()))
            .interact()
            .map_err(|e| RiptideError::InvalidInput(format!("password prompt failed: {}", e)))?;
        connection = connection.with_password(SecretString::from(password));
    }

    let mut request = Request::new(connection);
    request.content_input = cli.input;
    for (key, value) in cli.set {
        request.patch.set(key, value);
    }
    request.show_config = cli.show_config;
    request.dry_run = cli.dry_run;
    request.remote_bin = cli.remote_bin;
    Ok(request)
}

/// Print the outcome and map it to a process exit code. A download that
/// ran remotely passes its exit code through unchanged.
fn report(request: &Request, outcome: &Outcome) -> i32 {
    if !outcome.applied.is_empty() {
        let verb = if request.dry_run { "would set" } else { "set" };
        for (key, value) in &outcome.applied {
            println!("{} {} = {}", verb, key, value);
        }
    }

    if let Some(config) = &outcome.config {
        println!("{} ({} options)", SETTINGS_PATH, config.len());
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Option", "Value"]);
        for (key, value) in config.iter() {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            table.add_row(vec![key.clone(), rendered]);
        }
        println!("{}", table);
    }

    match &outcome.execution {
        Some(ExecutionResult::DryRun { command_line }) => {
            println!("would run: {}", command_line);
            EXIT_SUCCESS
        }
        Some(ExecutionResult::Completed {
            exit_code,
            stdout,
            stderr,
            ..
        }) => {
            if !stdout.is_empty() {
                print!("{}", stdout);
            }
            if !stderr.is_empty() {
                eprint!("{}", stderr);
            }
            *exit_code
        }
        None => EXIT_SUCCESS,
    }
}
