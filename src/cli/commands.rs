use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pcsc::{Protocols, ShareMode};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use crate::core::{
    dispatcher::{CommandOutput, Dispatcher},
    error::CommandError,
    reader::PcscTransport,
    session::Session,
    transport::Transport,
    utils::{format_hex_spaced, is_blank_or_comment, split_command_line},
};

#[derive(Parser)]
#[command(name = "wallet-client")]
#[command(about = "Command-line client for the digital wallet smart card applet")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Reader name or index (use 'list' to see available readers)
    #[arg(short, long, global = true)]
    pub reader: Option<String>,

    /// Connection share mode
    #[arg(short, long, global = true, default_value = "shared")]
    pub mode: ShareModeArg,

    /// Card protocol
    #[arg(short, long, global = true, default_value = "t1")]
    pub protocol: ProtocolArg,

    /// Render results as text or JSON
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive wallet shell (default)
    Shell,

    /// List available PCSC readers
    List {
        /// Show detailed information about readers
        #[arg(short = 'l', long)]
        detailed: bool,
    },

    /// Run a single wallet command, e.g. `run credit 12.50`
    Run {
        /// Wallet command name
        command: String,

        /// Arguments of the wallet command
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Execute wallet commands from a script file
    Script {
        /// Script file path
        file: String,

        /// Continue on errors
        #[arg(short, long)]
        continue_on_error: bool,
    },
}

#[derive(Clone, Debug)]
pub enum ShareModeArg {
    Shared,
    Exclusive,
    Direct,
}

impl std::str::FromStr for ShareModeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(ShareModeArg::Shared),
            "exclusive" => Ok(ShareModeArg::Exclusive),
            "direct" => Ok(ShareModeArg::Direct),
            _ => Err(format!("Invalid share mode: {s}")),
        }
    }
}

impl From<ShareModeArg> for ShareMode {
    fn from(mode: ShareModeArg) -> Self {
        match mode {
            ShareModeArg::Shared => ShareMode::Shared,
            ShareModeArg::Exclusive => ShareMode::Exclusive,
            ShareModeArg::Direct => ShareMode::Direct,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ProtocolArg {
    T0,
    T1,
    Any,
}

impl std::str::FromStr for ProtocolArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "t0" | "t=0" => Ok(ProtocolArg::T0),
            "t1" | "t=1" => Ok(ProtocolArg::T1),
            "any" => Ok(ProtocolArg::Any),
            _ => Err(format!("Invalid protocol: {s}")),
        }
    }
}

impl From<ProtocolArg> for Protocols {
    fn from(protocol: ProtocolArg) -> Self {
        match protocol {
            ProtocolArg::T0 => Protocols::T0,
            ProtocolArg::T1 => Protocols::T1,
            ProtocolArg::Any => Protocols::ANY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug {
        log::LevelFilter::Debug
    } else if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let transport = PcscTransport::new(cli.reader, cli.mode.into(), cli.protocol.into());
    let format = cli.format;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let mut session = Session::new(transport);
            run_shell(
                &mut session,
                &mut Dispatcher::new(),
                io::stdin().lock(),
                io::stdout().lock(),
                format,
            )
        }
        Commands::List { detailed } => cmd_list(detailed, format),
        Commands::Run { command, args } => cmd_run(transport, &command, &args, format),
        Commands::Script {
            file,
            continue_on_error,
        } => cmd_script(transport, &file, continue_on_error, format),
    }
}

/// Write one command result in the chosen format
pub fn render<W: Write>(out: &mut W, output: &CommandOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{output}")?,
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(output).context("Failed to serialize result")?;
            writeln!(out, "{json}")?;
        }
    }
    Ok(())
}

/// Write a failed command in the chosen format
pub fn render_error<W: Write>(
    out: &mut W,
    error: &CommandError,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "Error: {error}")?,
        OutputFormat::Json => {
            let json = serde_json::json!({
                "type": "error",
                "value": error.to_string(),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
        }
    }
    Ok(())
}

fn write_retry_prompt<W: Write>(out: &mut W, error: &CommandError) -> io::Result<()> {
    writeln!(out, "{error}")?;
    writeln!(
        out,
        "Error connecting to Smartcard. Press Enter to retry or type 'exit' to quit."
    )
}

/// The interactive loop: connect (asking before every retry), then read
/// and dispatch commands until `exit` or end of input.
pub fn run_shell<T, R, W>(
    session: &mut Session<T>,
    dispatcher: &mut Dispatcher,
    input: R,
    mut out: W,
    format: OutputFormat,
) -> Result<()>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    writeln!(
        out,
        "Welcome to Digital Wallet Client {}",
        env!("CARGO_PKG_VERSION")
    )?;

    let mut lines = input.lines();
    let mut prompt_error = None;
    let connected = session.open_with_retry(|e| {
        if let Err(write_error) = write_retry_prompt(&mut out, e) {
            prompt_error = Some(write_error);
            return false;
        }
        match lines.next() {
            Some(Ok(line)) => line.trim() != "exit",
            _ => false,
        }
    });
    if let Some(e) = prompt_error {
        return Err(e).context("Failed to write connection prompt");
    }
    if !connected {
        return Ok(());
    }

    writeln!(
        out,
        "Please enter a command below or type 'help' for more information"
    )?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            session.close();
            break;
        };
        let line = line.context("Failed to read input")?;
        let Some((name, args)) = split_command_line(&line) else {
            continue;
        };

        match dispatcher.dispatch(session, name, &args) {
            Ok(CommandOutput::Exit) => {
                render(&mut out, &CommandOutput::Exit, format)?;
                break;
            }
            Ok(output) => render(&mut out, &output, format)?,
            Err(e) if e.is_recoverable() => render_error(&mut out, &e, format)?,
            Err(e) => {
                render_error(&mut out, &e, format)?;
                session.close();
                return Err(e).context("Lost connection to the wallet card");
            }
        }
    }

    Ok(())
}

fn cmd_list(detailed: bool, format: OutputFormat) -> Result<()> {
    let readers = PcscTransport::list_readers().context("Failed to list readers")?;

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&readers).context("Failed to serialize readers")?
        );
        return Ok(());
    }

    if readers.is_empty() {
        println!("No PCSC readers found.");
        return Ok(());
    }

    println!("Available PCSC readers:");
    for (i, reader_info) in readers.iter().enumerate() {
        if detailed {
            println!("  [{}] {}", i, reader_info.name);
            println!(
                "      Status: {}",
                if reader_info.card_present {
                    "Card present"
                } else {
                    "No card"
                }
            );
            if let Some(ref atr) = reader_info.atr {
                println!("      ATR: {}", format_hex_spaced(atr));
            }
        } else if reader_info.card_present {
            println!("  [{}] {} [CARD]", i, reader_info.name);
        } else {
            println!("  [{}] {}", i, reader_info.name);
        }
    }

    Ok(())
}

fn cmd_run<T: Transport>(
    transport: T,
    command: &str,
    args: &[String],
    format: OutputFormat,
) -> Result<()> {
    let mut session = Session::new(transport);
    session
        .open()
        .context("Failed to connect to the wallet card")?;

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = Dispatcher::new()
        .dispatch(&mut session, command, &args)
        .with_context(|| format!("Command '{command}' failed"))?;
    session.close();

    render(&mut io::stdout().lock(), &output, format)
}

fn cmd_script<T: Transport>(
    transport: T,
    file_path: &str,
    continue_on_error: bool,
    format: OutputFormat,
) -> Result<()> {
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open script file: {file_path}"))?;

    let mut session = Session::new(transport);
    session
        .open()
        .context("Failed to connect to the wallet card")?;

    println!("Executing script: {file_path}");
    println!();

    let mut out = io::stdout().lock();
    let errors = run_script(
        &mut session,
        &mut Dispatcher::new(),
        BufReader::new(file),
        &mut out,
        continue_on_error,
        format,
    )?;
    session.close();

    if errors > 0 {
        bail!("Script finished with {} failed command(s)", errors);
    }
    Ok(())
}

/// Dispatch every command line of a script, returning the number of failures.
///
/// Stops at the first failure unless `continue_on_error`; a lost card
/// channel always stops the script.
pub fn run_script<T, R, W>(
    session: &mut Session<T>,
    dispatcher: &mut Dispatcher,
    script: R,
    out: &mut W,
    continue_on_error: bool,
    format: OutputFormat,
) -> Result<usize>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    let mut errors = 0;

    for (index, line) in script.lines().enumerate() {
        let line_number = index + 1;
        let line = line.context("Failed to read line from script")?;
        if is_blank_or_comment(&line) {
            continue;
        }
        let Some((name, args)) = split_command_line(&line) else {
            continue;
        };

        if format == OutputFormat::Text {
            writeln!(out, "Line {line_number}: {}", line.trim())?;
        }
        match dispatcher.dispatch(session, name, &args) {
            Ok(CommandOutput::Exit) => break,
            Ok(output) => render(out, &output, format)?,
            Err(e) => {
                errors += 1;
                match format {
                    OutputFormat::Text => writeln!(out, "  ERROR: {e}")?,
                    OutputFormat::Json => render_error(out, &e, format)?,
                }
                if !e.is_recoverable() {
                    return Err(e).context(format!(
                        "Script execution stopped on line {line_number}"
                    ));
                }
                if !continue_on_error {
                    break;
                }
            }
        }
    }

    Ok(errors)
}
