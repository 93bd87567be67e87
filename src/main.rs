//! Purpose: `billfmt` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, reports errors on stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `to_exit_code`.
//! Invariants: Logs go to stderr so stdout stays machine-readable.
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use billfmt::core::error::{Error, ErrorKind, to_exit_code};
use billfmt::extract::{self, ErrorPolicy, ExtractConfig};
use billfmt::notice::{Notice, notice_json};
use billfmt::record::bill_schema;
use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

const DEFAULT_INPUT: &str = "../data/partition_99";
const DEFAULT_OUTPUT: &str = "../data/bills.json";

#[derive(Parser)]
#[command(
    name = "billfmt",
    version,
    about = "Convert a ^^^-delimited bill corpus into a JSON array",
    long_about = None,
    after_help = r#"EXAMPLES
  $ billfmt convert --input data/partition_99 --output data/bills.json
  $ billfmt convert --input data/partition_99 --output - --pretty
  $ billfmt convert --errors skip          # drop malformed lines, report them on stderr
  $ billfmt schema                         # Avro schema of the emitted records

INPUT LINES
  bills/old/IL/2003/HB5102/HB5102_Introduced.txt^^^Some bill text."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize human-readable stderr output"
    )]
    color: ColorMode,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Convert the corpus file into a JSON array of bill records")]
    Convert(ConvertArgs),
    #[command(about = "Print the Avro schema downstream consumers expect")]
    Schema,
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Args)]
struct ConvertArgs {
    #[arg(
        long,
        env = "BILLFMT_INPUT",
        default_value = DEFAULT_INPUT,
        help = "Corpus file to read",
        value_hint = ValueHint::FilePath
    )]
    input: PathBuf,
    #[arg(
        long,
        env = "BILLFMT_OUTPUT",
        default_value = DEFAULT_OUTPUT,
        help = "JSON file to write (`-` for stdout)",
        value_hint = ValueHint::FilePath
    )]
    output: PathBuf,
    #[arg(
        long,
        default_value = "stop",
        value_enum,
        help = "What to do with malformed lines"
    )]
    errors: ErrorPolicyCli,
    #[arg(long, help = "Indent the JSON output")]
    pretty: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, ValueEnum)]
enum ErrorPolicyCli {
    Stop,
    Skip,
}

impl From<ErrorPolicyCli> for ErrorPolicy {
    fn from(value: ErrorPolicyCli) -> Self {
        match value {
            ErrorPolicyCli::Stop => ErrorPolicy::Stop,
            ErrorPolicyCli::Skip => ErrorPolicy::Skip,
        }
    }
}

impl From<ConvertArgs> for ExtractConfig {
    fn from(args: ConvertArgs) -> Self {
        Self {
            input_path: args.input,
            output_path: args.output,
            errors: args.errors.into(),
            pretty: args.pretty,
        }
    }
}

fn main() {
    let exit_code = match run(std::env::args_os()) {
        Ok(code) => code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing(color_mode: ColorMode) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_ansi(color_mode.use_color(io::stderr().is_terminal()))
        .with_target(false)
        .try_init();
}

fn run<I>(args: I) -> Result<i32, (Error, ColorMode)>
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(exit_code);
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `billfmt --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    init_tracing(color_mode);
    dispatch(cli.command, color_mode)
        .map(|()| 0)
        .map_err(add_io_hint)
        .map_err(|err| (err, color_mode))
}

fn dispatch(command: Command, color_mode: ColorMode) -> Result<(), Error> {
    match command {
        Command::Convert(args) => {
            let config = ExtractConfig::from(args);
            let input_label = config.input_path.display().to_string();
            let outcome = extract::run(&config, |skipped| {
                let time = notice_time_now().unwrap_or_default();
                emit_notice(&Notice::skipped_line(&skipped, &input_label, time), color_mode);
            })?;
            if !config.writes_to_stdout() {
                emit_json(&json!({
                    "input": input_label,
                    "output": config.output_path.display().to_string(),
                    "records": outcome.records,
                    "skipped": outcome.skipped,
                }));
            }
            Ok(())
        }
        Command::Schema => {
            let text = serde_json::to_string_pretty(&bill_schema()).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode schema")
                    .with_source(err)
            })?;
            println!("{text}");
            Ok(())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "billfmt", &mut io::stdout());
            Ok(())
        }
    }
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::NotFound => {
            err.with_hint("Check the path, or pass --input/--output (env BILLFMT_INPUT/BILLFMT_OUTPUT).")
        }
        ErrorKind::Permission => {
            err.with_hint("Permission denied. Check file permissions or choose another --output.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn emit_json(value: &Value) {
    let json = serde_json::to_string(value)
        .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

const ANSI_RED: &str = "31";
const ANSI_YELLOW: &str = "33";

fn paint(label: &str, code: &str, enabled: bool) -> String {
    if enabled {
        format!("\u{1b}[{code}m{label}\u{1b}[0m")
    } else {
        label.to_string()
    }
}

/// Terminal stderr gets `human`; anything else gets `json` on one line.
fn emit_stderr(color_mode: ColorMode, json: Value, human: impl FnOnce(bool) -> String) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", human(color_mode.use_color(is_tty)));
    } else {
        eprintln!("{json}");
    }
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    emit_stderr(color_mode, error_json(err), |color| error_text(err, color));
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    emit_stderr(color_mode, notice_json(notice), |color| {
        format!("{} {}", paint("notice:", ANSI_YELLOW, color), notice.message)
    });
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

/// Optional context shared by the JSON and human renderings, in display order.
fn error_context(err: &Error) -> Vec<(&'static str, Value)> {
    let mut context = Vec::new();
    if let Some(hint) = err.hint() {
        context.push(("hint", json!(hint)));
    }
    if let Some(path) = err.path() {
        context.push(("path", json!(path.display().to_string())));
    }
    if let Some(line) = err.line() {
        context.push(("line", json!(line)));
    }
    let causes: Vec<String> = std::iter::successors(err.source(), |&cause| cause.source())
        .map(|cause| cause.to_string())
        .collect();
    if !causes.is_empty() {
        context.push(("causes", json!(causes)));
    }
    context
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    for (key, value) in error_context(err) {
        inner.insert(key.to_string(), value);
    }
    json!({ "error": inner })
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        paint("error:", ANSI_RED, use_color),
        error_message(err)
    )];
    for (key, value) in error_context(err) {
        let rendered = match value {
            Value::String(text) => text,
            // Only the first cause is shown to humans.
            Value::Array(items) => match items.into_iter().next() {
                Some(Value::String(text)) => text,
                _ => continue,
            },
            other => other.to_string(),
        };
        let label = match key {
            "hint" => "hint:",
            "path" => "path:",
            "line" => "line:",
            _ => "caused by:",
        };
        lines.push(format!("{} {rendered}", paint(label, ANSI_YELLOW, use_color)));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("error:").unwrap_or(line).trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}
