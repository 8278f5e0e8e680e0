mod render;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::{ArgAction, Parser as ClapParser, Subcommand};
use owo_colors::OwoColorize;
use tracing::{debug, Level};

use avro_grammar::grammar;
use avro_parser::{ParseConfig, Parser, Tree};
use avro_scanner::{tokenize_with_mode, Mode, ScannerConfig};
use avro_syntax::TokenKind;

use render::{render_error, render_failure};

#[derive(ClapParser, Debug)]
#[command(name = "avro-cst", version, about = "Print concrete syntax trees for Avro IDL and JSON schemas")]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace); AVRO_LOG sets the level otherwise
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ParseOpts {
    /// Force the input syntax instead of inferring it (json, idl or auto)
    #[arg(long = "mode")]
    mode: Option<Mode>,

    /// JSON file with parse limits
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Deepest nesting accepted
    #[arg(long = "max-depth")]
    max_depth: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a file and print its tree as an s-expression
    Parse {
        file: PathBuf,

        /// Print the tree and diagnostics as JSON
        #[arg(long = "json", default_value_t = false)]
        json: bool,

        #[command(flatten)]
        opts: ParseOpts,
    },
    /// Print the tokens of a file
    Tokens {
        file: PathBuf,

        #[arg(long = "json", default_value_t = false)]
        json: bool,

        #[arg(long = "mode")]
        mode: Option<Mode>,
    },
    /// Parse files and report diagnostics only
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        opts: ParseOpts,
    },
    /// Validate the grammar and print it as JSON
    Grammar,
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => std::env::var("AVRO_LOG")
            .ok()
            .and_then(|v| Level::from_str(v.trim()).ok())
            .unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_tracing(verbose: u8) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

fn read_source(path: &Path) -> Result<String, String> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()));
    }
    fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

/// Defaults, then the config file, then the environment, then flags. A file
/// extension picks the mode when nothing else did.
fn parse_config(opts: &ParseOpts, path: &Path) -> Result<ParseConfig, String> {
    let mut config = match &opts.config {
        Some(file) => ParseConfig::from_json_str(&read_source(file)?).map_err(|e| e.to_string())?,
        None => ParseConfig::default(),
    };
    config = config.with_env().map_err(|e| e.to_string())?;
    if let Some(mode) = opts.mode {
        config.mode = (mode != Mode::Unknown).then_some(mode);
    }
    if let Some(depth) = opts.max_depth {
        config.max_nesting_depth = depth;
    }
    if config.mode.is_none() {
        config.mode = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Mode::from_extension);
    }
    config.validate().map_err(|e| e.to_string())?;
    debug!(?config, "parse configuration");
    Ok(config)
}

/// Parses one file, rendering any diagnostics. `None` means the parse could
/// not produce a tree.
fn parse_file(path: &Path, opts: &ParseOpts) -> Option<Tree> {
    let display = path.display().to_string();
    let (src, config) = match read_source(path).and_then(|src| Ok((src, parse_config(opts, path)?))) {
        Ok(v) => v,
        Err(msg) => {
            render_failure(&msg);
            return None;
        }
    };
    match Parser::new(config).parse(&src) {
        Ok(tree) => {
            for diagnostic in &tree.diagnostics {
                render_error(&display, &src, diagnostic);
            }
            Some(tree)
        }
        Err(e) => {
            render_error(&display, &src, &e);
            None
        }
    }
}

fn run_parse(file: &Path, json: bool, opts: &ParseOpts) -> ExitCode {
    let Some(tree) = parse_file(file, opts) else {
        return ExitCode::FAILURE;
    };
    if json {
        match serde_json::to_string_pretty(&tree.to_json()) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                render_failure(&e.to_string());
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", tree.to_sexp());
    }
    if tree.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_tokens(file: &Path, json: bool, mode: Option<Mode>) -> ExitCode {
    let src = match read_source(file) {
        Ok(src) => src,
        Err(msg) => {
            render_failure(&msg);
            return ExitCode::FAILURE;
        }
    };
    let mode = mode
        .or_else(|| file.extension().and_then(|e| e.to_str()).and_then(Mode::from_extension))
        .unwrap_or(Mode::Unknown);
    let tokens = tokenize_with_mode(&src, ScannerConfig::default(), mode);

    if json {
        match serde_json::to_string_pretty(&tokens) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                render_failure(&e.to_string());
                return ExitCode::FAILURE;
            }
        }
    } else {
        for scanned in &tokens {
            let t = scanned.token;
            println!(
                "{:>4}:{:<3} {:<18} {:?}",
                t.start.row + 1,
                t.start.column + 1,
                t.kind.describe(),
                t.text(&src)
            );
        }
    }

    let mut failed = false;
    for scanned in &tokens {
        if let TokenKind::Error(kind) = scanned.token.kind {
            let t = scanned.token;
            let (point, byte) = if kind.ends_at_failure() { (t.end, t.end_byte) } else { (t.start, t.start_byte) };
            render_error(
                &file.display().to_string(),
                &src,
                &avro_syntax::Error::lexical(kind.to_string(), point, byte),
            );
            failed = true;
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_check(files: &[PathBuf], opts: &ParseOpts) -> ExitCode {
    let mut bad = 0usize;
    for file in files {
        match parse_file(file, opts) {
            Some(tree) if !tree.has_errors() => {
                println!("{} {}", "ok".green().bold(), file.display());
            }
            Some(tree) => {
                bad += 1;
                println!(
                    "{} {} ({} diagnostics)",
                    "FAIL".red().bold(),
                    file.display(),
                    tree.diagnostics.len()
                );
            }
            None => {
                bad += 1;
                println!("{} {}", "FAIL".red().bold(), file.display());
            }
        }
    }
    println!("\nChecked {} file(s), {} with problems", files.len(), bad);
    if bad == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_grammar() -> ExitCode {
    let g = grammar();
    if let Err(errors) = g.validate() {
        for e in &errors {
            render_failure(&e.to_string());
        }
        return ExitCode::FAILURE;
    }
    match serde_json::to_string_pretty(&g.to_json()) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            render_failure(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Parse { file, json, opts } => run_parse(file, *json, opts),
        Command::Tokens { file, json, mode } => run_tokens(file, *json, *mode),
        Command::Check { files, opts } => run_check(files, opts),
        Command::Grammar => run_grammar(),
    }
}
