use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser};
use serde::Serialize;
use tracing::{info, warn, Level};

use avro_parser::{ParseConfig, Parser as AvroParser, Tree};
use avro_scanner::{tokenize_with_mode, Mode, ScannerConfig};
use avro_syntax::InputEdit;

#[derive(Parser, Debug)]
#[command(name = "avro-bench", about = "Time full parses against incremental reparses")]
struct Cli {
    /// Specific schema(s) to run (by file stem). If omitted, runs all discovered schemas.
    #[arg(short = 't', long = "test", action = ArgAction::Append)]
    tests: Vec<String>,

    /// Iterations per schema (measured)
    #[arg(short = 'n', long = "iterations", default_value_t = 50)]
    iterations: u32,

    /// Warmup iterations (not measured)
    #[arg(short = 'w', long = "warmup", default_value_t = 5)]
    warmup: u32,

    /// Output JSON file path; default: benchmark/results/<timestamp>.json
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Also time the files under fixtures/
    #[arg(long = "include-fixtures", default_value_t = false)]
    include_fixtures: bool,

    /// List discovered schemas and exit
    #[arg(long = "list", default_value_t = false)]
    list: bool,

    /// Log progress to stderr
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct BenchResult {
    name: String,
    mode: Mode,
    bytes: usize,
    tokens: usize,
    iterations: u32,
    avg_tokenize_ms: f64,
    avg_parse_ms: f64,
    min_parse_ms: f64,
    max_parse_ms: f64,
    avg_reparse_ms: f64,
    min_reparse_ms: f64,
    max_reparse_ms: f64,
    reused_tokens: usize,
    diagnostics: usize,
}

#[derive(Debug, Serialize)]
struct OutputDoc {
    timestamp: String,
    avro_syntax_version: String,
    benchmarks: Vec<BenchResult>,
}

#[derive(Debug, Clone)]
struct SchemaCase {
    name: String,
    path: PathBuf,
    mode: Mode,
}

#[derive(Debug, Default)]
struct Timings {
    tokenize: Vec<f64>,
    parse: Vec<f64>,
    reparse: Vec<f64>,
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or(manifest_dir)
}

fn discover_schemas(include_fixtures: bool) -> Vec<SchemaCase> {
    let root = workspace_root();
    let mut out = Vec::new();

    let mut candidates = vec![root.join("benchmark/schemas")];
    if include_fixtures {
        candidates.push(root.join("fixtures"));
    }

    for dir in candidates {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for e in entries.flatten() {
            let p = e.path();
            let Some(mode) = p.extension().and_then(|s| s.to_str()).and_then(Mode::from_extension) else {
                continue;
            };
            let name = p.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string();
            out.push(SchemaCase { name, path: p, mode });
        }
    }

    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// One space inserted before the first newline past the middle of `src`.
/// Strings and line comments never contain a newline, so the edit changes no
/// token's meaning.
fn middle_edit(src: &str) -> (InputEdit, String) {
    let mid = src.len() / 2;
    let at = src.as_bytes()[mid..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|i| mid + i)
        .or_else(|| src.rfind('\n'))
        .unwrap_or(src.len());
    let edit = InputEdit::replace(src, at, at, " ");
    let edited = edit.apply(src, " ");
    (edit, edited)
}

fn dur_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn stats(vals: &[f64]) -> (f64, f64, f64) {
    let min = vals.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = if vals.is_empty() { 0.0 } else { vals.iter().sum::<f64>() / (vals.len() as f64) };
    (avg, min, max)
}

fn measure(case: &SchemaCase, src: &str, iterations: u32, warmup: u32) -> Result<(Timings, Tree), String> {
    let config = ParseConfig {
        mode: Some(case.mode),
        ..ParseConfig::default()
    };
    let parser = AvroParser::new(config);
    let scanner_config = ScannerConfig::new(parser.config().max_nesting_depth);
    let (edit, edited) = middle_edit(src);

    let base = parser.parse(src).map_err(|e| e.to_string())?;
    for _ in 0..warmup {
        let tree = parser.parse(src).map_err(|e| e.to_string())?;
        parser.reparse(&tree, &edit, &edited).map_err(|e| e.to_string())?;
    }

    let mut timings = Timings::default();
    let mut last = None;
    for _ in 0..iterations {
        let t = Instant::now();
        let tokens = tokenize_with_mode(src, scanner_config, case.mode);
        timings.tokenize.push(dur_ms(t.elapsed()));
        drop(tokens);

        let t = Instant::now();
        let tree = parser.parse(src).map_err(|e| e.to_string())?;
        timings.parse.push(dur_ms(t.elapsed()));
        drop(tree);

        let t = Instant::now();
        let tree = parser.reparse(&base, &edit, &edited).map_err(|e| e.to_string())?;
        timings.reparse.push(dur_ms(t.elapsed()));
        last = Some(tree);
    }

    let reparsed = match last {
        Some(tree) => tree,
        None => parser.reparse(&base, &edit, &edited).map_err(|e| e.to_string())?,
    };
    let full = parser.parse(&edited).map_err(|e| e.to_string())?;
    if full.root != reparsed.root {
        warn!(schema = %case.name, "reparse disagrees with a full parse of the edited text");
    }
    Ok((timings, reparsed))
}

fn write_results(path: &Path, doc: &OutputDoc) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    let json = serde_json::to_string_pretty(doc).map_err(|e| e.to_string())?;
    fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::INFO } else { Level::WARN })
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();

    let mut schemas = discover_schemas(cli.include_fixtures);

    if cli.list {
        println!("Discovered schemas:");
        for s in &schemas {
            println!("- {} ({})", s.name, s.path.display());
        }
        return ExitCode::SUCCESS;
    }

    if !cli.tests.is_empty() {
        let wanted: std::collections::HashSet<_> = cli.tests.iter().map(|s| s.to_lowercase()).collect();
        schemas.retain(|s| wanted.contains(&s.name.to_lowercase()));
        if schemas.is_empty() {
            eprintln!("No matching schemas. Use --list to see available.");
            return ExitCode::from(2);
        }
    }

    if schemas.is_empty() {
        eprintln!("No .avdl or .avsc files found in benchmark/schemas.");
        return ExitCode::from(2);
    }

    let mut results = Vec::new();
    for case in &schemas {
        let src = match fs::read_to_string(&case.path) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("Failed to read {}: {}", case.path.display(), e);
                return ExitCode::FAILURE;
            }
        };
        info!(schema = %case.name, bytes = src.len(), "measuring");
        let (timings, tree) = match measure(case, &src, cli.iterations, cli.warmup) {
            Ok(v) => v,
            Err(msg) => {
                eprintln!("{}: {}", case.name, msg);
                return ExitCode::FAILURE;
            }
        };
        let (avg_l, _, _) = stats(&timings.tokenize);
        let (avg_p, min_p, max_p) = stats(&timings.parse);
        let (avg_r, min_r, max_r) = stats(&timings.reparse);

        println!(
            "{:>12}: parse avg={:.3}ms min={:.3}ms max={:.3}ms | reparse avg={:.3}ms | tokenize={:.3}ms | reused {}/{} tokens",
            case.name,
            avg_p,
            min_p,
            max_p,
            avg_r,
            avg_l,
            tree.reused_tokens,
            tree.tokens.len()
        );

        results.push(BenchResult {
            name: case.name.clone(),
            mode: tree.mode,
            bytes: src.len(),
            tokens: tree.tokens.len(),
            iterations: cli.iterations,
            avg_tokenize_ms: avg_l,
            avg_parse_ms: avg_p,
            min_parse_ms: min_p,
            max_parse_ms: max_p,
            avg_reparse_ms: avg_r,
            min_reparse_ms: min_r,
            max_reparse_ms: max_r,
            reused_tokens: tree.reused_tokens,
            diagnostics: tree.diagnostics.len(),
        });
    }

    let out_path = match cli.output.clone() {
        Some(p) => p,
        None => {
            let ts_file = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%SZ").to_string();
            workspace_root().join("benchmark/results").join(format!("{}.json", ts_file))
        }
    };

    let doc = OutputDoc {
        timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        avro_syntax_version: env!("CARGO_PKG_VERSION").to_string(),
        benchmarks: results,
    };
    if let Err(msg) = write_results(&out_path, &doc) {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    println!("\nSaved results to {}", out_path.display());
    ExitCode::SUCCESS
}
