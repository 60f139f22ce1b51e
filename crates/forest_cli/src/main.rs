use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use forest_core::classify::ClassificationTable;
use forest_core::core_api::{Engine, SaveKind, Session};
use forest_core::envelope::NestedDecoder;
use forest_core::patch::BatchReport;
use forest_render::{
    JsonStyle, TextRenderOptions, render_batch_text, render_buildings_text, render_json_batch,
    render_json_buildings, render_json_heal, render_json_substitution, render_json_summary,
    render_substitution_text, render_summary_text,
};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Resume,
    Client,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON file with `player` and `world` type-name lists.
    #[arg(long, global = true, value_name = "FILE")]
    classification: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct InputArgs {
    #[arg(value_name = "SAVE")]
    path: PathBuf,
    #[arg(long, value_enum)]
    kind: Option<KindArg>,
}

#[derive(Debug, Args)]
struct OutputArgs {
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,
    /// Copy an existing file at the output path to `<PATH>.bak` first.
    #[arg(long)]
    backup: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarize envelope, header and blob layout.
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        json: bool,
    },
    /// List building hit-point fields.
    Buildings {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    SetHp {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        index: usize,
        #[arg(long)]
        hp: f32,
        #[command(flatten)]
        output: OutputArgs,
    },
    SetAllHp {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        hp: f32,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Set every building to its likely maximum hit points.
    HealAll {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Raise buildings below a threshold.
    Repair {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        threshold: f32,
        /// Defaults to the highest current value.
        #[arg(long)]
        hp: Option<f32>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Replace the target's player blobs with the source's.
    Swap {
        #[command(flatten)]
        target: InputArgs,
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        #[arg(long, value_enum)]
        source_kind: Option<KindArg>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Write the player blobs as a standalone client save.
    ExtractPlayer {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Write the file with every nested base64 layer expanded.
    Decode {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let classification = cli
        .classification
        .as_deref()
        .map(load_classification)
        .unwrap_or_default();
    let engine = Engine::new().with_classification(classification);

    match cli.command {
        Command::Analyze { input, json } => {
            let session = open_session(&engine, &input);
            if json {
                print_json(&render_json_summary(&session, JsonStyle::CanonicalV1));
            } else {
                print!(
                    "{}",
                    render_summary_text(
                        &session,
                        TextRenderOptions {
                            verbose: cli.verbose
                        }
                    )
                );
            }
        }
        Command::Buildings { input, json, limit } => {
            let session = open_session(&engine, &input);
            if json {
                print_json(&render_json_buildings(session.buildings(), limit));
            } else {
                print!("{}", render_buildings_text(session.buildings(), limit));
            }
        }
        Command::SetHp {
            input,
            index,
            hp,
            output,
        } => {
            let mut session = open_session(&engine, &input);
            session.set_building_hp(index, hp).unwrap_or_else(|e| {
                eprintln!("Error applying hp edit: {e}");
                process::exit(1);
            });
            let report = BatchReport {
                modified: 1,
                ..BatchReport::default()
            };
            write_output(&output, &session.to_bytes_modified());
            report_batch(&output, "set-hp", &report, Some(hp));
        }
        Command::SetAllHp { input, hp, output } => {
            let mut session = open_session(&engine, &input);
            let report = session.set_all_building_hp(hp).unwrap_or_else(|e| {
                eprintln!("Error applying hp edit: {e}");
                process::exit(1);
            });
            write_edited(&output, &session);
            report_batch(&output, "set-all-hp", &report, Some(hp));
        }
        Command::HealAll { input, output } => {
            let mut session = open_session(&engine, &input);
            let outcome = session.heal_all_buildings();
            write_edited(&output, &session);
            if output.json {
                print_json(&render_json_heal(&outcome));
            } else {
                print!(
                    "{}",
                    render_batch_text("heal-all", &outcome.report, Some(outcome.target_hp))
                );
                println!("Wrote edited save to {}", output.output.display());
            }
        }
        Command::Repair {
            input,
            threshold,
            hp,
            output,
        } => {
            let mut session = open_session(&engine, &input);
            let report = session.repair_buildings(threshold, hp).unwrap_or_else(|e| {
                eprintln!("Error applying repair: {e}");
                process::exit(1);
            });
            write_edited(&output, &session);
            report_batch(&output, "repair", &report, hp);
        }
        Command::Swap {
            target,
            source,
            source_kind,
            output,
        } => {
            let mut session = open_session(&engine, &target);
            let source_session = open_session(
                &engine,
                &InputArgs {
                    path: source,
                    kind: source_kind,
                },
            );
            let report = session.substitute_player_blobs(&source_session);
            write_output(&output, &session.to_bytes_modified());
            if output.json {
                print_json(&render_json_substitution(&report));
            } else {
                print!("{}", render_substitution_text(&report));
                println!("Wrote edited save to {}", output.output.display());
            }
        }
        Command::ExtractPlayer { input, output } => {
            let session = open_session(&engine, &input);
            let bytes = session.extract_player_blobs().unwrap_or_else(|e| {
                eprintln!("Error extracting player blobs: {e}");
                process::exit(1);
            });
            write_output(&output, &bytes);
            if output.json {
                let mut m = serde_json::Map::new();
                m.insert("bytes".to_string(), JsonValue::from(bytes.len()));
                print_json(&JsonValue::Object(m));
            } else {
                println!(
                    "Wrote {} byte client save to {}",
                    bytes.len(),
                    output.output.display()
                );
            }
        }
        Command::Decode { path, output } => {
            let bytes = read_file(&path);
            let decoded = NestedDecoder::default().decode(&bytes);
            fs::write(&output, &decoded).unwrap_or_else(|e| {
                eprintln!("Error writing {}: {e}", output.display());
                process::exit(1);
            });
            println!(
                "Decoded {} bytes to {} bytes in {}",
                bytes.len(),
                decoded.len(),
                output.display()
            );
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_classification(path: &Path) -> ClassificationTable {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing classification table {}: {e}", path.display());
        process::exit(1);
    })
}

fn read_file(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    })
}

fn open_session(engine: &Engine, input: &InputArgs) -> Session {
    let bytes = read_file(&input.path);
    engine
        .open_bytes(bytes, input.kind.map(to_core_kind))
        .unwrap_or_else(|e| {
            eprintln!("Error parsing save file: {}", input.path.display());
            eprintln!("  {}", e);
            process::exit(1);
        })
}

fn write_edited(output: &OutputArgs, session: &Session) {
    if !session.is_modified() {
        tracing::warn!("no fields changed, writing an unmodified copy");
    }
    write_output(output, &session.to_bytes_modified());
}

fn write_output(output: &OutputArgs, bytes: &[u8]) {
    let path = &output.output;
    if output.backup && path.exists() {
        let mut backup = path.clone().into_os_string();
        backup.push(".bak");
        fs::copy(path, &backup).unwrap_or_else(|e| {
            eprintln!("Error backing up {}: {e}", path.display());
            process::exit(1);
        });
        tracing::info!(backup = %PathBuf::from(&backup).display(), "backup written");
    }
    fs::write(path, bytes).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", path.display());
        process::exit(1);
    });
}

fn report_batch(output: &OutputArgs, operation: &str, report: &BatchReport, hp: Option<f32>) {
    if output.json {
        print_json(&render_json_batch(operation, report, hp));
    } else {
        print!("{}", render_batch_text(operation, report, hp));
        println!("Wrote edited save to {}", output.output.display());
    }
}

fn print_json(value: &JsonValue) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    println!("{rendered}");
}

fn to_core_kind(kind: KindArg) -> SaveKind {
    match kind {
        KindArg::Resume => SaveKind::Resume,
        KindArg::Client => SaveKind::Client,
    }
}
