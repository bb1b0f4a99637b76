use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stepsync::config::{self, CONFIG_PATH, Config};
use stepsync::game::autoplay::Autoplay;
use stepsync::game::chart::{ChartDocument, DifficultyKey};
use stepsync::game::gameplay::JudgementEngine;
use stepsync::game::parsing::simfile;
use stepsync::game::replay::{DEFAULT_FRAME_SECONDS, InputTrace, Replay, drive};
use stepsync::game::stage_stats::StageSummary;

#[derive(Parser, Debug)]
#[command(name = "stepsync", version, about = "Parse .sm charts and judge play sessions offline")]
struct Cli {
    /// INI file with timing, scoring and life settings.
    #[arg(long, global = true, env = "STEPSYNC_CONFIG", default_value = CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the parsed chart document as JSON.
    Info {
        chart: PathBuf,
        /// Print only tempo range and per-difficulty note counts.
        #[arg(long)]
        summary: bool,
    },
    /// Play a difficulty perfectly and print the stage summary.
    Autoplay {
        chart: PathBuf,
        #[arg(short, long)]
        difficulty: String,
        /// Also write the generated input trace to this file.
        #[arg(long)]
        record: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_FRAME_SECONDS)]
        frame: f64,
    },
    /// Replay a recorded input trace and print the stage summary.
    Replay {
        chart: PathBuf,
        #[arg(short, long)]
        difficulty: String,
        #[arg(short, long)]
        trace: PathBuf,
        #[arg(long, default_value_t = DEFAULT_FRAME_SECONDS)]
        frame: f64,
    },
}

fn load_chart(path: &Path) -> anyhow::Result<Arc<ChartDocument>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading chart '{}'", path.display()))?;
    // Asset paths are resolved against the chart's own directory.
    let base = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let doc = simfile::parse(&raw, &base).with_context(|| format!("parsing chart '{}'", path.display()))?;
    Ok(Arc::new(doc))
}

fn build_engine(chart: Arc<ChartDocument>, difficulty: &str, cfg: &Config) -> anyhow::Result<JudgementEngine> {
    let key = DifficultyKey::from(difficulty);
    match JudgementEngine::new(chart.clone(), &key, cfg.engine_config()) {
        Some(engine) => Ok(engine),
        None => {
            let known: Vec<String> = chart.keys().map(|k| k.to_string()).collect();
            bail!("no difficulty '{}' in chart (available: {})", key, known.join(", "))
        }
    }
}

fn print_summary(engine: &JudgementEngine) -> anyhow::Result<()> {
    let summary = StageSummary::from_engine(engine);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Install logger immediately, then narrow to the configured level once it is loaded.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    log::set_max_level(log::LevelFilter::Warn);

    let cfg = config::load_or_create(&cli.config);
    log::set_max_level(cfg.log_level.as_level_filter());

    match cli.command {
        Command::Info { chart, summary } => {
            let doc = load_chart(&chart)?;
            let json = if summary {
                serde_json::to_string_pretty(&doc.overview())?
            } else {
                serde_json::to_string_pretty(doc.as_ref())?
            };
            println!("{json}");
        }
        Command::Autoplay {
            chart,
            difficulty,
            record,
            frame,
        } => {
            let mut engine = build_engine(load_chart(&chart)?, &difficulty, &cfg)?;
            let mut auto = Autoplay::for_engine(&engine);
            if let Some(path) = record {
                let json = InputTrace::from_edges(auto.script()).to_json()?;
                std::fs::write(&path, json).with_context(|| format!("writing trace '{}'", path.display()))?;
                info!("Autoplay trace written to '{}'.", path.display());
            }
            drive(&mut engine, &mut auto, frame);
            print_summary(&engine)?;
        }
        Command::Replay {
            chart,
            difficulty,
            trace,
            frame,
        } => {
            let mut engine = build_engine(load_chart(&chart)?, &difficulty, &cfg)?;
            let json = std::fs::read_to_string(&trace).with_context(|| format!("reading trace '{}'", trace.display()))?;
            let trace = InputTrace::from_json(&json).context("parsing input trace")?;
            let mut replay = Replay::new(&trace, &engine.chart().timing);
            drive(&mut engine, &mut replay, frame);
            print_summary(&engine)?;
        }
    }
    Ok(())
}
