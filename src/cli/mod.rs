//! Command-line front end for running trials from a terminal.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, warn};

use crate::{
    db::Database,
    ground_truth::GeneratorConfig,
    models::{
        parse_flag, LeakGroundTruth, MarkerColor, MarkerId, SessionStatus, SubmissionDraft,
        TrialKey,
    },
    session::{ExperimentSession, SessionController},
    settings::SettingsStore,
    storage::CsvStore,
    tracking::{JsonLinesSource, TrackingEnd},
};

const DB_FILE_NAME: &str = "pipecheck.sqlite3";

#[derive(Parser, Debug)]
#[command(name = "pipecheck")]
#[command(about = "Ground truth, visibility tracking and scoring for pipe inspection trials")]
#[command(version)]
pub struct Cli {
    /// Settings file holding generator defaults and the data directory.
    #[arg(
        long,
        global = true,
        env = "PIPECHECK_SETTINGS",
        default_value = "pipecheck-settings.json"
    )]
    settings: PathBuf,

    /// Overrides the data directory from the settings file.
    #[arg(long, global = true, env = "PIPECHECK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Draw a new color assignment and register the session.
    Generate(GenerateArgs),

    /// Record whether the trial's pipe actually leaked.
    SetLeak {
        #[arg(long)]
        session: String,
        #[arg(long)]
        trial: String,
        /// 1 if a leak was present, 0 otherwise.
        #[arg(long, action = ArgAction::Set, value_parser = flag_arg)]
        leak: bool,
    },

    /// Replay a JSON-lines detection feed through the visibility tracker.
    Track {
        /// Attach to an existing session instead of generating a new one.
        #[arg(long)]
        session: Option<String>,
        #[command(flatten)]
        generate: GenerateArgs,
        /// Recorded detector output, one frame per line.
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
    },

    /// Score an operator report and append it to the response log.
    Score(ScoreArgs),

    /// Print the stored visibility intervals for a session as JSON.
    Intervals {
        #[arg(long)]
        session: String,
    },
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    #[arg(long, default_value = "T1")]
    trial: String,
    /// Number of markers in the universe.
    #[arg(long)]
    universe: Option<u32>,
    #[arg(long)]
    max_alarm: Option<u32>,
    #[arg(long)]
    p_alarm: Option<f64>,
    /// Fixes the random draw.
    #[arg(long)]
    seed: Option<u64>,
    /// Store the resulting generator parameters as the new defaults.
    #[arg(long)]
    save: bool,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    #[arg(long)]
    session: String,
    /// Defaults to the trial the session ran.
    #[arg(long, default_value = "")]
    trial: String,
    #[arg(long, default_value = "")]
    participant: String,
    #[arg(long, action = ArgAction::Set, value_parser = flag_arg)]
    leak: Option<bool>,
    #[arg(long, action = ArgAction::Set, value_parser = flag_arg)]
    crack: Option<bool>,
    /// Declared colors, e.g. `0=green,1=red,2=green`.
    #[arg(long, value_parser = marker_colors_arg, default_value = "")]
    markers: BTreeMap<MarkerId, MarkerColor>,
    /// Free-text crack location.
    #[arg(long, default_value = "")]
    location: String,
}

fn flag_arg(value: &str) -> Result<bool, String> {
    parse_flag(value).map_err(|err| err.to_string())
}

fn marker_colors_arg(value: &str) -> Result<BTreeMap<MarkerId, MarkerColor>, String> {
    parse_marker_colors(value).map_err(|err| format!("{err:#}"))
}

/// Parses `id=color` pairs separated by commas. Later pairs override
/// earlier ones for the same id.
pub fn parse_marker_colors(value: &str) -> Result<BTreeMap<MarkerId, MarkerColor>> {
    let mut colors = BTreeMap::new();
    for pair in value.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (id, color) = pair
            .split_once('=')
            .with_context(|| format!("expected id=color, found '{pair}'"))?;
        let id: MarkerId = id
            .trim()
            .parse()
            .with_context(|| format!("invalid marker id '{}'", id.trim()))?;
        colors.insert(id, color.parse::<MarkerColor>()?);
    }
    Ok(colors)
}

impl GenerateArgs {
    fn apply(&self, mut config: GeneratorConfig) -> GeneratorConfig {
        if let Some(universe) = self.universe {
            config.universe_size = universe;
        }
        if let Some(max_alarm) = self.max_alarm {
            config.max_alarm = max_alarm;
        }
        if let Some(p_alarm) = self.p_alarm {
            config.p_alarm = p_alarm;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let settings = SettingsStore::new(cli.settings.clone())?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| settings.current().data_dir);

    let store = CsvStore::new(&data_dir)?;
    let database = Database::new(data_dir.join(DB_FILE_NAME))?;
    let controller = SessionController::new(database, store);

    // Sessions left running by a killed process are finalized first.
    let recovered = controller.recover_interrupted().await?;
    if recovered > 0 {
        info!("Marked {recovered} stale session(s) as Interrupted");
    }

    match cli.command {
        Commands::Generate(args) => {
            let session = generate(&controller, &settings, &args).await?;
            controller
                .end_session(&session.id, SessionStatus::Completed)
                .await?;
            print_json(&session)
        }
        Commands::SetLeak {
            session,
            trial,
            leak,
        } => controller.record_leak(
            &TrialKey::new(session, trial),
            LeakGroundTruth { leak_present: leak },
        ),
        Commands::Track {
            session,
            generate: args,
            input,
        } => track(&controller, &settings, session, &args, input).await,
        Commands::Score(args) => {
            let draft = SubmissionDraft {
                participant_id: args.participant,
                trial_id: args.trial,
                leak_present: args.leak,
                crack_present: args.crack,
                marker_colors: args.markers,
                crack_location: args.location,
            };
            let entry = controller.submit(&args.session, draft).await?;
            print_json(&entry)
        }
        Commands::Intervals { session } => {
            let intervals = controller.db().get_intervals_for_session(&session).await?;
            print_json(&intervals)
        }
    }
}

async fn generate(
    controller: &SessionController<CsvStore>,
    settings: &SettingsStore,
    args: &GenerateArgs,
) -> Result<ExperimentSession> {
    let config = args.apply(settings.generator());
    if args.save {
        settings.update_generator(config.clone())?;
    }
    controller.start_session(&args.trial, &config).await
}

async fn track(
    controller: &SessionController<CsvStore>,
    settings: &SettingsStore,
    session_id: Option<String>,
    args: &GenerateArgs,
    input: PathBuf,
) -> Result<()> {
    let (session, owned) = match session_id {
        Some(id) => (controller.load_session(&id).await?, false),
        None => (generate(controller, settings, args).await?, true),
    };

    let source = JsonLinesSource::open(&input)?;
    let cancel_token = controller.start_tracking(&session, source).await?;

    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping tracking");
            cancel_token.cancel();
        }
    });
    let report = controller.wait_tracking().await;
    watcher.abort();
    let report = report?;

    if owned {
        let status = match report.ended_by {
            TrackingEnd::Cancelled => SessionStatus::Cancelled,
            _ => SessionStatus::Completed,
        };
        controller.end_session(&session.id, status).await?;
    }
    if let TrackingEnd::SourceFailed(reason) = &report.ended_by {
        warn!("Detection feed stopped early: {reason}");
    }

    print_json(&report)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_marker_colors() {
        let colors = parse_marker_colors("0=green, 1=RED,2=green,").unwrap();
        assert_eq!(colors.len(), 3);
        assert_eq!(colors[&1], MarkerColor::Alarm);
        assert!(parse_marker_colors("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_marker_colors() {
        assert!(parse_marker_colors("0:green").is_err());
        assert!(parse_marker_colors("x=green").is_err());
        assert!(parse_marker_colors("0=blue").is_err());
    }

    #[test]
    fn score_flags_stay_unset_when_omitted() {
        let cli = Cli::try_parse_from([
            "pipecheck",
            "score",
            "--session",
            "abc",
            "--trial",
            "T1",
            "--crack",
            "1",
            "--markers",
            "0=red",
        ])
        .unwrap();
        match cli.command {
            Commands::Score(args) => {
                assert_eq!(args.leak, None);
                assert_eq!(args.crack, Some(true));
                assert_eq!(args.markers.len(), 1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn generate_overrides_settings() {
        let cli = Cli::try_parse_from([
            "pipecheck",
            "generate",
            "--universe",
            "20",
            "--seed",
            "4",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let config = args.apply(GeneratorConfig::default());
        assert_eq!(config.universe_size, 20);
        assert_eq!(config.seed, Some(4));
        assert_eq!(config.max_alarm, GeneratorConfig::default().max_alarm);
    }

    #[test]
    fn leak_flag_must_be_binary() {
        assert!(Cli::try_parse_from([
            "pipecheck", "set-leak", "--session", "s", "--trial", "T1", "--leak", "yes",
        ])
        .is_err());
    }
}
