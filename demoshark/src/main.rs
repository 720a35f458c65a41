mod config;

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Utc};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use serde::Serialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use demo_stats::analyzer::decoder::EventDumpBuilder;
use demo_stats::analyzer::killfeed::KillFeedBuilder;
use demo_stats::analyzer::match_controller::{MatchInfo, parse_match};
use demo_stats::analyzer::survey::{SurveyBuilder, SurveyStats};
use demo_stats::analyzer::drive;
use demo_stats::stats::{MatchSummary, PlayerRecord, PlayerResult, aggregate, publish};
use demo_stats::types::MatchId;
use demo_stats::{DemoFile, DemoSource};

use config::StatsConfig;

/// One JSON document per demo.
#[derive(Serialize)]
struct MatchReport {
    #[serde(rename = "match")]
    summary: MatchSummary,
    players: Vec<PlayerRecord>,
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<StatsConfig> {
    let path = match matches.value_of("CONFIG") {
        Some(path) => Some(PathBuf::from(path)),
        None => StatsConfig::default_path(),
    };
    match path {
        Some(path) => StatsConfig::load(&path)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(StatsConfig::default()),
    }
}

fn init_logging(config: &StatsConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Expands directories into the `.jsonl` feeds below them.
fn collect_demos<'a>(inputs: impl Iterator<Item = &'a str>) -> Vec<PathBuf> {
    let mut demos = Vec::new();
    for input in inputs {
        let path = Path::new(input);
        if !path.is_dir() {
            demos.push(path.to_path_buf());
            continue;
        }
        let mut found: Vec<PathBuf> = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        found.sort();
        demos.extend(found);
    }
    demos
}

fn match_time(path: &Path, time: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match time {
        Some(time) => Ok(DateTime::parse_from_rfc3339(time)
            .with_context(|| format!("invalid --time {time:?}"))?
            .with_timezone(&Utc)),
        None => {
            let modified = std::fs::metadata(path)?.modified()?;
            Ok(DateTime::<Utc>::from(modified))
        }
    }
}

fn match_id(path: &Path, id: Option<&str>) -> MatchId {
    match id {
        Some(id) => MatchId::from(id),
        None => MatchId::from(
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ),
    }
}

fn build_records(
    results: Vec<PlayerResult>,
    config: &StatsConfig,
) -> anyhow::Result<Vec<PlayerRecord>> {
    let results = if config.skip_invalid_results {
        results
    } else {
        let mut published: Vec<PlayerResult> = Vec::new();
        publish(results, &mut published)?;
        published
    };

    let mut records = Vec::with_capacity(results.len());
    for result in results {
        let steam_id = result.steam_id;
        let mut record = match PlayerRecord::new(steam_id) {
            Ok(record) => record,
            Err(e) => {
                warn!("dropping result for player {steam_id}: {e}");
                continue;
            }
        };
        if let Err(e) = record.add_result(result) {
            warn!("dropping result for player {steam_id}: {e}");
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

fn stats_for_demo(
    path: &Path,
    config: &StatsConfig,
    matches: &ArgMatches,
) -> anyhow::Result<MatchReport> {
    let info = MatchInfo {
        id: match_id(path, matches.value_of("MATCH_ID")),
        time: match_time(path, matches.value_of("TIME"))?,
    };
    let demo = DemoFile::from_file(path)?;
    let data = parse_match(demo, info, &config.parse_options())?;
    let players = build_records(aggregate(&data), config)?;
    Ok(MatchReport {
        summary: MatchSummary::from(&data),
        players,
    })
}

fn run_stats(matches: &ArgMatches, mut config: StatsConfig) -> anyhow::Result<()> {
    config.apply_cli_overrides(matches)?;
    let demos = collect_demos(matches.values_of("INPUT").into_iter().flatten());
    if demos.is_empty() {
        bail!("no demo feeds found");
    }
    if demos.len() > 1 && matches.is_present("MATCH_ID") {
        bail!("--match-id can only be used with a single demo");
    }

    let mut failed = 0;
    for path in &demos {
        match stats_for_demo(path, &config, matches) {
            Ok(report) => {
                let json = if config.pretty {
                    serde_json::to_string_pretty(&report)?
                } else {
                    serde_json::to_string(&report)?
                };
                println!("{}", json);
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {:#}", path.display(), e);
            }
        }
    }

    info!("processed {} demos, {} failed", demos.len(), failed);
    if failed > 0 {
        bail!("{} of {} demos failed", failed, demos.len());
    }
    Ok(())
}

fn run_dump(matches: &ArgMatches) -> anyhow::Result<()> {
    let input = matches
        .value_of("DEMO")
        .ok_or_else(|| anyhow!("no demo given"))?;
    let mut demo = DemoFile::from_file(Path::new(input))?;
    let header = demo.parse_header()?;
    let mut dump = EventDumpBuilder::new(matches.is_present("NO_META"), matches.value_of("OUTPUT"))
        .build(&header)?;
    drive(&mut demo, dump.as_mut())?;
    Ok(())
}

fn run_killfeed(matches: &ArgMatches) -> anyhow::Result<()> {
    let input = matches
        .value_of("DEMO")
        .ok_or_else(|| anyhow!("no demo given"))?;
    let mut demo = DemoFile::from_file(Path::new(input))?;
    let header = demo.parse_header()?;
    let mut feed = KillFeedBuilder::new().build(&header);
    drive(&mut demo, feed.as_mut())?;
    Ok(())
}

fn survey_file(path: &Path) -> anyhow::Result<SurveyStats> {
    let stats = Rc::new(RefCell::new(SurveyStats::new()));
    let mut demo = DemoFile::from_file(path)?;
    let header = demo.parse_header()?;
    let mut survey = SurveyBuilder::new(stats.clone()).build(&header);
    drive(&mut demo, survey.as_mut())?;
    drop(survey);
    Rc::try_unwrap(stats)
        .map(RefCell::into_inner)
        .map_err(|_| anyhow!("survey stats still shared"))
}

fn run_survey(matches: &ArgMatches) -> anyhow::Result<()> {
    let demos = collect_demos(matches.values_of("INPUT").into_iter().flatten());
    let mut total_events = 0;
    let mut failed = 0;
    for path in &demos {
        match survey_file(path) {
            Ok(stats) => {
                println!(
                    "{}: {} - {} events, {} participants, {} warnings",
                    path.display(),
                    stats.map_name,
                    stats.total_events,
                    stats.max_participants,
                    stats.warnings.len()
                );
                for (kind, count) in &stats.events_by_kind {
                    println!("    {:<20} {}", kind, count);
                }
                for warning in &stats.warnings {
                    println!("    warning {}", warning);
                }
                total_events += stats.total_events;
            }
            Err(e) => {
                failed += 1;
                println!("{}: FAILED {:#}", path.display(), e);
            }
        }
    }
    println!(
        "{} demos, {} events, {} failed",
        demos.len(),
        total_events,
        failed
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let inputs = Arg::with_name("INPUT")
        .help("Demo feeds (.jsonl) or directories containing them")
        .required(true)
        .multiple(true)
        .index(1);
    let demo = Arg::with_name("DEMO")
        .help("The demo feed to process")
        .required(true)
        .index(1);

    let matches = App::new("demoshark")
        .about("Reconstructs CS match statistics from recorded demo feeds")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("CONFIG")
                .help("Path to a demoshark.toml config file")
                .long("config")
                .takes_value(true)
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("stats")
                .about("Prints per-player match results as JSON, one document per demo")
                .arg(
                    Arg::with_name("MATCH_ID")
                        .help("Match ID to record (defaults to the file name)")
                        .long("match-id")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("TIME")
                        .help("Match time in RFC 3339 (defaults to the file's modification time)")
                        .long("time")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("PRETTY")
                        .help("Pretty-print the JSON output")
                        .long("pretty"),
                )
                .arg(
                    Arg::with_name("HALFTIME_PHASE")
                        .help("Game phase that marks halftime")
                        .long("halftime-phase")
                        .takes_value(true)
                        .possible_values(&["GameHalfEnded", "TeamSideSwitch"]),
                )
                .arg(
                    Arg::with_name("TRACE_EVENTS")
                        .help("Trace every reconstruction step")
                        .long("trace-events"),
                )
                .arg(
                    Arg::with_name("SKIP_INVALID")
                        .help("Drop invalid player results instead of failing the demo")
                        .long("skip-invalid"),
                )
                .arg(inputs.clone()),
        )
        .subcommand(
            SubCommand::with_name("dump")
                .about("Dumps decoded events as JSON lines")
                .arg(
                    Arg::with_name("OUTPUT")
                        .help("Output file to write to (defaults to stdout)")
                        .short("o")
                        .long("output")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("NO_META")
                        .help("Don't output the demo header")
                        .long("no-meta"),
                )
                .arg(demo.clone()),
        )
        .subcommand(
            SubCommand::with_name("survey")
                .about("Counts events in many demos and reports decoder warnings")
                .arg(inputs),
        )
        .subcommand(
            SubCommand::with_name("killfeed")
                .about("Prints the kill feed of a demo")
                .arg(demo),
        )
        .subcommand(SubCommand::with_name("config").about("Prints a commented default config file"))
        .get_matches();

    if matches.subcommand_matches("config").is_some() {
        print!("{}", StatsConfig::generate_default_toml());
        return Ok(());
    }

    let (name, sub_matches) = matches.subcommand();
    let sub_matches = sub_matches.ok_or_else(|| anyhow!("no subcommand given"))?;
    let config = load_config(sub_matches)?;
    init_logging(&config);

    match name {
        "stats" => run_stats(sub_matches, config),
        "dump" => run_dump(sub_matches),
        "survey" => run_survey(sub_matches),
        "killfeed" => run_killfeed(sub_matches),
        _ => bail!("unknown subcommand {name}"),
    }
}
