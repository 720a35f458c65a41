use demo_stats::analyzer::decoder::GamePhase;
use demo_stats::analyzer::match_controller::ParseOptions;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "demoshark.toml";

/// Stats run configuration, loadable from a TOML file.
///
/// All fields default to their standard values. CLI flags override config file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// `tracing` filter directives, overridden by `RUST_LOG`
    pub log_filter: String,
    pub halftime_phase: GamePhase,
    pub trace_events: bool,
    pub pretty: bool,
    /// Drop results that fail validation instead of failing the demo
    pub skip_invalid_results: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            halftime_phase: GamePhase::GameHalfEnded,
            trace_events: false,
            pretty: false,
            skip_invalid_results: false,
        }
    }
}

impl StatsConfig {
    /// Load config from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<Self, rootcause::Report> {
        use rootcause::prelude::*;
        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// `demoshark.toml` next to the executable, if there is one.
    pub fn default_path() -> Option<std::path::PathBuf> {
        let exe = std::env::current_exe().ok()?;
        let path = exe.parent()?.join(CONFIG_FILE_NAME);
        path.is_file().then_some(path)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            halftime_phase: self.halftime_phase,
            trace_events: self.trace_events,
        }
    }

    /// Generate a commented default TOML config string.
    pub fn generate_default_toml() -> String {
        r#"# demoshark configuration
# Place this file as demoshark.toml next to the executable,
# or specify with --config <path>.

# Log filter directives (RUST_LOG takes precedence)
log_filter = "info"

# Game phase that marks halftime: "GameHalfEnded" or "TeamSideSwitch"
halftime_phase = "GameHalfEnded"

# Log every reconstruction step at trace level with match and round context
trace_events = false

# Pretty-print the JSON output
pretty = false

# Drop player results that fail validation instead of failing the whole demo
skip_invalid_results = false
"#
        .to_string()
    }

    /// Apply CLI flag overrides.
    pub fn apply_cli_overrides(&mut self, matches: &clap::ArgMatches) -> anyhow::Result<()> {
        if matches.is_present("PRETTY") {
            self.pretty = true;
        }
        if matches.is_present("TRACE_EVENTS") {
            self.trace_events = true;
        }
        if matches.is_present("SKIP_INVALID") {
            self.skip_invalid_results = true;
        }
        if let Some(phase) = matches.value_of("HALFTIME_PHASE") {
            self.halftime_phase = phase
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown game phase {phase:?}"))?;
        }
        Ok(())
    }
}
