use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use rampr_core::{RunConfig, Stage};

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }
    humantime::parse_duration(s)
        .map_err(|e| format!("invalid duration '{s}' ({e}; expected e.g. 10s, 250ms, 1m)"))
}

/// `DURATION:TARGET`, e.g. `30s:50`.
fn parse_stage(input: &str) -> Result<Stage, String> {
    let (duration, target) = input
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| format!("invalid stage '{input}' (expected DURATION:TARGET, e.g. 30s:50)"))?;

    let duration = parse_duration(duration)?;
    if duration.is_zero() {
        return Err(format!("invalid stage '{input}': duration must be positive"));
    }
    let target = target
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid stage '{input}': target must be a non-negative integer"))?;

    Ok(Stage { duration, target })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bar on stderr, summary on stdout.
    HumanReadable,
    /// NDJSON progress lines and a final summary line on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "rampr",
    author,
    version,
    about = "Stage-based HTTP load testing",
    long_about = "rampr drives a pool of virtual users against one HTTP endpoint.\n\nA scenario file (YAML) declares the request, the ramp stages and the pass/fail thresholds. The pool is resized continuously to follow the ramp; each virtual user sends the request in a loop.\n\n`${NAME}` placeholders in the request are expanded from the process environment; use `--env KEY=VALUE` to add/override values.",
    after_help = "Examples:\n  rampr run pull.yaml\n  rampr run pull.yaml --stage 10s:20 --stage 30s:20 --stage 5s:0\n  rampr run pull.yaml --vus 50 --duration 30s --output json\n  rampr run pull.yaml --env BASE_URL=http://localhost:8080\n  rampr validate pull.yaml"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RAMPR_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test scenario
    #[command(
        long_about = "Run a scenario file and evaluate its thresholds.\n\nExit code is 0 when every threshold passes, 11 when any fails, 20 when interrupted, 30 on invalid input and 40 on runtime errors.\n\nCLI load-profile flags override the scenario's stages."
    )]
    Run(RunArgs),

    /// Resolve a scenario and print the plan without sending traffic
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// Constant number of virtual users (replaces the scenario's stages)
    #[arg(long)]
    pub vus: Option<u64>,

    /// Duration of the constant profile (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Ramp stage as DURATION:TARGET (repeatable, replaces the scenario's stages)
    #[arg(long = "stage", value_name = "DURATION:TARGET", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// How often the pool is resized to the ramp target
    #[arg(long, value_parser = parse_duration)]
    pub tick: Option<Duration>,

    /// Per-request timeout, connect to end of body
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Add/override env vars used for `${NAME}` expansion (repeatable, KEY=VALUE).
    /// CLI-provided vars override the current process env.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,
}

impl ProfileArgs {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            vus: self.vus,
            duration: self.duration,
            stages: self.stages.clone(),
            tick: self.tick,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the scenario file (.yaml, .yml or .json)
    pub scenario: PathBuf,

    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Also write the JSON summary document to this file
    #[arg(long, value_name = "PATH")]
    pub summary_export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Path to the scenario file (.yaml, .yml or .json)
    pub scenario: PathBuf,

    #[command(flatten)]
    pub profile: ProfileArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn parse_stage_splits_duration_and_target() {
        assert_eq!(
            parse_stage("30s:50"),
            Ok(Stage {
                duration: Duration::from_secs(30),
                target: 50
            })
        );
        assert_eq!(
            parse_stage("1m:0"),
            Ok(Stage {
                duration: Duration::from_secs(60),
                target: 0
            })
        );
        assert!(parse_stage("30s").is_err());
        assert!(parse_stage("0s:10").is_err());
        assert!(parse_stage("30s:-1").is_err());
    }

    #[test]
    fn cli_parses_run_with_profile_overrides() {
        let parsed = Cli::try_parse_from([
            "rampr",
            "run",
            "pull.yaml",
            "--stage",
            "10s:5",
            "--stage",
            "5s:0",
            "--tick",
            "50ms",
            "--timeout",
            "2s",
            "--env",
            "FOO=bar",
            "--env",
            "EMPTY=",
            "--output",
            "json",
            "--summary-export",
            "out/summary.json",
            "-vv",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };
        assert_eq!(cli.verbose, 2);

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.scenario, PathBuf::from("pull.yaml"));
                assert_eq!(args.profile.stages.len(), 2);
                assert_eq!(args.profile.tick, Some(Duration::from_millis(50)));
                assert_eq!(args.profile.timeout, Some(Duration::from_secs(2)));
                assert_eq!(
                    args.profile.env,
                    vec!["FOO=bar".to_string(), "EMPTY=".to_string()]
                );
                assert_eq!(args.output, OutputFormat::Json);
                assert_eq!(
                    args.summary_export,
                    Some(PathBuf::from("out/summary.json"))
                );

                let cfg = args.profile.run_config();
                assert_eq!(cfg.stages[0].target, 5);
                assert_eq!(cfg.vus, None);
            }
            Command::Validate(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_validate_with_constant_profile() {
        let cli = Cli::try_parse_from([
            "rampr",
            "validate",
            "pull.yaml",
            "--vus",
            "3",
            "--duration",
            "5s",
        ])
        .unwrap_or_else(|e| panic!("failed to parse args: {e}"));

        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.profile.vus, Some(3));
                assert_eq!(args.profile.duration, Some(Duration::from_secs(5)));
            }
            Command::Run(_) => panic!("expected validate command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_output_format() {
        let err = Cli::try_parse_from(["rampr", "run", "a.yaml", "--output", "xml"])
            .err()
            .unwrap_or_else(|| panic!("expected parse error"));
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
