use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use warden_advisory::{doctor as advisory_doctor, Advisor, OracleClient, OracleConfig};
use warden_fc::{ActionDispatcher, VehicleConfig};
use warden_policy::{doctor as safety_doctor, SafetyConfig};
use warden_proto::{ActionKind, MissionPlan};
use warden_supervisor::{
    Journal, MissionConfig, PolicyContext, PolicyKind, SessionConfig, Supervisor, WatcherConfig,
};

use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "warden", version, about = "Warden - vehicle safety supervisor")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration.
    Doctor {
        /// Also send one test prompt to the advisory oracle.
        #[arg(long)]
        probe_oracle: bool,
    },
    /// Connect, take off and supervise one flight.
    Run,
    /// Ask the advisory oracle a single question.
    Advise { prompt: String },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    vehicle: VehicleConfig,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    safety: SafetyConfig,
    #[serde(default)]
    advisory: OracleConfig,
    #[serde(default)]
    watchers: Vec<WatcherConfig>,

    mission: Option<MissionConfig>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor { probe_oracle } => doctor(&cfg, probe_oracle).await?,
        Command::Run => run(&cfg).await?,
        Command::Advise { prompt } => advise(&cfg, &prompt).await?,
    }
    Ok(())
}

/// Checks shared by `doctor` and `run`; nothing here touches the network.
fn validate(cfg: &Config) -> Result<()> {
    anyhow::ensure!(!cfg.vehicle.address.trim().is_empty(), "vehicle.address missing");
    anyhow::ensure!(cfg.vehicle.heartbeat_hz.unwrap_or(1.0) > 0.0, "vehicle.heartbeat_hz must be > 0");
    anyhow::ensure!(cfg.session.takeoff_alt_m > 0.0, "session.takeoff_alt_m must be > 0");
    anyhow::ensure!(cfg.session.ready_timeout_s >= 1, "session.ready_timeout_s must be >= 1");

    safety_doctor::check_safety(&cfg.safety)?;
    advisory_doctor::check_oracle(&cfg.advisory)?;

    anyhow::ensure!(!cfg.watchers.is_empty(), "no [[watchers]] configured");
    let has = |kind: PolicyKind| cfg.watchers.iter().any(|w| w.policy == kind);

    match &cfg.mission {
        Some(m) => {
            safety_doctor::check_completion_action(m.on_complete, m.return_to_launch_after)?;
            if m.items.is_empty() {
                let sq = m.square.context("mission needs items or a [mission.square] pattern")?;
                anyhow::ensure!(sq.size_m > 0.0, "mission.square.size_m must be > 0");
            } else {
                MissionPlan::new(m.items.clone()).context("mission.items")?;
            }
            if !has(PolicyKind::Mission) {
                warn!("config: mission configured but no mission watcher; completion will not end the session");
            }
        }
        None => anyhow::ensure!(!has(PolicyKind::Mission), "mission watcher configured without a [mission] section"),
    }
    Ok(())
}

async fn doctor(cfg: &Config, probe_oracle: bool) -> Result<()> {
    info!("doctor: starting");
    validate(cfg)?;

    let has = |kind: PolicyKind| cfg.watchers.iter().any(|w| w.policy == kind);
    if probe_oracle {
        let client = OracleClient::new(cfg.advisory.clone())?;
        let reply = client
            .try_ask("Reply with only 'ok'.")
            .await
            .with_context(|| format!("oracle probe {}", cfg.advisory.endpoint))?;
        let health = client.link_health();
        info!("doctor: oracle answered {:?} in {:?} ms", reply, health.rtt_ms);
    } else if has(PolicyKind::TemperatureAdvisory) {
        info!("doctor: advisory watcher configured; run with --probe-oracle to test the endpoint");
    }

    info!("doctor: OK");
    Ok(())
}

async fn advise(cfg: &Config, prompt: &str) -> Result<()> {
    let client = OracleClient::new(cfg.advisory.clone())?;
    let reply = client.try_ask(prompt).await.context("advisory call")?;
    println!("{}", reply);
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");
    validate(cfg).context("config rejected, see `warden doctor`")?;

    let advisor: Arc<dyn Advisor> = Arc::new(OracleClient::new(cfg.advisory.clone()).context("advisory client")?);
    let ctx = PolicyContext {
        safety: cfg.safety.clone(),
        advisor,
        on_mission_complete: cfg.mission.as_ref().map(|m| m.on_complete).unwrap_or(ActionKind::Land),
    };
    let watchers = cfg.watchers.iter().map(|w| w.build(&ctx)).collect();

    let dispatcher = ActionDispatcher::connect(&cfg.vehicle)
        .await
        .with_context(|| format!("connect {}", cfg.vehicle.address))?;

    let journal = match &cfg.session.journal_path {
        Some(path) => Journal::open(path).await.unwrap_or_else(|e| {
            warn!("run: journal {} unavailable: {}", path.display(), e);
            Journal::disabled()
        }),
        None => Journal::disabled(),
    };

    let mut supervisor = Supervisor::new(Arc::new(dispatcher), cfg.session.clone()).with_journal(journal);
    if let Some(m) = &cfg.mission {
        supervisor = supervisor.with_mission(m.clone());
    }

    let report = supervisor.run(watchers).await.context("session")?;
    println!("outcome={:?}", report.outcome);
    println!("watcher={} decision={} trigger={:?}", report.watcher, report.decision, report.trigger);
    println!("dispatch={:?} stopped={}", report.dispatch, report.cancelled);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses() {
        let cfg: Config = toml::from_str(include_str!("../../../config/warden.toml")).unwrap();
        assert_eq!(cfg.vehicle.address, "udpin:0.0.0.0:14540");
        assert!(cfg.watchers.len() >= 3);
        assert!(cfg.mission.is_none());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: Config = toml::from_str(
            "[vehicle]\naddress = \"serial:/dev/ttyUSB0:57600\"\n\n[[watchers]]\npolicy = \"battery\"\n",
        )
        .unwrap();
        assert_eq!(cfg.safety.min_satellites, 6);
        assert_eq!(cfg.session.ready_timeout_s, 60);
        assert_eq!(cfg.advisory.model, "llama3");
        assert_eq!(cfg.watchers[0].policy, PolicyKind::Battery);
    }

    fn parse(extra: &str) -> Config {
        let base = "[vehicle]\naddress = \"udpin:0.0.0.0:14540\"\n\n[[watchers]]\npolicy = \"battery\"\n";
        toml::from_str(&format!("{}{}", base, extra)).unwrap()
    }

    #[test]
    fn sample_config_validates() {
        let cfg: Config = toml::from_str(include_str!("../../../config/warden.toml")).unwrap();
        validate(&cfg).unwrap();
    }

    #[test]
    fn non_terminal_actions_are_refused_before_flight() {
        assert!(validate(&parse("")).is_ok());

        let cfg = parse("\n[safety]\ngps_action_before_confirm = \"none\"\n");
        assert!(validate(&cfg).is_err());

        let cfg = parse("\n[mission]\non_complete = \"none\"\n\n[mission.square]\nsize_m = 1.0\n");
        assert!(validate(&cfg).is_err());

        let cfg = parse(
            "\n[mission]\non_complete = \"none\"\nreturn_to_launch_after = true\n\n[mission.square]\nsize_m = 1.0\n",
        );
        assert!(validate(&cfg).is_ok());
    }
}
