//! autotrack-replay: replays a scripted page session against the
//! interaction and session trackers and prints the records they produce.

mod scenario;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use autotrack_core::event_bus::capture_sink;
use autotrack_core::{AutotrackConfig, Record};
use autotrack_web::{InteractionTracker, SessionTracker};

use crate::scenario::{replay, Scenario};

#[derive(Parser, Debug)]
#[command(name = "autotrack-replay")]
#[command(about = "Replay host activity against the autotrack trackers")]
#[command(version)]
struct Cli {
    /// Scenario file (JSON) describing the page and the steps to replay
    scenario: PathBuf,

    /// TOML configuration file for both trackers
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Provider override for both trackers
    #[arg(long, env = "AUTOTRACK__PROVIDER")]
    provider: Option<String>,

    /// Force interaction tracking on at startup
    #[arg(long, default_value_t = false)]
    interaction: bool,

    /// Force session tracking on at startup
    #[arg(long, default_value_t = false)]
    session: bool,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

/// One output line. Attributes are sorted so replays diff cleanly.
#[derive(Serialize)]
struct Emitted<'a> {
    provider: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<&'a str, &'a str>,
}

fn render(record: &Record, provider: &str) -> serde_json::Result<String> {
    serde_json::to_string(&Emitted {
        provider,
        name: record.name.as_deref(),
        attributes: record
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect(),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "autotrack_web=info,autotrack_replay=info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut config = AutotrackConfig::load(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(provider) = cli.provider {
        config.interaction.provider = Some(provider.clone());
        config.session.provider = Some(provider);
    }
    if cli.interaction {
        config.interaction.enable = true;
    }
    if cli.session {
        config.session.enable = true;
    }

    info!(
        interaction = config.interaction.enable,
        session = config.session.enable,
        "Configuration loaded"
    );

    let scenario = Scenario::load(&cli.scenario)?;
    let (host, nodes) = scenario.build_host()?;
    let host = Arc::new(host);
    let sink = capture_sink();

    let interaction = InteractionTracker::new(sink.clone(), host.clone(), config.interaction.into());
    let session = SessionTracker::new(sink.clone(), host.clone(), config.session.into());

    replay(&scenario.steps, &host, &nodes, &interaction, &session)?;

    // Let pending sink outcomes settle before reporting.
    tokio::task::yield_now().await;

    for (record, provider) in sink.calls() {
        println!("{}", render(&record, &provider)?);
    }

    info!(records = sink.count(), "Replay complete");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_render_sorts_attributes() {
        let record = Record::named("checkout").with_attributes(HashMap::from([
            ("zeta".to_string(), "1".to_string()),
            ("alpha".to_string(), "2".to_string()),
            ("mid".to_string(), "3".to_string()),
        ]));

        assert_eq!(
            render(&record, "AWSPinpoint").unwrap(),
            r#"{"provider":"AWSPinpoint","name":"checkout","attributes":{"alpha":"2","mid":"3","zeta":"1"}}"#
        );
    }

    #[test]
    fn test_render_omits_empty_fields() {
        assert_eq!(render(&Record::default(), "p").unwrap(), r#"{"provider":"p"}"#);
    }
}
