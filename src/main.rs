use std::io::Write;

use clap::Parser;

use lookback::LookbackError;
use lookback::config::{ViewportConfig, fetch_config};
use lookback::format::{price_label, time_label};
use lookback::models::Interval;
use lookback::source::JsonlSource;
use lookback::viewport::{LoadOutcome, ViewportManager};

/// Candles assumed to fit on screen.
const VISIBLE_COUNT: usize = 100;

#[derive(Parser)]
#[clap(name = "lookback")]
#[clap(about = "Print the most recent window of a JSON-lines candle dataset")]
struct Cli {
    /// Dataset id, the file stem of `<data dir>/<dataset>.jsonl`
    dataset: String,

    /// Interval to view at, e.g. `1s`, `5m`, `1h`; defaults to `LOOKBACK_INTERVAL`
    interval: Option<Interval>,

    /// Print the window as JSON lines instead of a table
    #[clap(long)]
    json: bool,
}

impl Cli {
    /// Starts the viewport at the requested interval so the first load is
    /// already at the right granularity.
    fn apply(&self, viewport: &mut ViewportConfig) {
        if let Some(interval) = self.interval {
            viewport.default_interval = interval;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), LookbackError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut app_config = fetch_config()?;
    cli.apply(&mut app_config.viewport);
    let dataset = cli.dataset;

    let source = JsonlSource::new(app_config.data_dir);
    tracing::info!(dir = %source.root().display(), %dataset, "opening dataset");
    let manager = ViewportManager::new(source, app_config.viewport);

    manager.load_initial(&dataset, VISIBLE_COUNT).await?;
    // Page one chunk of history in, as a scroll to the left would.
    if let LoadOutcome::Skipped(reason) = manager.extend_start().await? {
        tracing::debug!(?reason, "no older data loaded");
    }

    let Some(snapshot) = manager.snapshot() else {
        return Ok(());
    };

    let mut out = std::io::stdout().lock();
    if cli.json {
        for candle in &snapshot.candles {
            writeln!(out, "{}", serde_json::to_string(candle)?)?;
        }
        return Ok(());
    }

    writeln!(
        out,
        "{} @ {}: {} of {} buckets loaded from offset {}",
        snapshot.dataset,
        snapshot.interval,
        snapshot.candles.len(),
        snapshot.total_count,
        snapshot.logical_offset
    )?;
    let Some(domain) = snapshot.stable_domain else {
        return Ok(());
    };
    writeln!(
        out,
        "value axis: {} .. {}",
        price_label(domain.low, domain),
        price_label(domain.high, domain)
    )?;

    let visible_from = snapshot.candles.len().saturating_sub(VISIBLE_COUNT);
    for candle in &snapshot.candles[visible_from..] {
        writeln!(
            out,
            "{:>16}  o {:>12}  h {:>12}  l {:>12}  c {:>12}  v {}",
            time_label(candle.timestamp, snapshot.interval),
            price_label(candle.open, domain),
            price_label(candle.high, domain),
            price_label(candle.low, domain),
            price_label(candle.close, domain),
            candle.volume
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_dataset_interval_and_flag() {
        let cli = Cli::try_parse_from(["lookback", "BTC-USD", "5m", "--json"]).unwrap();
        assert_eq!(cli.dataset, "BTC-USD");
        assert_eq!(cli.interval, Some(Interval::M5));
        assert!(cli.json);

        let cli = Cli::try_parse_from(["lookback", "BTC-USD"]).unwrap();
        assert_eq!(cli.interval, None);
        assert!(!cli.json);
    }

    #[test]
    fn rejects_unknown_interval_and_missing_dataset() {
        assert!(Cli::try_parse_from(["lookback", "BTC-USD", "7m"]).is_err());
        assert!(Cli::try_parse_from(["lookback"]).is_err());
    }

    #[test]
    fn interval_argument_sets_initial_interval() {
        let mut viewport = ViewportConfig::default();
        Cli::try_parse_from(["lookback", "BTC-USD", "1h"])
            .unwrap()
            .apply(&mut viewport);
        assert_eq!(viewport.default_interval, Interval::H1);

        let mut viewport = ViewportConfig::default();
        Cli::try_parse_from(["lookback", "BTC-USD"])
            .unwrap()
            .apply(&mut viewport);
        assert_eq!(viewport.default_interval, Interval::S1);
    }
}
