use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing_subscriber::{fmt, EnvFilter};

use signal_vault::api::{NewSignal, SignalApiClient, SignalFeed};
use signal_vault::config::Config;
use signal_vault::models::{Outcome, Side, Signal, SignalSource, SignalStatus, TakeProfit};
use signal_vault::storage::{FileStorage, MemoryStorage, Storage};
use signal_vault::store::{Market, SignalStats, SignalStore};

const USAGE: &str = "\
usage: signal_admin [--dry-run] <command> [args]

  --dry-run works on an in-memory copy; nothing is written to the data dir

  stats                              local statistics
  list [page] [limit]                newest-first page (default 1 20)
  market <crypto|forex|other>        signals classified into a market
  range <from> <to>                  signals created between two RFC 3339 times
  fingerprint <id>                   content fingerprint of a stored signal
  status <id> <status> [outcome] [pnl]
  export [path]                      write all signals as JSON (stdout if no path)
  import <path>                      merge signals from a JSON export
  restore                            re-add records missing from the store out of the backup
  clear --yes-really                 wipe primary and backup slots
  submit <symbol> <buy|sell> <entry> <stop> <tp>[,<tp>...]
  archive <id>
  remote-stats";

const COMMANDS: &[&str] = &[
    "stats",
    "list",
    "market",
    "range",
    "fingerprint",
    "status",
    "export",
    "import",
    "restore",
    "clear",
    "submit",
    "archive",
    "remote-stats",
];

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let mut args: Vec<String> = std::env::args().collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    args.retain(|a| a != "--dry-run");
    let command = match args.get(1) {
        Some(c) => c.as_str(),
        None => {
            println!("{}", USAGE);
            return Ok(());
        }
    };
    check_command(command)?;

    let file = FileStorage::new(&cfg.data_dir).with_quota(cfg.storage_quota_bytes);
    let storage: Box<dyn Storage> = if dry_run {
        println!("(dry run, changes are discarded)");
        Box::new(snapshot_of(&file, &cfg)?)
    } else {
        Box::new(file)
    };
    let mut store = SignalStore::open(storage, cfg.store_config());

    match command {
        "stats" => print_stats(&store.stats()),
        "list" => {
            let page: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1);
            let limit: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
            let p = store.get_page(page, limit);
            println!("Page {}/{} ({} total)", p.page, p.total_pages, p.total);
            for s in &p.signals {
                print_line(s);
            }
        }
        "market" => {
            let market = args
                .get(2)
                .and_then(|s| Market::from_str_loose(s))
                .context("market must be crypto, forex or other")?;
            let hits = store.get_by_market(market);
            println!("{} {} signal(s)", hits.len(), market);
            for s in hits {
                print_line(s);
            }
        }
        "range" => {
            let from = parse_time(args.get(2))?;
            let to = parse_time(args.get(3))?;
            let hits = store.get_by_date_range(from, to);
            println!("{} signal(s) between {} and {}", hits.len(), from, to);
            for s in hits {
                print_line(s);
            }
        }
        "fingerprint" => {
            let id = args.get(2).context("missing signal id")?;
            let s = store
                .get_by_id(id)
                .with_context(|| format!("no signal with id {}", id))?;
            let at = s.timestamp().unwrap_or_else(Utc::now);
            println!("{}", s.fingerprint(at));
        }
        "status" => {
            let id = args.get(2).context("missing signal id")?;
            let status = args
                .get(3)
                .and_then(|s| SignalStatus::from_str_loose(s))
                .context("status must be active, completed or archived")?;
            let outcome = match args.get(4) {
                Some(o) => Some(Outcome::from_str_loose(o).context("unknown outcome")?),
                None => None,
            };
            let pnl = match args.get(5) {
                Some(p) => Some(p.parse::<f64>().context("pnl must be a number")?),
                None => None,
            };
            if !store.update_status(id, status, outcome, pnl) {
                bail!("no signal with id {}", id);
            }
            println!("{} -> {}", id, status);
        }
        "export" => {
            let json = store.export()?;
            match args.get(2) {
                Some(path) => {
                    std::fs::write(path, &json)
                        .with_context(|| format!("Failed to write {}", path))?;
                    println!("Exported {} signal(s) to {}", store.len(), path);
                }
                None => println!("{}", json),
            }
        }
        "import" => {
            let path = args.get(2).context("missing import path")?;
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path))?;
            let report = store.import(&text);
            println!(
                "Imported: {} | Skipped: {} | Errors: {}",
                report.imported,
                report.skipped,
                report.errors.len()
            );
            for e in &report.errors {
                println!("  {}", e);
            }
            if !report.success {
                bail!("import failed");
            }
        }
        "restore" => {
            if let Some(info) = store.backup_info() {
                println!("Backup from {} ({} signals)", info.timestamp, info.count);
            }
            let n = store.restore_from_backup()?;
            println!("Restored {} signal(s)", n);
        }
        "clear" => {
            if args.get(2).map(|s| s.as_str()) != Some("--yes-really") {
                bail!("refusing to clear without --yes-really");
            }
            let n = store.clear_all_emergency()?;
            println!("Cleared {} signal(s)", n);
        }
        "submit" => {
            let new_signal = parse_submission(&args[2..])?;
            let api = SignalApiClient::new(&cfg.api_url, cfg.auth_token());
            let created = api.submit_guarded(&new_signal).await?;
            let id = created.id.clone();
            store.store(created, SignalSource::Admin);
            println!("Submitted {}", id);
        }
        "archive" => {
            let id = args.get(2).context("missing signal id")?;
            let api = SignalApiClient::new(&cfg.api_url, cfg.auth_token());
            api.archive_signal(id).await?;
            store.update_status(id, SignalStatus::Archived, None, None);
            println!("Archived {}", id);
        }
        "remote-stats" => {
            let api = SignalApiClient::new(&cfg.api_url, cfg.auth_token());
            let stats = api.fetch_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        other => bail!("unknown command: {}", other),
    }

    Ok(())
}

fn check_command(command: &str) -> Result<()> {
    if !COMMANDS.contains(&command) {
        bail!("unknown command: {}\n\n{}", command, USAGE);
    }
    Ok(())
}

/// Copy the primary and backup slots into memory.
fn snapshot_of(file: &FileStorage, cfg: &Config) -> Result<MemoryStorage> {
    let store_cfg = cfg.store_config();
    let mut mem = MemoryStorage::new();
    for key in [&store_cfg.primary_key, &store_cfg.backup_key] {
        if let Some(content) = file.read(key)? {
            mem.write(key, &content)?;
        }
    }
    Ok(mem)
}

fn parse_time(arg: Option<&String>) -> Result<DateTime<Utc>> {
    let s = arg.context("missing timestamp")?;
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid RFC 3339 time: {}", s))?
        .with_timezone(&Utc))
}

fn parse_submission(args: &[String]) -> Result<NewSignal> {
    if args.len() < 5 {
        bail!("submit needs <symbol> <buy|sell> <entry> <stop> <tp>");
    }
    let side = match args[1].to_ascii_lowercase().as_str() {
        "buy" | "long" => Side::Buy,
        "sell" | "short" => Side::Sell,
        other => bail!("unknown side: {}", other),
    };
    let targets = args[4]
        .split(',')
        .map(|t| t.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .context("take profit must be a number or comma-separated list")?;
    let take_profit = if targets.len() == 1 {
        TakeProfit::Single(targets[0])
    } else {
        TakeProfit::Ladder(targets)
    };

    Ok(NewSignal {
        symbol: args[0].to_ascii_uppercase(),
        side,
        entry_price: args[2].parse().context("entry must be a number")?,
        stop_loss: args[3].parse().context("stop must be a number")?,
        take_profit,
        risk_tier: None,
        timeframe: None,
        analysis: None,
        confidence: None,
    })
}

fn print_line(s: &Signal) {
    let when = s
        .timestamp()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {} {:<10} {:<4} entry {} stop {} tp {:?} [{}{}] {}",
        when,
        s.symbol,
        s.side,
        s.entry_price,
        s.stop_loss,
        s.take_profit.targets(),
        s.status(),
        s.outcome.map(|o| format!("/{}", o)).unwrap_or_default(),
        s.id
    );
}

fn print_stats(stats: &SignalStats) {
    println!("Signals:   {}", stats.total);
    println!(
        "Status:    {} active / {} completed / {} archived",
        stats.active, stats.completed, stats.archived
    );
    println!("Win/Loss:  {} / {}", stats.wins, stats.losses);
    println!("Win Rate:  {}%", stats.win_rate);
    println!("PnL:       {:+.2}", stats.total_pnl);
    let mut markets: Vec<_> = stats.by_market.iter().collect();
    markets.sort_by_key(|(m, _)| m.to_string());
    for (market, n) in markets {
        println!("  {}: {}", market, n);
    }
    let mut sources: Vec<_> = stats.by_source.iter().collect();
    sources.sort_by_key(|(s, _)| s.to_string());
    for (source, n) in sources {
        println!("  via {}: {}", source, n);
    }
}
