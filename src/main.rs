use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reward_points::{
    init_logging, load_csv, AggregationScope, CustomerId, InMemorySource, RewardConfig,
    RewardService, SqliteSource, TransactionSource,
};

const USAGE: &str = "\
Usage:
  reward-points [--config FILE] [--db FILE | --csv FILE] all [--window]
  reward-points [--config FILE] [--db FILE | --csv FILE] customer <ID>
  reward-points import <CSV> <DB>

Without --db or --csv the built-in sample transactions are used.";

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    csv: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => options.config = Some(next_value(&mut iter, arg)?),
            "--db" => options.db = Some(next_value(&mut iter, arg)?),
            "--csv" => options.csv = Some(next_value(&mut iter, arg)?),
            _ => options.command.push(arg.clone()),
        }
    }

    if options.db.is_some() && options.csv.is_some() {
        bail!("--db and --csv are mutually exclusive");
    }

    Ok(options)
}

fn next_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<PathBuf> {
    iter.next()
        .map(PathBuf::from)
        .with_context(|| format!("{flag} requires a value"))
}

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(&args)?;

    let command: Vec<&str> = options.command.iter().map(String::as_str).collect();
    match command.as_slice() {
        ["import", csv, db] => run_import(Path::new(csv), Path::new(db)),
        ["all"] => run_all(&options, AggregationScope::AllHistory),
        ["all", "--window"] => run_all(&options, AggregationScope::RollingWindow),
        ["customer", id] => {
            let customer_id: CustomerId = id
                .parse()
                .with_context(|| format!("Invalid customer id: {id}"))?;
            run_customer(&options, customer_id)
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

fn load_config(options: &Options) -> Result<RewardConfig> {
    match &options.config {
        Some(path) => RewardConfig::from_file(path),
        None => Ok(RewardConfig::default()),
    }
}

fn open_source(options: &Options) -> Result<Arc<dyn TransactionSource>> {
    if let Some(db) = &options.db {
        return Ok(Arc::new(SqliteSource::open(db)?));
    }
    if let Some(csv) = &options.csv {
        return Ok(Arc::new(InMemorySource::new(load_csv(csv)?)));
    }
    Ok(Arc::new(InMemorySource::sample()))
}

fn build_service(options: &Options) -> Result<RewardService> {
    let config = load_config(options)?;
    let source = open_source(options)?;
    Ok(RewardService::new(source, config)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_all(options: &Options, scope: AggregationScope) -> Result<()> {
    let service = build_service(options)?;
    let rewards = service.all_rewards(scope)?;

    if rewards.is_empty() {
        eprintln!("No rewards found");
        std::process::exit(1);
    }

    print_json(&rewards)
}

fn run_customer(options: &Options, customer_id: CustomerId) -> Result<()> {
    let service = build_service(options)?;
    let reward = service.customer_rewards(customer_id)?;
    print_json(&reward)
}

fn run_import(csv_path: &Path, db_path: &Path) -> Result<()> {
    let transactions = load_csv(csv_path)?;
    let source = SqliteSource::open(db_path)?;

    let inserted = source.import(&transactions)?;
    let count = source.count()?;

    println!("✓ Loaded {} transactions from CSV", transactions.len());
    println!("✓ Inserted {} new transactions", inserted);
    println!("✓ Database contains {} transactions", count);

    Ok(())
}
