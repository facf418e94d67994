//! NF525 fiscal chain command-line tool
//!
//! Computes chain digests, verifies stored chains, closes days and runs an
//! in-memory walkthrough of tamper detection.
//!
//! Usage:
//!   nf525 hash sale --ticket T-001 --created-at 2024-01-15T10:00:00.000Z --total 20.00
//!   nf525 --config nf525.toml verify --family all
//!   nf525 --config nf525.toml close-day --date 2024-01-15
//!   nf525 demo
//!
//! Exit status: 0 on success, 2 when a stored chain is broken, 1 on any
//! error.  `demo` exits 0 once its deliberate break has been detected.

use std::{path::PathBuf, process, sync::Arc};

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use nf525_archive::{ArchiveConfig, FiscalRegister};
use nf525_chain::{compute_audit_hash, compute_closure_hash, compute_sale_hash, InMemoryChainStore};
use nf525_contracts::{
    error::{ChainError, ChainResult},
    event::{AuditEvent, ChainFamily, ClosureEvent, PaymentMethod, SaleEvent},
    report::IntegrityReport,
};
use nf525_core::traits::{ChainStore, SystemClock};

// ── CLI definition ────────────────────────────────────────────────────────────

/// NF525 fiscal integrity chain tool.
#[derive(Parser)]
#[command(
    name = "nf525",
    about = "Hash, verify and close NF525 fiscal chains",
    long_about = "Computes SHA-256 chain digests for sales, daily closures and audit\n\
                  entries, verifies stored chains and reports the first break."
)]
struct Cli {
    /// Register configuration (TOML).  Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the digest of one event.
    #[command(subcommand)]
    Hash(HashCommand),
    /// Verify stored chains and report the first break.
    Verify {
        #[arg(long, value_enum, default_value_t = FamilyArg::All)]
        family: FamilyArg,
        /// Print reports as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Seal the completed sales of a day into the closures chain.
    CloseDay {
        /// Calendar day, YYYY-MM-DD.
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        closed_by: Option<String>,
    },
    /// Print the perpetual grand total.
    GrandTotal,
    /// Build a small chain in memory, tamper with it, and verify it.
    Demo,
}

#[derive(Subcommand)]
enum HashCommand {
    Sale {
        #[arg(long)]
        ticket: String,
        #[arg(long)]
        created_at: String,
        #[arg(long)]
        total: f64,
        #[arg(long)]
        previous: Option<String>,
    },
    Closure {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        count: u64,
        #[arg(long)]
        total_ttc: f64,
        #[arg(long)]
        previous: Option<String>,
    },
    Audit {
        #[arg(long)]
        timestamp: String,
        #[arg(long)]
        event_type: String,
        #[arg(long)]
        table: String,
        #[arg(long)]
        record_id: Option<String>,
        #[arg(long)]
        previous: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FamilyArg {
    Sales,
    Closures,
    Audit,
    All,
}

impl FamilyArg {
    fn families(self) -> Vec<ChainFamily> {
        match self {
            Self::Sales => vec![ChainFamily::Sales],
            Self::Closures => vec![ChainFamily::Closures],
            Self::Audit => vec![ChainFamily::Audit],
            Self::All => ChainFamily::ALL.to_vec(),
        }
    }
}

/// What a successful run found.
enum Outcome {
    Clean,
    IntegrityAlert,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Structured logging.  Set RUST_LOG=info to see appends and verdicts.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(Outcome::Clean) => {}
        Ok(Outcome::IntegrityAlert) => process::exit(2),
        Err(e) => {
            eprintln!("nf525: {}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> ChainResult<Outcome> {
    match cli.command {
        Command::Hash(cmd) => {
            println!("{}", hash(cmd)?);
            Ok(Outcome::Clean)
        }
        Command::Verify { family, json } => {
            let register = FiscalRegister::from_config(&load_config(cli.config)?);
            let mut outcome = Outcome::Clean;
            for family in family.families() {
                let report = register.verify(family)?;
                if !report.valid {
                    outcome = Outcome::IntegrityAlert;
                }
                print_report(&report, json);
            }
            Ok(outcome)
        }
        Command::CloseDay { date, closed_by } => {
            let register = FiscalRegister::from_config(&load_config(cli.config)?);
            let closure = register.close_day(date, closed_by)?;
            println!(
                "closed {}: {} sale(s), {:.2} TTC, hash {}",
                closure.closure_date,
                closure.total_sales,
                closure.total_ttc,
                closure.hash.as_deref().unwrap_or_default()
            );
            Ok(Outcome::Clean)
        }
        Command::GrandTotal => {
            let register = FiscalRegister::from_config(&load_config(cli.config)?);
            let total = register.grand_total()?;
            println!(
                "grand total {:.2} ({:.2} closed over {} day(s), {:.2} open over {} sale(s))",
                total.perpetual(),
                total.closed_ttc,
                total.closures,
                total.open_ttc,
                total.open_sales
            );
            Ok(Outcome::Clean)
        }
        Command::Demo => demo(),
    }
}

fn load_config(path: Option<PathBuf>) -> ChainResult<ArchiveConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading register config");
            ArchiveConfig::from_file(&path)
        }
        None => Ok(ArchiveConfig::default()),
    }
}

fn hash(cmd: HashCommand) -> ChainResult<String> {
    match cmd {
        HashCommand::Sale {
            ticket,
            created_at,
            total,
            previous,
        } => compute_sale_hash(&ticket, &created_at, total, previous.as_deref()),
        HashCommand::Closure {
            date,
            count,
            total_ttc,
            previous,
        } => compute_closure_hash(date, count, total_ttc, previous.as_deref()),
        HashCommand::Audit {
            timestamp,
            event_type,
            table,
            record_id,
            previous,
        } => Ok(compute_audit_hash(
            &timestamp,
            &event_type,
            &table,
            record_id.as_deref(),
            previous.as_deref(),
        )),
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_report(report: &IntegrityReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("nf525: cannot render report: {}", e),
        }
        return;
    }

    if report.valid {
        println!(
            "[ok]     {:<8} chain intact, {} record(s) checked",
            report.family, report.total_checked
        );
    } else {
        println!(
            "[ALERT]  {:<8} chain BROKEN at index {} (record {}, {}) after {} record(s)",
            report.family,
            report.first_broken_index.unwrap_or_default(),
            report.first_broken_id.as_deref().unwrap_or("?"),
            report
                .break_kind
                .map(|kind| format!("{:?}", kind))
                .unwrap_or_default(),
            report.total_checked
        );
    }
}

// ── Demo ──────────────────────────────────────────────────────────────────────

fn demo() -> ChainResult<Outcome> {
    println!();
    println!("NF525 fiscal chain: tamper detection walkthrough");
    println!("=================================================");
    println!();

    let register = FiscalRegister::in_memory(Arc::new(SystemClock));
    for (ticket, total) in [("T-001", 20.00), ("T-002", 30.00), ("T-003", 45.50)] {
        let sale = register
            .record_sale(SaleEvent::new(ticket, "", total).with_payment(PaymentMethod::Cash, total))?;
        println!(
            "  sealed {} {:>6.2}  {}",
            sale.ticket_number,
            sale.total,
            sale.hash.as_deref().unwrap_or_default()
        );
    }
    println!();
    print_report(&register.verify(ChainFamily::Sales)?, false);

    println!();
    println!("  rewriting the stored total of T-002 to 35.00 ...");
    let mut rows: Vec<SaleEvent> = register.sales_store().load_chain()?;
    rows[1].total = 35.00;

    let tampered = FiscalRegister::new(
        Arc::new(InMemoryChainStore::with_records(rows)),
        Arc::new(InMemoryChainStore::<ClosureEvent>::new()),
        Arc::new(InMemoryChainStore::<AuditEvent>::new()),
        Arc::new(SystemClock),
    );
    let report = tampered.verify(ChainFamily::Sales)?;
    print_report(&report, false);
    println!();

    // The break above is the expected result; only a missed tamper fails.
    if report.valid {
        return Err(ChainError::contract(
            "tampered sale was not detected by verification",
        ));
    }
    Ok(Outcome::Clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_exits_clean_after_showing_the_break() {
        assert!(matches!(demo().unwrap(), Outcome::Clean));
    }

    #[test]
    fn family_all_expands_to_every_chain() {
        assert_eq!(FamilyArg::All.families(), ChainFamily::ALL.to_vec());
        assert_eq!(FamilyArg::Audit.families(), vec![ChainFamily::Audit]);
    }
}
