//! # Seed Data Generator
//!
//! Populates the database with ticket types and code pools for development.
//!
//! ## Usage
//! ```bash
//! # Three ticket types, 50 codes each (default)
//! cargo run -p comptoir-db --bin seed
//!
//! # More codes per ticket type
//! cargo run -p comptoir-db --bin seed -- --codes 500
//!
//! # Specify database path
//! cargo run -p comptoir-db --bin seed -- --db ./data/comptoir.db
//!
//! # Also use a few tickets today so the dashboard has something to show
//! cargo run -p comptoir-db --bin seed -- --with-usage
//! ```
//!
//! ## Generated Data
//! - Ticket types `1h`, `3h`, `24h` with increasing prices
//! - One code pool per type, codes `{PREFIX}-{INDEX:05}` (e.g. `W1H-00042`)
//! - Stock equal to the number of imported codes

use chrono::Local;
use comptoir_core::ledger::BrokenReason;
use comptoir_core::Money;
use comptoir_db::{Database, DbConfig};
use std::env;

/// (duration label, price in minor units, code prefix)
const TICKET_TYPES: &[(&str, i64, &str)] = &[("1h", 500, "W1H"), ("3h", 1200, "W3H"), ("24h", 3000, "W24H")];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut codes_per_type: usize = 50;
    let mut db_path = String::from("./comptoir_dev.db");
    let mut with_usage = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--codes" | "-c" => {
                if i + 1 < args.len() {
                    codes_per_type = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--with-usage" | "-u" => with_usage = true,
            "--help" | "-h" => {
                println!("Comptoir Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --codes <N>    Codes imported per ticket type (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./comptoir_dev.db)");
                println!("  -u, --with-usage   Use and break a few tickets today");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Comptoir Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Codes per ticket type: {}", codes_per_type);
    println!();

    // Connect to database
    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing ticket types
    let existing = db.tickets().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} ticket types", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating ticket types...");

    let start = std::time::Instant::now();
    let mut created = Vec::new();

    for (duration, price, prefix) in TICKET_TYPES {
        let ticket = db.tickets().create(duration, Money::from_minor(*price)).await?;

        let codes: Vec<String> = (1..=codes_per_type).map(|n| format!("{prefix}-{n:05}")).collect();
        let stock = match db.tickets().import_codes(&ticket.id, &codes).await? {
            Some(update) => update.new_stock,
            None => 0,
        };

        println!("  {:>4}  {:>8}  stock {}", ticket.duration, ticket.price.to_decimal_string(2), stock);
        created.push(ticket);
    }

    if with_usage {
        println!();
        println!("Recording today's usage...");
        let today = Local::now().date_naive();

        for ticket in &created {
            for _ in 0..3 {
                if let Err(e) = db.tickets().use_ticket(&ticket.id, today).await {
                    eprintln!("Failed to use {}: {}", ticket.duration, e);
                }
            }
        }
        if let Some(first) = created.first() {
            db.history()
                .mark_broken(&first.id, BrokenReason::NetworkIssue, None, today)
                .await?;
        }

        let summary = db.history().summary(today).await?;
        for ticket in &created {
            println!(
                "  {:>4}  used {}  broken {}",
                ticket.duration,
                summary.used(&ticket.id),
                summary.broken(&ticket.id)
            );
        }
    }

    println!();
    println!("✓ Seeded {} ticket types in {:?}", created.len(), start.elapsed());
    println!("✓ Seed complete!");

    Ok(())
}
