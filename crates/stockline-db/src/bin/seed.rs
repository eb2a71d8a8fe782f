//! # Seed Data Generator
//!
//! Populates a database with a small pharmacy catalog and stock in both
//! ledgers, for trying the server by hand.
//!
//! ## Usage
//! ```bash
//! # Seed ./stockline_dev.db for tenant t1 / org o1 / branch b1
//! cargo run -p stockline-db --bin seed
//!
//! # Specify database path and scope
//! cargo run -p stockline-db --bin seed -- --db ./data/stockline.db \
//!     --tenant acme --org main --branch north
//! ```
//!
//! Every product gets one variant and a batch in each ledger. Batch ids are
//! printed so they can be pasted into sale requests.

use anyhow::{Context, Result};
use chrono::{Months, Utc};
use std::env;
use stockline_core::{LedgerKind, Scope};
use stockline_db::{Database, DbConfig, NewStockBatch};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// (product, variant, pack size, sell price in paise)
const CATALOG: &[(&str, &str, Option<i64>, i64)] = &[
    ("Paracetamol 500mg", "Strip of 10", Some(10), 3_500),
    ("Amoxicillin 250mg", "Strip of 15", Some(15), 9_800),
    ("Cetirizine 10mg", "Strip of 10", Some(10), 2_200),
    ("Cough Syrup 100ml", "Bottle", None, 11_500),
    ("ORS Sachet", "Box of 25", Some(25), 1_900),
    ("Vitamin C 500mg", "Strip of 20", Some(20), 4_000),
];

struct Args {
    db_path: String,
    scope: Scope,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    info!(path = %args.db_path, "Seeding database");

    let db = Database::new(DbConfig::new(&args.db_path))
        .await
        .context("failed to open database")?;

    let expiry = Utc::now()
        .date_naive()
        .checked_add_months(Months::new(18))
        .context("expiry date out of range")?;

    for (index, (name, variant_name, pack_size, price)) in CATALOG.iter().enumerate() {
        let product = db.catalog().create_product(&args.scope, name).await?;
        let variant = db
            .catalog()
            .create_variant(&product.id, variant_name, *pack_size)
            .await?;

        for kind in [LedgerKind::Organisation, LedgerKind::Branch] {
            let batch = db
                .stocks()
                .create_batch(
                    kind,
                    &args.scope,
                    NewStockBatch {
                        product_id: product.id.clone(),
                        variant_id: variant.id.clone(),
                        batch_no: format!("LOT-{:03}", index + 1),
                        expiry_date: Some(expiry),
                        quantity: 20 + index as i64 * 5,
                        loose_quantity: pack_size.map_or(0, |size| size / 2),
                        sell_price: *price,
                        buy_price: price * 7 / 10,
                        mrp: price * 12 / 10,
                    },
                )
                .await
                .with_context(|| format!("failed to create {} batch for {}", kind, name))?;

            println!(
                "{:<13} {:<20} batch {}  ({} packs, {} loose)",
                kind.to_string(),
                name,
                batch.id,
                batch.available_quantity,
                batch.available_loose_quantity
            );
        }
    }

    db.close().await;
    info!(products = CATALOG.len(), "Seed complete");
    Ok(())
}

/// Returns `None` when only help was requested.
fn parse_args() -> Result<Option<Args>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./stockline_dev.db");
    let mut tenant = String::from("t1");
    let mut org = String::from("o1");
    let mut branch = String::from("b1");

    let mut i = 1;
    while i < args.len() {
        let value = || {
            args.get(i + 1)
                .cloned()
                .with_context(|| format!("{} needs a value", args[i]))
        };
        match args[i].as_str() {
            "--db" | "-d" => {
                db_path = value()?;
                i += 1;
            }
            "--tenant" => {
                tenant = value()?;
                i += 1;
            }
            "--org" => {
                org = value()?;
                i += 1;
            }
            "--branch" => {
                branch = value()?;
                i += 1;
            }
            "--help" | "-h" => {
                println!("Stockline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./stockline_dev.db)");
                println!("      --tenant <ID>    Tenant id (default: t1)");
                println!("      --org <ID>       Organisation id (default: o1)");
                println!("      --branch <ID>    Branch id (default: b1)");
                println!("  -h, --help           Show this help message");
                return Ok(None);
            }
            other => anyhow::bail!("unknown argument '{}'", other),
        }
        i += 1;
    }

    Ok(Some(Args {
        db_path,
        scope: Scope::organisation(tenant, org).with_branch(branch),
    }))
}
