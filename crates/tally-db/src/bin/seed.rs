//! # Seed Data Generator
//!
//! Populates the database with a small bar catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! For each catalog entry:
//! - A product with opening stock and a day-zero snapshot
//! - A "Full Bottle" variant (conversion factor 1.00)
//! - For spirits, a "Tot" variant (conversion factor 0.10)

use chrono::Utc;
use std::env;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tally_core::{
    DailySnapshot, EntityStatus, Money, Product, ProductVariant, Quantity,
    DEFAULT_MIN_STOCK_LEVEL,
};
use tally_db::{Database, DbConfig};

/// (name, category, buying price cents, bottle price cents, tot price cents, opening stock hundredths)
/// A tot price of zero means the product is not sold by the tot.
const CATALOG: &[(&str, &str, i64, i64, i64, i64)] = &[
    ("Jameson 750ml", "Whiskey", 180000, 250000, 25000, 1200),
    ("Johnnie Walker Black 750ml", "Whiskey", 250000, 320000, 30000, 800),
    ("Grants 750ml", "Whiskey", 130000, 180000, 20000, 600),
    ("Smirnoff Vodka 750ml", "Vodka", 95000, 140000, 15000, 1000),
    ("Gilbeys Gin 750ml", "Gin", 85000, 130000, 15000, 900),
    ("Captain Morgan 750ml", "Rum", 90000, 135000, 15000, 500),
    ("Tusker Lager 500ml", "Beer", 15000, 25000, 0, 4800),
    ("White Cap 500ml", "Beer", 15000, 25000, 0, 3600),
    ("Guinness 500ml", "Beer", 17000, 28000, 0, 2400),
    ("4th Street Sweet Red 750ml", "Wine", 75000, 110000, 0, 700),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Stock Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tally Stock Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("Connected, migrations applied");

    let existing = db.products().count_active().await?;
    if existing > 0 {
        println!("Database already has {} products", existing);
        println!("Skipping seed to avoid duplicates.");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    println!("Seeding catalog...");

    let today = Utc::now().date_naive();
    let mut seeded = 0;

    for (name, category, buying, bottle_price, tot_price, opening) in CATALOG {
        let now = Utc::now();
        let opening_stock = Quantity::from_hundredths(*opening);

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: (*name).to_string(),
            category: (*category).to_string(),
            base_unit: "bottle".to_string(),
            buying_price: Money::from_cents(*buying),
            current_stock: opening_stock,
            min_stock_level: DEFAULT_MIN_STOCK_LEVEL,
            status: EntityStatus::Active,
            created_at: now,
            last_stock_update: now,
        };

        db.products().insert(&product).await?;

        let bottle = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            size_label: "Full Bottle".to_string(),
            selling_price: Money::from_cents(*bottle_price),
            conversion_factor: Quantity::from_units(1),
            sort_order: 0,
            status: EntityStatus::Active,
            created_at: now,
        };
        db.variants().insert(&bottle).await?;

        if *tot_price > 0 {
            let tot = ProductVariant {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                size_label: "Tot".to_string(),
                selling_price: Money::from_cents(*tot_price),
                conversion_factor: Quantity::from_hundredths(10),
                sort_order: 1,
                status: EntityStatus::Active,
                created_at: now,
            };
            db.variants().insert(&tot).await?;
        }

        if opening_stock.is_positive() {
            let snapshot = DailySnapshot {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                date: today,
                opening_stock,
                additions: Quantity::zero(),
                sales_quantity: Quantity::zero(),
                closing_stock: opening_stock,
                updated_by: None,
                updated_at: now,
            };
            db.snapshots().insert(&snapshot).await?;
        }

        seeded += 1;
        println!("  {} ({}) opening {}", name, category, opening_stock);
    }

    println!();
    println!("Seeded {} products", seeded);

    Ok(())
}
