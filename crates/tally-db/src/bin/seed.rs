//! # Seed Data Generator
//!
//! Populates a database with a small stationery catalogue and a few
//! sample bills for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path, skip sample bills
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --no-bills
//! ```
//!
//! The bills exercise every status: one stays `PAID`, one is partially
//! returned and one fully returned.

use std::env;

use tally_core::{Money, NewBill, NewBillItem, NewProduct, Product};
use tally_db::{Database, DbConfig};

/// (name, quantity, price, purchase price)
const CATALOGUE: &[(&str, i64, i64, i64)] = &[
    ("Pen", 100, 1_000, 600),
    ("Pencil", 250, 300, 120),
    ("Eraser", 80, 250, 100),
    ("Notebook A5", 60, 4_500, 3_000),
    ("Notebook A4", 40, 6_500, 4_200),
    ("Stapler", 15, 12_000, 8_500),
    ("Staples 24/6", 90, 1_500, 900),
    ("Glue Stick", 70, 1_800, 1_100),
    ("Ruler 30cm", 45, 900, 500),
    ("Highlighter", 120, 1_200, 700),
    ("Sticky Notes", 75, 2_200, 1_400),
    ("Marker", 0, 1_600, 1_000),
    ("2B Lead Refill", 150, 400, 200),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");
    let mut with_bills = true;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--no-bills" => with_bills = false,
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("      --no-bills     Only create products");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating products...");

    let mut products: Vec<Product> = Vec::with_capacity(CATALOGUE.len());
    for (name, quantity, price, cost) in CATALOGUE {
        let input = NewProduct {
            name: name.to_string(),
            quantity: *quantity,
            price: Money::from_cents(*price),
            purchase_price: Money::from_cents(*cost),
        };

        match db.products().create(&input).await {
            Ok(product) => products.push(product),
            Err(e) => eprintln!("Failed to insert {}: {}", name, e),
        }
    }
    println!("✓ Created {} products", products.len());

    if with_bills && products.len() >= 3 {
        println!();
        println!("Creating sample bills...");

        let paid = db
            .bills()
            .save_bill(&cart(Some("Ayesha"), &[(&products[0], 10), (&products[1], 5)]))
            .await?;
        println!("  {} {} {}", paid.id, paid.status, paid.total_amount());

        let partial = db
            .bills()
            .save_bill(&cart(None, &[(&products[0], 10)]))
            .await?;
        let partial = db
            .returns()
            .return_bill_item(&partial.items[0].id, 4)
            .await?;
        println!("  {} {} {}", partial.id, partial.status, partial.total_amount());

        let returned = db
            .bills()
            .save_bill(&cart(Some("Bilal"), &[(&products[2], 2)]))
            .await?;
        let returned = db.returns().return_bill_full(&returned.id).await?;
        println!("  {} {} {}", returned.id, returned.status, returned.total_amount());

        println!("✓ Created 3 bills");
    }

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Builds a cart charging each product's effective price.
fn cart(customer: Option<&str>, lines: &[(&Product, i64)]) -> NewBill {
    let items: Vec<NewBillItem> = lines
        .iter()
        .map(|(product, quantity)| NewBillItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity: *quantity,
            price: product.effective_price(),
            total: product.effective_price() * *quantity,
        })
        .collect();

    NewBill {
        customer_name: customer.map(str::to_string),
        total_amount: items.iter().map(|item| item.total).sum(),
        items,
    }
}
