use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::{StreamExt, TryStreamExt};
use rust_decimal::Decimal;
use serde_json::json;

use stockledger_core::{ProductId, StorageId};
use stockledger_infra::{LedgerConfig, MovementFilter, PostgresLedgerStore, StockLedger};
use stockledger_inventory::{RecordMovement, Transfer};

/// Operator tool for the stock ledger.
///
/// Reads `stockledger.toml` and `STOCKLEDGER__*` variables (or `DATABASE_URL`).
#[derive(Parser)]
#[command(name = "stockledger", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the ledger tables if missing
    Migrate,
    /// Print current stock, overall or for one storage
    Stock {
        product_id: ProductId,
        storage_id: Option<StorageId>,
    },
    /// Print a product's movements as JSON lines
    Movements {
        product_id: ProductId,
        #[arg(long)]
        storage: Option<StorageId>,
        #[arg(long)]
        include_deleted: bool,
        #[arg(long)]
        newest_first: bool,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Record one movement
    Record {
        product_id: ProductId,
        storage_id: StorageId,
        /// `in` or `out`
        direction: String,
        /// Movement type, e.g. purchase, sale, adjust
        kind: String,
        quantity: Decimal,
        #[arg(long)]
        unit_cost: Option<Decimal>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Move stock from one storage to another
    Transfer {
        product_id: ProductId,
        from: StorageId,
        to: StorageId,
        quantity: Decimal,
        #[arg(long)]
        note: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = LedgerConfig::load().context("failed to load configuration")?;
    stockledger_observability::init(&config.log);

    let store = PostgresLedgerStore::connect(&config.database)
        .await
        .context("failed to connect to the database")?;

    let ledger = StockLedger::new(store);
    match cli.command {
        Commands::Migrate => {
            ledger
                .store()
                .apply_schema()
                .await
                .context("failed to apply schema")?;
            tracing::info!("schema applied");
        }
        Commands::Stock {
            product_id,
            storage_id,
        } => print_stock(&ledger, product_id, storage_id).await?,
        Commands::Movements {
            product_id,
            storage,
            include_deleted,
            newest_first,
            limit,
        } => {
            let mut filter = MovementFilter::for_product(product_id);
            if let Some(storage_id) = storage {
                filter = filter.in_storage(storage_id);
            }
            if include_deleted {
                filter = filter.with_deleted();
            }
            if newest_first {
                filter = filter.newest_first();
            }

            let mut movements = ledger
                .list_movements(filter)
                .take(limit.unwrap_or(usize::MAX));
            while let Some(movement) = movements.try_next().await? {
                println!("{}", serde_json::to_string(&movement)?);
            }
        }
        Commands::Record {
            product_id,
            storage_id,
            direction,
            kind,
            quantity,
            unit_cost,
            note,
        } => {
            let mut command =
                RecordMovement::new(product_id, storage_id, direction, kind, quantity);
            command.unit_cost = unit_cost;
            command.note = note;
            let movement = ledger.record_movement(command).await?;
            println!("{}", serde_json::to_string_pretty(&movement)?);
        }
        Commands::Transfer {
            product_id,
            from,
            to,
            quantity,
            note,
        } => {
            let mut transfer = Transfer::new(product_id, from, to, quantity);
            transfer.note = note;
            let receipt = ledger.transfer(transfer).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
    }

    Ok(())
}

async fn print_stock(
    ledger: &StockLedger<PostgresLedgerStore>,
    product_id: ProductId,
    storage_id: Option<StorageId>,
) -> anyhow::Result<()> {
    let totals = ledger.stock_totals(product_id, storage_id).await?;

    let mut report = json!({
        "product_id": product_id,
        "storage_id": storage_id,
        "on_hand": totals.on_hand(),
        "inbound": totals.inbound,
        "outbound": totals.outbound,
        "average_inbound_cost": totals.average_inbound_cost(),
    });

    if storage_id.is_none() {
        let levels = ledger.stock_by_storage(product_id).await?;
        report["storages"] = levels
            .iter()
            .map(|level| json!({ "storage_id": level.storage_id, "on_hand": level.quantity() }))
            .collect();
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
