use stock_ledger::domain::model::{schema_for, EntityKind};
use stock_ledger::infra::config::{AppConfig, StorageBackend};
use stock_ledger::{PgRowStore, RowStore};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--apply-schema]\n\
         \n\
         Requires env vars:\n\
           DATABASE_URL (when STORAGE=postgres, the default)\n\
         Optional:\n\
           STORAGE, BIND_ADDR, DB_MAX_CONNECTIONS, APP_NAME, LOG_LEVEL, LOG_FORMAT\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let apply_schema = args.iter().any(|a| a == "--apply-schema");

    let config = AppConfig::from_env()?;
    println!("> Preflight:");
    println!("  BIND_ADDR={}", config.bind_addr);
    println!("  APP_NAME={}", config.app_name);
    println!("  LOG_LEVEL={} LOG_FORMAT={}", config.logging.level, config.logging.format);

    let database_url = match &config.storage {
        StorageBackend::Memory => {
            println!("  STORAGE=memory (nothing to check)");
            println!("> Preflight OK.");
            return Ok(());
        }
        StorageBackend::Postgres { database_url } => database_url,
    };
    println!("  STORAGE=postgres DB_MAX_CONNECTIONS={}", config.max_connections);

    let store = PgRowStore::connect(database_url, config.max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("Could not connect to DATABASE_URL: {}", e))?;
    store.ping().await?;
    println!("  Database is reachable.");

    if apply_schema {
        store.ensure_schema().await?;
        println!("  Schema applied.");
    }

    let existing = store.existing_tables().await?;
    let mut missing = Vec::new();
    for kind in EntityKind::ALL {
        let table = schema_for(kind).table;
        if existing.iter().any(|t| t == table) {
            println!("  table {:<10} present", table);
        } else {
            println!("  table {:<10} MISSING", table);
            missing.push(table);
        }
    }
    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "Missing tables: {}. Re-run with --apply-schema (or start api_server once)",
            missing.join(", ")
        ));
    }

    println!("> Preflight OK.");
    Ok(())
}
