use anyhow::Result;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pantry::db::PgDocumentStore;
use pantry::expiry::HttpExpiryPredictor;
use pantry::list_config::ListConfig;
use pantry::reconcile::{aggregate_shopping_items, ListService};
use pantry::store::{DocumentStore, InMemoryStore, StaticIdentity};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (LOG_FORMAT=json for structured output)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting pantry");

    // Load configuration from the environment / .env file
    let config = ListConfig::from_env();

    // Pick the document store
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            info!("Using Postgres document store");
            Arc::new(PgDocumentStore::connect(url).await?)
        }
        None => {
            warn!("DATABASE_URL not set, documents are kept in memory");
            Arc::new(InMemoryStore::new())
        }
    };

    let user_id = env::var("LIST_USER_ID").unwrap_or_else(|_| "local".to_string());
    let identity = Arc::new(StaticIdentity::new(&user_id));

    let mut service = ListService::new(store, identity, config.clone());
    if let Some(endpoint) = &config.expiry_endpoint {
        let predictor = HttpExpiryPredictor::new(endpoint, config.prediction_timeout_secs)?;
        service = service.with_predictor(Arc::new(predictor));
    }

    // Print both lists
    let shopping = aggregate_shopping_items(&service.shopping_items().await?);
    println!("Shopping list ({} items)", shopping.len());
    for item in &shopping {
        let mark = if item.is_fully_checked() { "x" } else { " " };
        println!("  [{}] {}", mark, item);
    }

    let inventory = service.inventory_items().await?;
    println!("Inventory ({} items)", inventory.len());
    for item in &inventory {
        println!(
            "  {} ({} of {} available)",
            item,
            item.available_units(),
            item.total_units_represented()
        );
    }

    Ok(())
}
