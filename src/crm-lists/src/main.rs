//! crm-lists — admin tool for contact list segmentation.
//!
//! Loads a JSON fixture of contacts and list definitions into the in-memory
//! engine and reports list sizes, recipients or ad-hoc criteria matches.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crm_core::config::AppConfig;
use crm_core::Contact;
use crm_segmentation::refresh::spawn_periodic_recount;
use crm_segmentation::{
    matches, to_store_query, ContactQuery, ContactStore, Criteria, InMemoryContactStore,
    ListInput, ListRegistry,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "crm-lists")]
#[command(about = "Static and dynamic contact list segmentation")]
#[command(version)]
struct Cli {
    /// JSON fixture with `contacts` and `lists`
    #[arg(long, env = "CRM_LISTS__FIXTURE")]
    fixture: PathBuf,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Owner scope for lists that do not name one (overrides config)
    #[arg(long, env = "CRM_LISTS__SEGMENTATION__DEFAULT_OWNER")]
    owner: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create every list and print fresh counts
    Recount {
        /// Include lists carrying the reserved pseudo-list name
        #[arg(long, default_value_t = false)]
        include_reserved: bool,
    },
    /// Print one list and its recipients
    Show { name: String },
    /// Evaluate a criteria object against the fixture contacts
    Evaluate {
        /// Criteria JSON, e.g. '{"status": "lead"}'
        #[arg(long)]
        criteria: String,
    },
    /// Recount periodically until interrupted
    Watch {
        /// Seconds between passes (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    lists: Vec<ListInput>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_lists=info,crm_segmentation=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(owner) = cli.owner {
        config.segmentation.default_owner = owner;
    }

    let raw = std::fs::read_to_string(&cli.fixture)
        .with_context(|| format!("reading fixture {}", cli.fixture.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw).context("parsing fixture")?;
    info!(
        node_id = %config.node_id,
        contacts = fixture.contacts.len(),
        lists = fixture.lists.len(),
        "fixture loaded"
    );

    let contacts = fixture.contacts.clone();
    let store = Arc::new(InMemoryContactStore::with_contacts(fixture.contacts));
    let registry = Arc::new(ListRegistry::new(store.clone(), config.segmentation.clone()));
    for input in fixture.lists {
        let name = input.name.clone();
        registry
            .create_list(input)
            .with_context(|| format!("creating list '{name}'"))?;
    }
    let owner = config.segmentation.default_owner.clone();

    match cli.command {
        Command::Recount { include_reserved } => {
            let report = registry.recount_all();
            let mut rows = Vec::new();
            for list in registry.list_lists(&owner, !include_reserved) {
                let row = match report.results.get(&list.id) {
                    Some(Err(e)) => json!({
                        "id": list.id,
                        "name": list.name,
                        "type": list.list_type(),
                        "contact_count": list.contact_count,
                        "error": e.to_string(),
                    }),
                    _ => json!({
                        "id": list.id,
                        "name": list.name,
                        "type": list.list_type(),
                        "contact_count": list.contact_count,
                    }),
                };
                rows.push(row);
            }
            let all = registry.all_contacts()?;
            let output = json!({ "all_contacts": all, "lists": rows });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Show { name } => {
            let Some(list) = registry.find_by_name(&owner, &name) else {
                bail!("no list named '{name}' for owner '{owner}'");
            };
            let recipients = registry.resolve_recipients(list.id)?;
            let output = json!({ "list": list, "recipients": recipients });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Evaluate { criteria } => {
            let criteria: Criteria =
                serde_json::from_str(&criteria).context("parsing criteria")?;
            let matched: Vec<&Contact> = contacts.iter().filter(|c| matches(c, &criteria)).collect();
            let store_count = store.count_contacts(&to_store_query(ContactQuery::all(), &criteria))?;
            if matched.len() as u64 != store_count {
                warn!(
                    in_memory = matched.len(),
                    store = store_count,
                    "evaluation paths disagree"
                );
            }
            let output = json!({
                "criteria": criteria,
                "in_memory_count": matched.len(),
                "store_count": store_count,
                "contacts": matched,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Watch { interval } => {
            let secs = interval
                .or(config.segmentation.refresh_interval_secs)
                .unwrap_or(60);
            let handle = spawn_periodic_recount(registry.clone(), Duration::from_secs(secs));
            tokio::signal::ctrl_c().await?;
            handle.abort();
            info!("watch stopped");
        }
    }

    Ok(())
}
