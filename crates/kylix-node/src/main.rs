//! kylix-node — the Kylix command-line surface.
//!
//! `kylix-node` is deliberately thin: it opens a `kylix-dag` store, wires
//! up `kylix-consensus` + `kylix-chain` + `kylix-queue`, and runs exactly
//! one subcommand per invocation. It is not a network node — there is no
//! P2P layer and no long-lived process; each subcommand opens the store
//! it needs, does its work, and exits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use kylix_chain::BlockchainServer;
use kylix_consensus::{ValidatorCoordinator, ValidatorCoordinatorHandle};
use kylix_core::config::KylixConfig;
use kylix_crypto::keys::KeyPair;
use kylix_crypto::{canon::{canonical_message, iso8601}, hash, sig};
use kylix_dag::{DagStore, Pattern, PersistentDagStore};
use kylix_queue::TransactionQueue;

#[derive(Parser, Debug)]
#[command(name = "kylix-node", version, about = "Kylix permissioned provenance ledger")]
struct Args {
    /// Path to a TOML config file (spec.md §6). Missing file falls back
    /// to defaults.
    #[arg(long, global = true, default_value = "kylix.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an Ed25519 identity, register its public half in the
    /// validator directory, and save the secret half locally.
    Keygen {
        /// Validator id this key will sign as (the `.pub` file stem).
        #[arg(long)]
        id: String,

        /// Where to save the secret key. Defaults to `<validators_dir>/../<id>.key`.
        #[arg(long)]
        identity: Option<PathBuf>,
    },

    /// Sign and append a single transaction directly (bypasses the queue).
    AddTransaction {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        predicate: String,
        #[arg(long)]
        object: String,
        /// Validator id to sign and append as. Defaults to the configured node id.
        #[arg(long)]
        validator: Option<String>,
        /// Path to the signing identity's secret key file.
        #[arg(long)]
        identity: PathBuf,
    },

    /// Submit a transaction to the queue and immediately drain one tick
    /// (there is no background ticker in a one-shot CLI invocation).
    Enqueue {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        predicate: String,
        #[arg(long)]
        object: String,
        #[arg(long)]
        validator: Option<String>,
        #[arg(long)]
        identity: PathBuf,
    },

    /// Query the store by exact-match triple pattern (any field omitted
    /// is a wildcard).
    Query {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        predicate: Option<String>,
        #[arg(long)]
        object: Option<String>,
    },

    /// Run a SPARQL-subset query against the store.
    Sparql {
        /// The query text, e.g. `SELECT ?s ?o WHERE { ?s "wasGeneratedBy" ?o }`.
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kylix=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    match args.command {
        Command::Keygen { id, identity } => cmd_keygen(&config, &id, identity.as_deref()),
        Command::AddTransaction {
            subject,
            predicate,
            object,
            validator,
            identity,
        } => cmd_add_transaction(&config, &subject, &predicate, &object, validator, &identity),
        Command::Enqueue {
            subject,
            predicate,
            object,
            validator,
            identity,
        } => cmd_enqueue(&config, &subject, &predicate, &object, validator, &identity).await,
        Command::Query { subject, predicate, object } => cmd_query(&config, subject, predicate, object),
        Command::Sparql { query } => cmd_sparql(&config, &query),
    }
}

fn load_config(path: &Path) -> anyhow::Result<KylixConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => KylixConfig::from_toml(&text)
            .with_context(|| format!("parsing config file {}", path.display())),
        Err(_) => {
            info!(path = %path.display(), "no config file found, using defaults");
            Ok(KylixConfig::default())
        }
    }
}

/// Build the validator set for this invocation: every `.pub` file found
/// under `config.validators_dir`, seeded without vouching (spec.md §4.1
/// "Startup"). A fresh node with an empty directory starts with no
/// validators until `keygen` populates it.
fn bootstrap_validators(config: &KylixConfig) -> anyhow::Result<ValidatorCoordinatorHandle> {
    let validators_dir = PathBuf::from(&config.validators_dir);
    std::fs::create_dir_all(&validators_dir)
        .with_context(|| format!("creating validators dir {}", validators_dir.display()))?;
    let mut coordinator = ValidatorCoordinator::new(validators_dir.clone(), config.performance_window_size);
    let keys = sig::load_public_keys(&validators_dir)
        .with_context(|| format!("loading validator keys from {}", validators_dir.display()))?;
    for (id, pk) in keys {
        coordinator.seed_validator(id, pk);
    }
    Ok(ValidatorCoordinatorHandle::new(coordinator))
}

fn load_identity(path: &Path) -> anyhow::Result<KeyPair> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading identity key {}", path.display()))?;
    let secret: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("identity key at {} is not 32 bytes", path.display()))?;
    Ok(KeyPair::from_bytes(&secret))
}

fn cmd_keygen(config: &KylixConfig, id: &str, identity: Option<&Path>) -> anyhow::Result<()> {
    let validators_dir = PathBuf::from(&config.validators_dir);
    std::fs::create_dir_all(&validators_dir)
        .with_context(|| format!("creating validators dir {}", validators_dir.display()))?;
    let pub_path = validators_dir.join(format!("{id}.pub"));
    if pub_path.exists() {
        anyhow::bail!(
            "validator key {} already exists, delete it first to regenerate",
            pub_path.display()
        );
    }

    let kp = KeyPair::generate();
    std::fs::write(&pub_path, kp.public_key_bytes())
        .with_context(|| format!("writing {}", pub_path.display()))?;

    let identity_path = identity
        .map(Path::to_path_buf)
        .unwrap_or_else(|| validators_dir.join(format!("{id}.key")));
    if let Some(parent) = identity_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&identity_path, kp.secret_key_bytes().as_slice())
        .with_context(|| format!("writing {}", identity_path.display()))?;

    println!("Validator id:  {id}");
    println!("Public key:    {}", hex::encode(kp.public_key_bytes()));
    println!("Public file:   {}", pub_path.display());
    println!("Identity file: {}", identity_path.display());
    println!("\nBack up the identity file. Loss means this validator can no longer sign.");
    Ok(())
}

fn cmd_add_transaction(
    config: &KylixConfig,
    subject: &str,
    predicate: &str,
    object: &str,
    validator: Option<String>,
    identity: &Path,
) -> anyhow::Result<()> {
    let validator = validator
        .or_else(|| config.resolved_node_id())
        .ok_or_else(|| anyhow::anyhow!("no --validator given and no node_id configured"))?;
    let kp = load_identity(identity)?;

    let handle = bootstrap_validators(config)?;
    if !handle.contains(&validator) {
        anyhow::bail!("validator {validator} is not registered in {}", config.validators_dir);
    }

    let store = PersistentDagStore::open(&config.db_path)
        .with_context(|| format!("opening store at {}", config.db_path))?;
    let server = BlockchainServer::new(store, handle);

    // The admission pipeline mints its own timestamp (spec.md §4.4 step 5);
    // signing against `iso8601(Utc::now())` here, immediately before the
    // call, lands on the same whole second in the common case.
    let canonical = canonical_message(subject, predicate, object, &validator, &iso8601(chrono::Utc::now()));
    let digest = hash::sha256(canonical.as_bytes());
    let signature = kp.sign(&digest);

    let id = server
        .add_transaction(subject, predicate, object, &validator, &signature)
        .context("rejected by admission pipeline")?;
    println!("Appended {id}");
    Ok(())
}

async fn cmd_enqueue(
    config: &KylixConfig,
    subject: &str,
    predicate: &str,
    object: &str,
    validator: Option<String>,
    identity: &Path,
) -> anyhow::Result<()> {
    let validator = validator
        .or_else(|| config.resolved_node_id())
        .ok_or_else(|| anyhow::anyhow!("no --validator given and no node_id configured"))?;
    let kp = load_identity(identity)?;

    let handle = bootstrap_validators(config)?;
    if !handle.contains(&validator) {
        anyhow::bail!("validator {validator} is not registered in {}", config.validators_dir);
    }

    let store = PersistentDagStore::open(&config.db_path)
        .with_context(|| format!("opening store at {}", config.db_path))?;
    let server = Arc::new(BlockchainServer::new(store, handle.clone()));
    let queue = TransactionQueue::new(server, handle);

    // As in `cmd_add_transaction`, the queue's dispatch mints the timestamp
    // the pipeline actually checks the signature against.
    let canonical = canonical_message(subject, predicate, object, &validator, &iso8601(chrono::Utc::now()));
    let digest = hash::sha256(canonical.as_bytes());
    let signature = kp.sign(&digest);

    let reference = queue.submit(subject, predicate, object, &validator, signature);
    queue.process_tick().await;

    match queue.get_transaction_status(&reference) {
        Some(status) => println!("{reference}: {status:?}"),
        None => println!("{reference}: status unavailable"),
    }
    Ok(())
}

fn cmd_query(
    config: &KylixConfig,
    subject: Option<String>,
    predicate: Option<String>,
    object: Option<String>,
) -> anyhow::Result<()> {
    let mut store = PersistentDagStore::open(&config.db_path)
        .with_context(|| format!("opening store at {}", config.db_path))?;
    let pattern = Pattern::new(subject, predicate, object);
    let rows = store.query(&pattern).context("query failed")?;
    if rows.is_empty() {
        println!("(no matches)");
    }
    for (id, node, edges) in rows {
        println!(
            "{id}  {} {} {}  validator={}  edges={}",
            node.subject,
            node.predicate,
            node.object,
            node.validator,
            edges.len()
        );
    }
    Ok(())
}

fn cmd_sparql(config: &KylixConfig, query: &str) -> anyhow::Result<()> {
    let mut store = PersistentDagStore::open(&config.db_path)
        .with_context(|| format!("opening store at {}", config.db_path))?;
    let plan = kylix_sparql::parse(query).map_err(|e| anyhow::anyhow!("{e}"))?;
    let rows = kylix_sparql::execute(&mut store, &plan).map_err(|e| anyhow::anyhow!("{e}"))?;
    if rows.is_empty() {
        println!("(no matches)");
    }
    for row in rows {
        print_row(&row);
    }
    Ok(())
}

fn print_row(row: &HashMap<String, Option<String>>) {
    let mut keys: Vec<&String> = row.keys().collect();
    keys.sort();
    let rendered: Vec<String> = keys
        .into_iter()
        .map(|k| format!("{k}={}", row[k].as_deref().unwrap_or("null")))
        .collect();
    println!("{}", rendered.join("  "));
}
