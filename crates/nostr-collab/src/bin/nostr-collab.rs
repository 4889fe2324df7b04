use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nostr_collab::{
    decode_naddr, CachedNip05Lookup, CollabConfig, CreateRequest, DocumentProtocol, FieldTemplate,
    HttpNip05Lookup, IdentifierResolver, KeysSigner, NostrRelayClient, RelayStore,
    SkippedCollaborator, KIND_ARTICLE,
};

#[derive(Debug, Parser)]
#[command(name = "nostr-collab")]
#[command(about = "Create, fetch and update collaborative Nostr documents")]
struct Args {
    /// Relay URL; repeatable. Overrides NOSTR_RELAYS and the stored list.
    #[arg(long, global = true)]
    relay: Vec<String>,
    /// Secret key (hex or nsec). Falls back to NOSTR_SECRET_KEY.
    #[arg(long, global = true)]
    key: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// SQLite file holding the user's relay list.
    #[arg(long, global = true, env = "NOSTR_COLLAB_RELAY_DB")]
    relay_db: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish a pointer and the first version of a document.
    Create {
        #[arg(long, default_value_t = KIND_ARTICLE)]
        kind: u16,
        /// JSON field template: {"content": .., "title": .., "tags": [[..]]}
        #[arg(long)]
        template: PathBuf,
        /// Hex pubkey, npub or NIP-05 identifier; repeatable.
        #[arg(long)]
        collaborator: Vec<String>,
        #[arg(long)]
        identifier: Option<String>,
    },
    /// Print the current version of a document.
    Fetch { naddr: String },
    /// Publish a new version of a document.
    Update {
        naddr: String,
        #[arg(long)]
        template: PathBuf,
    },
    /// Print every version of a document, newest first.
    History { naddr: String },
    /// Replace the authorized author set (pointer publisher only).
    Authors {
        naddr: String,
        #[arg(long)]
        collaborator: Vec<String>,
    },
    /// List the documents whose pointer a user published.
    List { pubkey: String },
    /// Manage the stored relay list.
    Relays {
        #[command(subcommand)]
        action: RelayAction,
    },
}

#[derive(Debug, Subcommand)]
enum RelayAction {
    List,
    Add { url: String },
    Remove { url: String },
    Reset,
}

#[derive(Serialize)]
struct CreatedOutput<'a> {
    naddr: &'a str,
    identifier: &'a str,
    event_id: &'a str,
    skipped: &'a [SkippedCollaborator],
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let store = match &args.relay_db {
        Some(path) => Some(RelayStore::open(path)?),
        None => None,
    };

    if let Command::Relays { action } = &args.command {
        let store = store.ok_or("--relay-db (or NOSTR_COLLAB_RELAY_DB) is required")?;
        match action {
            RelayAction::List => {}
            RelayAction::Add { url } => {
                if !store.add(url)? {
                    warn!(url = %url, "Relay already present");
                }
            }
            RelayAction::Remove { url } => {
                if !store.remove(url)? {
                    warn!(url = %url, "Relay was not in the list");
                }
            }
            RelayAction::Reset => store.reset()?,
        }
        return print_json(&store.effective()?);
    }

    let config = load_config(&args, store.as_ref())?;
    let transport = Arc::new(NostrRelayClient::new(&config).await?);
    let lookup = CachedNip05Lookup::new(Arc::new(HttpNip05Lookup::new(config.timeout)?));
    let resolver = IdentifierResolver::new(Arc::new(lookup));

    let keys = config.keys()?;
    let mut protocol = DocumentProtocol::new(config, transport, resolver);
    if let Some(keys) = keys {
        protocol = protocol.with_signer(Arc::new(KeysSigner::new(keys)));
    }

    match args.command {
        Command::Create {
            kind,
            template,
            collaborator,
            identifier,
        } => {
            let mut request = CreateRequest::new(kind, read_template(&template)?)
                .collaborators(collaborator);
            request.identifier = identifier;
            let outcome = protocol.create(request).await?;
            for skipped in &outcome.skipped {
                warn!(input = %skipped.input, reason = %skipped.reason, "Collaborator skipped");
            }
            print_json(&CreatedOutput {
                naddr: &outcome.naddr,
                identifier: &outcome.pointer.identifier,
                event_id: &outcome.target.event.event_id,
                skipped: &outcome.skipped,
            })
        }
        Command::Fetch { naddr } => {
            let document = protocol.fetch(&decode_naddr(&naddr)?).await?;
            if document.current.is_none() {
                info!("No content published yet");
            }
            print_json(&document)
        }
        Command::Update { naddr, template } => {
            let published = protocol
                .update(&decode_naddr(&naddr)?, &read_template(&template)?)
                .await?;
            info!(
                event_id = %published.event.event_id,
                success = published.result.success,
                failed = published.result.failed,
                "Published update"
            );
            print_json(&published.event.event_id)
        }
        Command::History { naddr } => print_json(&protocol.history(&decode_naddr(&naddr)?).await?),
        Command::Authors {
            naddr,
            collaborator,
        } => {
            let outcome = protocol
                .set_authors(&decode_naddr(&naddr)?, &collaborator)
                .await?;
            for skipped in &outcome.skipped {
                warn!(input = %skipped.input, reason = %skipped.reason, "Collaborator skipped");
            }
            print_json(&outcome.pointer)
        }
        Command::List { pubkey } => print_json(&protocol.list_documents(&pubkey).await?),
        Command::Relays { .. } => Ok(()),
    }
}

fn load_config(
    args: &Args,
    store: Option<&RelayStore>,
) -> Result<CollabConfig, Box<dyn std::error::Error>> {
    let mut config = CollabConfig::from_env()?;
    if !args.relay.is_empty() {
        config.relays = args.relay.clone();
    } else if let Some(store) = store {
        if !store.list()?.is_empty() {
            config.relays = store.effective()?;
        }
    }
    if let Some(key) = &args.key {
        config.secret_key = Some(key.clone());
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

fn read_template(path: &Path) -> Result<FieldTemplate, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(FieldTemplate::from_json(&raw)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
