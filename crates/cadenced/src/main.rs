//! cadenced - follow-up scheduling for a small-business CRM
//!
//! One binary for both surfaces:
//! - `cadenced run` keeps the sweep going: due notifications and
//!   auto-suspension of long-overdue clients
//! - every other subcommand is a single user action against the client store

use anyhow::{Context, Result};
use cadence_api::{ClientListing, ClientRecord, ClientType, NewClient};
use cadence_config::{load_config_or_default, NotificationPolicy, NotifierBackend, Policy};
use cadence_core::{
    deliver_events, ActionOutcome, FollowUpEngine, FollowUpScheduler, Precision, SchedulerHandle,
};
use cadence_notify::{CommandNotifier, LogNotifier, Notifier};
use cadence_store::{AuditEvent, AuditEventType, ClientStore, SqliteStore, Store};
use cadence_util::{default_config_path, format_datetime_full, ClientId, DATABASE_FILENAME};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// cadenced - client follow-up scheduler
#[derive(Parser, Debug)]
#[command(name = "cadenced", version)]
#[command(about = "Client follow-up scheduling with due notifications", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/cadence/config.toml)
    #[arg(short, long, global = true, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set CADENCE_DATA_DIR env var)
    #[arg(short, long, global = true, env = "CADENCE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sweep service until interrupted
    Run,

    /// Create a client
    Add {
        /// Company name
        company: String,

        #[arg(long, default_value = "")]
        phone: String,

        #[arg(long)]
        country_code: Option<String>,

        #[arg(long, default_value = "")]
        industry: String,

        /// 0-5
        #[arg(long, default_value_t = 0)]
        rating: u8,

        /// A, B, C or D
        #[arg(long = "type")]
        client_type: Option<ClientType>,
    },

    /// Import clients from a JSON array, skipping known phone numbers
    Import { file: PathBuf },

    /// List clients, active first
    List {
        /// Filter by company name or phone
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show one client
    Show { id: ClientId },

    /// Register a call and schedule the next follow-up
    Call { id: ClientId },

    /// Move the follow-up (default offset when --at is omitted)
    Reschedule {
        id: ClientId,

        /// RFC 3339 or local YYYY-MM-DDTHH:MM
        #[arg(long)]
        at: Option<String>,
    },

    /// Freeze the countdown
    Pause { id: ClientId },

    /// Restart a paused countdown
    Resume { id: ClientId },

    /// Remove the follow-up
    Clear { id: ClientId },

    /// Delete a client
    Delete { id: ClientId },

    /// Run a single sweep now and deliver its notifications
    Sweep,

    /// Show recent audit events
    Audit {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

/// Everything a command needs
struct App {
    policy: Policy,
    store: Arc<dyn Store>,
    engine: FollowUpEngine,
    json: bool,
}

impl App {
    fn open(args: &Args) -> Result<Self> {
        let policy = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(DATABASE_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        debug!(db_path = %db_path.display(), "Store initialized");

        let clients = Arc::new(ClientStore::open(store.clone()).context("Failed to load clients")?);
        let engine = FollowUpEngine::new(clients, policy.follow_up);

        Ok(Self {
            policy,
            store,
            engine,
            json: args.json,
        })
    }

    fn clients(&self) -> &Arc<ClientStore> {
        self.engine.clients()
    }

    fn print<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", human());
        }
        Ok(())
    }

    fn print_record(&self, record: &ClientRecord) -> Result<()> {
        self.print(record, || describe(record))
    }

    fn print_outcome(&self, outcome: ActionOutcome, noop: &str) -> Result<()> {
        if !outcome.is_applied() && !self.json {
            println!("{}", noop);
        }
        self.print_record(outcome.record())
    }

    async fn execute(&self, command: Command) -> Result<()> {
        let now = cadence_util::now();

        match command {
            Command::Run => self.run().await,

            Command::Add {
                company,
                phone,
                country_code,
                industry,
                rating,
                client_type,
            } => {
                let record = self.engine.create_client(NewClient {
                    company_name: company,
                    country_code,
                    phone_number: phone,
                    industry,
                    rating,
                    client_type,
                })?;
                self.print_record(&record)
            }

            Command::Import { file } => {
                let content = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {:?}", file))?;
                let new_clients: Vec<NewClient> = serde_json::from_str(&content)
                    .with_context(|| format!("{:?} is not a JSON array of clients", file))?;

                let summary = self.engine.import_clients(new_clients)?;
                #[derive(Serialize)]
                struct Imported {
                    imported: usize,
                    skipped: usize,
                }
                self.print(
                    &Imported {
                        imported: summary.imported,
                        skipped: summary.skipped,
                    },
                    || {
                        format!(
                            "Imported {} clients ({} skipped as duplicates)",
                            summary.imported, summary.skipped
                        )
                    },
                )
            }

            Command::List { search } => {
                let listing = self
                    .engine
                    .listing(search.as_deref(), now, Precision::Abbreviated);
                self.print(&listing, || render_listing(&listing))
            }

            Command::Show { id } => {
                let record = self.clients().get(&id)?;
                self.print_record(&record)
            }

            Command::Call { id } => {
                let record = self.engine.register_call(&id, now)?;
                self.print_record(&record)
            }

            Command::Reschedule { id, at } => {
                let record = self.engine.reschedule_from_input(&id, at.as_deref(), now)?;
                self.print_record(&record)
            }

            Command::Pause { id } => {
                let outcome = self.engine.pause(&id, now)?;
                self.print_outcome(outcome, "Nothing to pause")
            }

            Command::Resume { id } => {
                let outcome = self.engine.resume(&id, now)?;
                self.print_outcome(outcome, "Follow-up is not paused")
            }

            Command::Clear { id } => {
                let outcome = self.engine.delete_follow_up(&id)?;
                self.print_outcome(outcome, "No follow-up to clear")
            }

            Command::Delete { id } => {
                let removed = self.engine.delete_client(&id)?;
                self.print(&removed, || format!("Deleted {} ({})", removed.company_name, removed.id))
            }

            Command::Sweep => {
                let mut scheduler =
                    FollowUpScheduler::new(self.clients().clone(), self.policy.follow_up, now);
                let events = scheduler.sweep(now);
                let notifier = build_notifier(&self.policy.notifications);
                let delivered =
                    deliver_events(notifier.as_ref(), &events, &self.policy.notifications.title)
                        .await;

                self.print(&events, || {
                    let mut out = format!(
                        "Sweep: {} events, {} notifications delivered",
                        events.len(),
                        delivered
                    );
                    for event in &events {
                        out.push_str(&format!("\n  {:?}", event));
                    }
                    out
                })
            }

            Command::Audit { limit } => {
                let events = self.store.get_recent_audits(limit)?;
                self.print(&events, || {
                    events
                        .iter()
                        .map(|e| {
                            format!(
                                "{:>6}  {}  {}",
                                e.id,
                                format_datetime_full(&e.timestamp),
                                serde_json::to_string(&e.event).unwrap_or_default()
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            }
        }
    }

    async fn run(&self) -> Result<()> {
        self.store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let scheduler = FollowUpScheduler::new(
            self.clients().clone(),
            self.policy.follow_up,
            cadence_util::now(),
        );
        let notifier = build_notifier(&self.policy.notifications);
        let handle = SchedulerHandle::start(
            scheduler,
            notifier,
            self.policy.scheduler,
            self.policy.notifications.title.clone(),
        );

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        info!(clients = self.clients().len(), "Service running");

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
        }

        handle.stop().await;

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }
}

fn build_notifier(policy: &NotificationPolicy) -> Arc<dyn Notifier> {
    match &policy.backend {
        NotifierBackend::Log => Arc::new(LogNotifier),
        NotifierBackend::Command { program, args } => {
            Arc::new(CommandNotifier::new(program.clone(), args.clone()))
        }
    }
}

fn describe(record: &ClientRecord) -> String {
    let now = cadence_util::now();
    let clock = cadence_core::FollowUpClock::from_record(record);
    let next = record
        .next_follow_up_date
        .map(|d| format_datetime_full(&d))
        .unwrap_or_else(|| "-".into());
    let last_call = record
        .last_call()
        .map(|c| format_datetime_full(&c.timestamp))
        .unwrap_or_else(|| "-".into());

    format!(
        "{} ({})\n  phone:      {} {}\n  status:     {}\n  follow-up:  {} [{}]\n  last call:  {} ({} total)",
        record.company_name,
        record.id,
        record.country_code,
        record.phone_number,
        record.status,
        next,
        clock.remaining_label(now, Precision::Full),
        last_call,
        record.follow_ups.len()
    )
}

fn render_listing(listing: &ClientListing) -> String {
    if listing.is_empty() {
        return "No clients".into();
    }

    let mut out = String::new();
    for (title, rows) in [("Active", &listing.active), ("Suspended", &listing.suspended)] {
        if rows.is_empty() {
            continue;
        }
        out.push_str(&format!("{} ({})\n", title, rows.len()));
        for row in rows {
            out.push_str(&format!(
                "  {:<36}  {:<24}  {:<18}  {}\n",
                row.id, row.company_name, row.phone, row.remaining
            ));
        }
    }
    out.trim_end().to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    debug!(version = env!("CARGO_PKG_VERSION"), "cadenced starting");

    if cadence_util::is_mock_time_active() {
        warn!(now = %cadence_util::now(), "Mock time is active");
    }

    let app = App::open(&args)?;
    app.execute(args.command).await
}
