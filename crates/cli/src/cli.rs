use crate::config::{AppConfig, confique_app_config_layer::AppConfigLayer, expand_home_in_path};
use crate::keys;

use anyhow::{Result, bail};
use ballot_core::{
    BallotService, Command, Engine, ProposalId, Record, SignedCommand, Snapshot, StoreLock,
    Transition,
};
use clap::{Parser, Subcommand, ValueEnum};
use confique::Config;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "ballot")]
#[command(about = "A tamper-evident voting workflow")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "$HOME/.ballot/config.toml")]
    config_path: PathBuf,

    /// Configuration object
    #[command(flatten)]
    config: AppConfigLayer,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Internal helper struct that holds the resolved configuration
pub struct ResolvedCli {
    command: Commands,
    config: AppConfig,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Generate a signing key and print its identity
    Keygen {
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Create a new ballot administered by the given key
    Init {
        #[arg(short, long)]
        key: PathBuf,
        /// Replace an existing ballot
        #[arg(long)]
        force: bool,
    },
    /// Register a voter (administrator)
    Register {
        #[arg(short, long)]
        key: PathBuf,
        identity: String,
    },
    /// Move to the next phase (administrator)
    Advance {
        #[arg(short, long)]
        key: PathBuf,
        #[arg(value_enum)]
        transition: TransitionArg,
    },
    /// Submit a proposal (voter)
    Propose {
        #[arg(short, long)]
        key: PathBuf,
        description: String,
    },
    /// Vote for a proposal (voter)
    Vote {
        #[arg(short, long)]
        key: PathBuf,
        proposal: ProposalId,
    },
    /// Count the votes and close the ballot (administrator)
    Tally {
        #[arg(short, long)]
        key: PathBuf,
    },
    /// Show the current phase and winner
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Look up a voter record (voter)
    Voter {
        #[arg(short, long)]
        key: PathBuf,
        identity: String,
    },
    /// Look up a proposal (voter)
    Proposal {
        #[arg(short, long)]
        key: PathBuf,
        index: ProposalId,
    },
    /// Print the event history
    Events {
        /// First sequence number to print
        #[arg(long, default_value_t = 0)]
        since: u64,
        #[arg(long)]
        json: bool,
    },
    /// Check the event chain and state hash
    Verify,
    /// Print the resolved configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransitionArg {
    StartProposals,
    EndProposals,
    StartVoting,
    EndVoting,
}

impl From<TransitionArg> for Transition {
    fn from(arg: TransitionArg) -> Self {
        match arg {
            TransitionArg::StartProposals => Transition::StartProposalsRegistration,
            TransitionArg::EndProposals => Transition::EndProposalsRegistration,
            TransitionArg::StartVoting => Transition::StartVotingSession,
            TransitionArg::EndVoting => Transition::EndVotingSession,
        }
    }
}

#[derive(Serialize)]
struct Status {
    administrator: String,
    phase: String,
    proposals: usize,
    voters: usize,
    winning_proposal_id: ProposalId,
    records: usize,
    head: String,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let verbose = self.verbose;

        // Load and resolve configuration once at the beginning
        let resolved_cli = self.resolve_config()?;

        let log_level = if verbose {
            "debug"
        } else {
            resolved_cli.config.log.level.as_str()
        };
        tracing_subscriber::fmt()
            .with_env_filter(format!("ballot={},ballot_core={},{}", log_level, log_level, log_level))
            .with_writer(std::io::stderr)
            .init();

        resolved_cli.handle_command().await
    }

    /// Load the configuration and resolve all $HOME placeholders
    fn resolve_config(self) -> Result<ResolvedCli> {
        let config_path = expand_home_in_path(&self.config_path)?;

        let config = AppConfig::builder()
            .preloaded(self.config)
            .env()
            .file(&config_path)
            .load()?
            .with_resolved_paths()?;

        Ok(ResolvedCli {
            command: self.command,
            config,
        })
    }
}

impl ResolvedCli {
    #[cfg(test)]
    fn new(command: Commands, config: AppConfig) -> Self {
        Self { command, config }
    }

    fn store_path(&self) -> &Path {
        &self.config.store.path
    }

    fn open(&self) -> Result<BallotService> {
        let path = self.store_path();
        if !path.exists() {
            bail!("no ballot at {:?}, run `ballot init` first", path);
        }
        let engine = Engine::restore(Snapshot::load(path)?)?;
        debug!("Opened ballot at {:?}", path);
        Ok(BallotService::new(engine))
    }

    /// Wait for exclusive use of the store, without stalling the runtime.
    async fn lock_store(&self) -> Result<StoreLock> {
        let path = self.store_path().to_path_buf();
        Ok(tokio::task::spawn_blocking(move || StoreLock::acquire(path)).await??)
    }

    /// Sign and commit `command`. The store stays locked from load to save.
    async fn submit(&self, key: &Path, command: Command) -> Result<Record> {
        let key = keys::load(key)?;
        let _lock = self.lock_store().await?;
        let service = self.open()?;
        let record = service.submit(&SignedCommand::new(command, &key)).await?;
        service.snapshot().await.save(self.store_path())?;
        Ok(record)
    }

    async fn handle_command(&self) -> Result<()> {
        match &self.command {
            Commands::Keygen { out } => {
                let key = keys::generate(out)?;
                println!("{}", keys::identity(&key));
            }
            Commands::Init { key, force } => {
                let administrator = keys::identity(&keys::load(key)?);
                let _lock = self.lock_store().await?;
                let path = self.store_path();
                if path.exists() && !force {
                    bail!("a ballot already exists at {:?}, pass --force to replace it", path);
                }
                Engine::new(administrator.clone()).snapshot().save(path)?;
                info!("Created ballot at {:?}", path);
                println!("administrator: {}", administrator);
            }
            Commands::Register { key, identity } => {
                let command = Command::RegisterVoter {
                    voter: identity.as_str().into(),
                };
                let record = self.submit(key, command).await?;
                println!("{}", record.event);
            }
            Commands::Advance { key, transition } => {
                let record = self.submit(key, Command::Advance((*transition).into())).await?;
                println!("{}", record.event);
            }
            Commands::Propose { key, description } => {
                let command = Command::SubmitProposal {
                    description: description.clone(),
                };
                let record = self.submit(key, command).await?;
                println!("{}", record.event);
            }
            Commands::Vote { key, proposal } => {
                let command = Command::CastVote {
                    proposal_id: *proposal,
                };
                let record = self.submit(key, command).await?;
                println!("{}", record.event);
            }
            Commands::Tally { key } => {
                let record = self.submit(key, Command::Tally).await?;
                println!("{}", record.event);
                let service = self.open()?;
                println!("winning proposal: {}", service.winning_proposal_id().await);
            }
            Commands::Status { json } => {
                let status = self.open()?.read(status_of).await;
                if *json {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                } else {
                    println!("administrator: {}", status.administrator);
                    println!("phase:         {}", status.phase);
                    println!("voters:        {}", status.voters);
                    println!("proposals:     {}", status.proposals);
                    println!("winner:        {}", status.winning_proposal_id);
                    println!("records:       {} (head {})", status.records, status.head);
                }
            }
            Commands::Voter { key, identity } => {
                let caller = keys::identity(&keys::load(key)?);
                let voter = self
                    .open()?
                    .voter(&caller, &identity.as_str().into())
                    .await?;
                println!("{}", serde_json::to_string_pretty(&voter)?);
            }
            Commands::Proposal { key, index } => {
                let caller = keys::identity(&keys::load(key)?);
                let proposal = self.open()?.proposal(&caller, *index).await?;
                println!("{}", serde_json::to_string_pretty(&proposal)?);
            }
            Commands::Events { since, json } => {
                let records = self
                    .open()?
                    .read(|engine| engine.log().since(*since).to_vec())
                    .await;
                for record in &records {
                    if *json {
                        println!("{}", serde_json::to_string(record)?);
                    } else {
                        println!("#{:<4} {}", record.sequence, record.event);
                    }
                }
            }
            Commands::Verify => {
                // Opening restores the engine, which checks chain and state hash.
                let records = self.open()?.read(|engine| engine.history().len()).await;
                println!("ok: {} records verified", records);
            }
            Commands::Config => {
                print!("{}", self.config.to_toml()?);
            }
        }
        Ok(())
    }
}

fn status_of(engine: &Engine) -> Status {
    let ballot = engine.ballot();
    Status {
        administrator: ballot.administrator().to_string(),
        phase: ballot.phase().to_string(),
        proposals: ballot.proposals().len(),
        voters: ballot.voters().len(),
        winning_proposal_id: ballot.winning_proposal_id(),
        records: engine.history().len(),
        head: engine.log().head().to_hex(),
    }
}

#[cfg(test)]
mod tests;
