//! ballot-core: a tamper-evident voting workflow.
//!
//! An administrator admits voters, voters submit proposals and then cast a
//! single vote each, and a deterministic tally selects the winner:
//! - `Ballot`: the phase machine and its registries
//! - `Engine`: applies commands and keeps the hash-chained event log
//! - `BallotService`: serialized writes, concurrent reads, replayable feed

mod ballot;
mod command;
mod engine;
mod error;
mod event;
mod hash;
mod identity;
mod phase;
mod proposal;
mod service;
mod store;
pub mod tally;
mod voter;

pub use ballot::Ballot;
pub use command::{Command, SignedCommand};
pub use engine::Engine;
pub use error::{Error, ErrorKind};
pub use event::{Event, EventLog, EventSink, Record};
pub use hash::Hash;
pub use identity::Identity;
pub use phase::{Phase, Transition};
pub use proposal::{GENESIS_DESCRIPTION, Proposal, ProposalId, ProposalRegistry};
pub use service::{BallotService, DEFAULT_FEED_CAPACITY, Subscription};
pub use store::{Snapshot, StoreLock};
pub use voter::{Voter, VoterRegistry};

/// Re-export for convenience
pub use ed25519_dalek::{SigningKey, VerifyingKey};
