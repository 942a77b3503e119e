//! Emitted records and the hash-chained event log.
//!
//! Every committed mutation produces exactly one [`Event`]. The engine wraps
//! it in a [`Record`] that links to the previous record's hash and carries
//! the ballot state hash after the commit, so history can be replayed from
//! the first record and any edit to it is detectable.

use crate::{Error, Hash, Identity, Phase, ProposalId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something observers are told about, in commit order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    WorkflowStatusChange { previous: Phase, new: Phase },
    VoterRegistered { voter: Identity },
    ProposalRegistered { proposal_id: ProposalId },
    Voted { voter: Identity, proposal_id: ProposalId },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::WorkflowStatusChange { previous, new } => {
                write!(f, "phase changed from {} to {}", previous, new)
            }
            Event::VoterRegistered { voter } => write!(f, "{} registered", voter.short()),
            Event::ProposalRegistered { proposal_id } => {
                write!(f, "proposal {} registered", proposal_id)
            }
            Event::Voted { voter, proposal_id } => {
                write!(f, "{} voted for proposal {}", voter.short(), proposal_id)
            }
        }
    }
}

/// A committed event, linked into the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    pub event: Event,
    /// Hash of the preceding record, [`Hash::ZERO`] for the first.
    pub previous: Hash,
    /// Ballot state hash right after this commit.
    pub state_hash: Hash,
    pub hash: Hash,
}

#[derive(Serialize)]
struct LinkedContent<'a> {
    sequence: u64,
    event: &'a Event,
    previous: &'a Hash,
    state_hash: &'a Hash,
}

impl Record {
    fn link(sequence: u64, event: Event, previous: Hash, state_hash: Hash) -> Self {
        let hash = Self::content_hash(sequence, &event, &previous, &state_hash);
        Self {
            sequence,
            event,
            previous,
            state_hash,
            hash,
        }
    }

    fn content_hash(sequence: u64, event: &Event, previous: &Hash, state_hash: &Hash) -> Hash {
        Hash::of_value(&LinkedContent {
            sequence,
            event,
            previous,
            state_hash,
        })
    }

    /// Recompute the hash from the record's content.
    pub fn compute_hash(&self) -> Hash {
        Self::content_hash(self.sequence, &self.event, &self.previous, &self.state_hash)
    }
}

/// Append-only, hash-chained sequence of records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    records: Vec<Record>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored records, checking the chain.
    pub fn from_records(records: Vec<Record>) -> Result<Self, Error> {
        let log = Self { records };
        log.verify()?;
        Ok(log)
    }

    /// Hash of the last record, [`Hash::ZERO`] when empty.
    pub fn head(&self) -> Hash {
        self.records.last().map(|r| r.hash).unwrap_or(Hash::ZERO)
    }

    pub(crate) fn append(&mut self, event: Event, state_hash: Hash) -> &Record {
        let record = Record::link(self.records.len() as u64, event, self.head(), state_hash);
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records from `sequence` on, for observers resuming a feed.
    pub fn since(&self, sequence: u64) -> &[Record] {
        let start = usize::try_from(sequence).unwrap_or(usize::MAX).min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Walk the chain and check sequence numbers, links and hashes.
    pub fn verify(&self) -> Result<(), Error> {
        let mut previous = Hash::ZERO;
        for (i, record) in self.records.iter().enumerate() {
            if record.sequence != i as u64 {
                return Err(Error::Tampered(format!(
                    "record {} has sequence {}",
                    i, record.sequence
                )));
            }
            if record.previous != previous {
                return Err(Error::Tampered(format!("record {} breaks the chain", i)));
            }
            if record.compute_hash() != record.hash {
                return Err(Error::Tampered(format!("record {} hash mismatch", i)));
            }
            previous = record.hash;
        }
        Ok(())
    }
}

/// Observer of committed records.
///
/// Sinks are called synchronously, in commit order, after the state change
/// is in place. They cannot veto a commit.
pub trait EventSink: Send + Sync {
    fn publish(&self, record: &Record);
}
