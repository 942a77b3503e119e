//! The ballot engine: applies commands, keeps history and notifies observers.

use crate::{
    Ballot, Command, Error, Event, EventLog, EventSink, Hash, Identity, Record, SignedCommand,
    Snapshot,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Single writer over a [`Ballot`].
///
/// Each accepted command commits one event to the log together with the
/// resulting state hash. Rejected commands leave ballot, log and sinks
/// untouched.
pub struct Engine {
    ballot: Ballot,

    /// Committed records, in order of application.
    log: EventLog,

    /// Ids of signed commands already committed.
    seen: BTreeSet<Hash>,

    sinks: Vec<Box<dyn EventSink>>,
}

impl Engine {
    pub fn new(administrator: Identity) -> Self {
        Self {
            ballot: Ballot::new(administrator),
            log: EventLog::new(),
            seen: BTreeSet::new(),
            sinks: Vec::new(),
        }
    }

    /// Rebuild an engine from a snapshot, checking it has not been edited.
    pub fn restore(snapshot: Snapshot) -> Result<Self, Error> {
        let Snapshot {
            ballot,
            history,
            seen,
        } = snapshot;

        let log = EventLog::from_records(history)?;
        let expected = log
            .records()
            .last()
            .map(|r| r.state_hash)
            .unwrap_or_else(|| Ballot::new(ballot.administrator().clone()).hash());

        if ballot.hash() != expected {
            warn!("Snapshot state hash does not match the event log");
            return Err(Error::Tampered(
                "ballot state does not match the last record".to_string(),
            ));
        }

        debug!("Restored ballot with {} records", log.len());
        Ok(Self {
            ballot,
            log,
            seen,
            sinks: Vec::new(),
        })
    }

    /// Capture the state needed to [`restore`](Self::restore) this engine.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ballot: self.ballot.clone(),
            history: self.log.records().to_vec(),
            seen: self.seen.clone(),
        }
    }

    pub fn ballot(&self) -> &Ballot {
        &self.ballot
    }

    pub fn history(&self) -> &[Record] {
        self.log.records()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn state_hash(&self) -> Hash {
        self.ballot.hash()
    }

    /// Register an observer for records committed from now on.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Apply a command for an already-authenticated caller.
    pub fn apply(&mut self, caller: &Identity, command: &Command) -> Result<&Record, Error> {
        let event = match self.ballot.apply(caller, command) {
            Ok(event) => event,
            Err(e) => {
                debug!("Rejected {} from {}: {}", command.name(), caller, e);
                return Err(e);
            }
        };

        match &event {
            Event::WorkflowStatusChange { previous, new } => {
                info!("Phase changed from {} to {}", previous, new);
                if matches!(command, Command::Tally) {
                    info!(
                        "Tally complete, winning proposal is {}",
                        self.ballot.winning_proposal_id()
                    );
                }
            }
            _ => debug!("Applied {} from {}", command.name(), caller),
        }

        let state_hash = self.ballot.hash();
        let record = self.log.append(event, state_hash);
        for sink in &self.sinks {
            sink.publish(record);
        }
        Ok(record)
    }

    /// Verify and apply a signed command. Each command commits at most once.
    pub fn submit(&mut self, signed: &SignedCommand) -> Result<&Record, Error> {
        let caller = signed.verify().inspect_err(|e| {
            warn!("Refused {}: {}", signed.command.name(), e);
        })?;

        let id = signed.id();
        if self.seen.contains(&id) {
            warn!("Refused replay of command {}", id);
            return Err(Error::Replayed(id));
        }

        // Only committed commands count as seen.
        self.apply(&caller, &signed.command)?;
        self.seen.insert(id);
        Ok(&self.log.records()[self.log.len() - 1])
    }
}
