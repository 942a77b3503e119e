//! Shared, concurrent access to an [`Engine`].
//!
//! Writers are serialized behind one exclusive lock; readers share it and
//! always observe the latest commit. Live records are fanned out over a
//! broadcast channel from inside the write lock, which lets
//! [`BallotService::subscribe`] hand out a backlog and a receiver that
//! together cover the full history exactly once. A subscriber that falls
//! behind the channel catches up from the engine's log.

use crate::{
    Command, Engine, Error, EventSink, Identity, Phase, Proposal, ProposalId, Record,
    SignedCommand, Snapshot, Voter,
};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

/// Buffered records per subscriber before it starts lagging.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

struct BroadcastSink(broadcast::Sender<Record>);

impl EventSink for BroadcastSink {
    fn publish(&self, record: &Record) {
        // No receivers is not an error: nobody is watching yet.
        let _ = self.0.send(record.clone());
    }
}

/// Full history up to the moment of subscription, plus the live feed after it.
pub struct Subscription {
    pub backlog: Vec<Record>,
    live: broadcast::Receiver<Record>,
    engine: Weak<RwLock<Engine>>,
    /// Sequence number of the next record to hand out.
    next: u64,
    pending: VecDeque<Record>,
}

impl Subscription {
    /// Next record committed after the backlog, in sequence order.
    ///
    /// Returns `None` once the service and its engine are gone.
    pub async fn recv(&mut self) -> Option<Record> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                self.next = record.sequence + 1;
                return Some(record);
            }

            match self.live.recv().await {
                Ok(record) if record.sequence < self.next => continue,
                Ok(record) => {
                    self.next = record.sequence + 1;
                    return Some(record);
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!("Subscriber lagged by {} records, resuming at {}", missed, self.next);
                    let engine = self.engine.upgrade()?;
                    let engine = engine.read().await;
                    self.pending.extend(engine.log().since(self.next).iter().cloned());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[derive(Clone)]
pub struct BallotService {
    engine: Arc<RwLock<Engine>>,
    feed: broadcast::Sender<Record>,
}

impl BallotService {
    pub fn new(engine: Engine) -> Self {
        Self::with_capacity(engine, DEFAULT_FEED_CAPACITY)
    }

    pub fn with_capacity(mut engine: Engine, capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        engine.add_sink(Box::new(BroadcastSink(feed.clone())));
        Self {
            engine: Arc::new(RwLock::new(engine)),
            feed,
        }
    }

    /// Apply a command for an already-authenticated caller.
    pub async fn apply(&self, caller: &Identity, command: &Command) -> Result<Record, Error> {
        let mut engine = self.engine.write().await;
        engine.apply(caller, command).cloned()
    }

    /// Verify and apply a signed command.
    pub async fn submit(&self, signed: &SignedCommand) -> Result<Record, Error> {
        let mut engine = self.engine.write().await;
        engine.submit(signed).cloned()
    }

    pub async fn subscribe(&self) -> Subscription {
        let engine = self.engine.read().await;
        let backlog = engine.history().to_vec();
        Subscription {
            next: backlog.len() as u64,
            backlog,
            live: self.feed.subscribe(),
            engine: Arc::downgrade(&self.engine),
            pending: VecDeque::new(),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.engine.read().await.ballot().phase()
    }

    pub async fn winning_proposal_id(&self) -> ProposalId {
        self.engine.read().await.ballot().winning_proposal_id()
    }

    pub async fn voter(&self, caller: &Identity, identity: &Identity) -> Result<Voter, Error> {
        self.engine.read().await.ballot().get_voter(caller, identity)
    }

    pub async fn proposal(&self, caller: &Identity, id: ProposalId) -> Result<Proposal, Error> {
        self.engine
            .read()
            .await
            .ballot()
            .get_proposal(caller, id)
            .cloned()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.engine.read().await.snapshot()
    }

    /// Run a read-only closure against the engine.
    pub async fn read<T>(&self, f: impl FnOnce(&Engine) -> T) -> T {
        f(&*self.engine.read().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Event, Transition};

    fn admin() -> Identity {
        Identity::new("admin")
    }

    fn register(name: &str) -> Command {
        Command::RegisterVoter {
            voter: Identity::new(name),
        }
    }

    #[tokio::test]
    async fn late_subscriber_sees_everything_once() {
        let service = BallotService::new(Engine::new(admin()));
        service.apply(&admin(), &register("alice")).await.unwrap();
        service.apply(&admin(), &register("bob")).await.unwrap();

        let mut sub = service.subscribe().await;
        service
            .apply(&admin(), &Command::Advance(Transition::StartProposalsRegistration))
            .await
            .unwrap();

        assert_eq!(sub.backlog.len(), 2);
        let next = sub.recv().await.unwrap();
        assert_eq!(next.sequence, 2);
        assert_eq!(next.previous, sub.backlog[1].hash);
        assert!(sub.live.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_registrations_are_serialized() {
        let service = BallotService::new(Engine::new(admin()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.apply(&admin(), &register(&format!("voter-{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let (count, verified) = service
            .read(|engine| (engine.ballot().voters().len(), engine.log().verify().is_ok()))
            .await;
        assert_eq!(count, 16);
        assert!(verified);

        let sequences: Vec<u64> = service
            .subscribe()
            .await
            .backlog
            .iter()
            .map(|r| r.sequence)
            .collect();
        assert_eq!(sequences, (0..16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn reads_follow_writes() {
        let service = BallotService::new(Engine::new(admin()));
        service.apply(&admin(), &register("alice")).await.unwrap();
        service
            .apply(&admin(), &Command::Advance(Transition::StartProposalsRegistration))
            .await
            .unwrap();

        assert_eq!(service.phase().await, Phase::ProposalsRegistrationStarted);
        let genesis = service.proposal(&Identity::new("alice"), 0).await.unwrap();
        assert_eq!(genesis.description, "GENESIS");
    }

    #[tokio::test]
    async fn failed_command_is_not_broadcast() {
        let service = BallotService::new(Engine::new(admin()));
        let mut sub = service.subscribe().await;

        let err = service
            .apply(&Identity::new("mallory"), &register("mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        service.apply(&admin(), &register("alice")).await.unwrap();
        let record = sub.recv().await.unwrap();
        assert_eq!(
            record.event,
            Event::VoterRegistered {
                voter: Identity::new("alice")
            }
        );
    }

    #[tokio::test]
    async fn lagging_subscriber_catches_up_from_the_log() {
        let service = BallotService::with_capacity(Engine::new(admin()), 4);
        let mut sub = service.subscribe().await;

        for i in 0..10 {
            service.apply(&admin(), &register(&format!("voter-{i}"))).await.unwrap();
        }
        let mut sequences = Vec::new();
        for _ in 0..10 {
            sequences.push(sub.recv().await.unwrap().sequence);
        }
        assert_eq!(sequences, (0..10).collect::<Vec<_>>());

        service.apply(&admin(), &register("late")).await.unwrap();
        let record = sub.recv().await.unwrap();
        assert_eq!(record.sequence, 10);
        assert_eq!(
            record.event,
            Event::VoterRegistered {
                voter: Identity::new("late")
            }
        );
    }

    #[tokio::test]
    async fn feed_ends_with_the_service() {
        let service = BallotService::new(Engine::new(admin()));
        let mut sub = service.subscribe().await;
        service.apply(&admin(), &register("alice")).await.unwrap();
        drop(service);

        assert_eq!(sub.recv().await.unwrap().sequence, 0);
        assert!(sub.recv().await.is_none());
    }
}
