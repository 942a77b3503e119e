//! The ballot: workflow controller, voter and proposal registries, ballot box
//! and tally, sharing one state object.
//!
//! Every mutating operation checks all of its preconditions before touching
//! state, so a rejected call leaves the ballot exactly as it was. On success
//! it returns the single [`Event`] describing the commit.

use crate::{
    tally, Error, Event, Hash, Identity, Phase, Proposal, ProposalId, ProposalRegistry,
    Transition, Voter, VoterRegistry,
};
use serde::{Deserialize, Serialize};

const NOT_ADMINISTRATOR: &str = "caller is not the administrator";
const NOT_VOTER: &str = "caller is not a registered voter";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    administrator: Identity,
    phase: Phase,
    voters: VoterRegistry,
    proposals: ProposalRegistry,
    winning_proposal_id: ProposalId,
}

impl Ballot {
    /// A fresh ballot in [`Phase::RegisteringVoters`], administered by `administrator`.
    pub fn new(administrator: Identity) -> Self {
        Self {
            administrator,
            phase: Phase::default(),
            voters: VoterRegistry::new(),
            proposals: ProposalRegistry::new(),
            winning_proposal_id: 0,
        }
    }

    pub fn administrator(&self) -> &Identity {
        &self.administrator
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn voters(&self) -> &VoterRegistry {
        &self.voters
    }

    pub fn proposals(&self) -> &ProposalRegistry {
        &self.proposals
    }

    /// Winner of the tally; 0 until the tally has run. Readable by anyone.
    pub fn winning_proposal_id(&self) -> ProposalId {
        self.winning_proposal_id
    }

    /// Content hash of the whole ballot.
    pub fn hash(&self) -> Hash {
        Hash::of_value(self)
    }

    fn ensure_administrator(&self, caller: &Identity) -> Result<(), Error> {
        if *caller != self.administrator {
            return Err(Error::Unauthorized(NOT_ADMINISTRATOR));
        }
        Ok(())
    }

    fn ensure_voter(&self, caller: &Identity) -> Result<(), Error> {
        if !self.voters.is_registered(caller) {
            return Err(Error::Unauthorized(NOT_VOTER));
        }
        Ok(())
    }

    fn ensure_phase(
        &self,
        required: Phase,
        operation: &'static str,
        reason: &'static str,
    ) -> Result<(), Error> {
        if self.phase != required {
            return Err(Error::PhaseViolation { operation, reason });
        }
        Ok(())
    }

    fn change_phase(&mut self, new: Phase) -> Event {
        let previous = std::mem::replace(&mut self.phase, new);
        Event::WorkflowStatusChange { previous, new }
    }

    // Workflow controller

    /// Move to the next phase. Opening proposals seeds GENESIS at index 0 in the same step.
    pub fn advance(&mut self, caller: &Identity, transition: Transition) -> Result<Event, Error> {
        self.ensure_administrator(caller)?;
        let next = transition
            .fire(self.phase)
            .ok_or(Error::IllegalTransition {
                transition,
                reason: transition.refusal(),
            })?;

        if next == Phase::ProposalsRegistrationStarted {
            self.proposals.seed_genesis();
        }
        Ok(self.change_phase(next))
    }

    // Voter registry

    pub fn register_voter(&mut self, caller: &Identity, voter: Identity) -> Result<Event, Error> {
        self.ensure_administrator(caller)?;
        self.ensure_phase(
            Phase::RegisteringVoters,
            "register_voter",
            "voters registration is not open yet",
        )?;
        if !self.voters.insert(voter.clone()) {
            return Err(Error::DuplicateRegistration(voter));
        }
        Ok(Event::VoterRegistered { voter })
    }

    /// Look up any identity. Only registered voters may ask; unknown
    /// identities come back as the default record.
    pub fn get_voter(&self, caller: &Identity, identity: &Identity) -> Result<Voter, Error> {
        self.ensure_voter(caller)?;
        Ok(self.voters.get(identity))
    }

    // Proposal registry

    pub fn submit_proposal(
        &mut self,
        caller: &Identity,
        description: impl Into<String>,
    ) -> Result<Event, Error> {
        self.ensure_voter(caller)?;
        self.ensure_phase(
            Phase::ProposalsRegistrationStarted,
            "submit_proposal",
            "proposals are not allowed yet",
        )?;
        let description = description.into();
        if description.is_empty() {
            return Err(Error::EmptyProposal);
        }
        let proposal_id = self.proposals.push(description);
        Ok(Event::ProposalRegistered { proposal_id })
    }

    pub fn get_proposal(&self, caller: &Identity, id: ProposalId) -> Result<&Proposal, Error> {
        self.ensure_voter(caller)?;
        self.proposals.get(id).ok_or(Error::NotFound(id))
    }

    // Ballot box

    pub fn cast_vote(&mut self, caller: &Identity, proposal_id: ProposalId) -> Result<Event, Error> {
        self.ensure_voter(caller)?;
        self.ensure_phase(
            Phase::VotingSessionStarted,
            "cast_vote",
            "voting session has not started yet",
        )?;
        if self.voters.get(caller).has_voted {
            return Err(Error::AlreadyVoted(caller.clone()));
        }
        if !self.proposals.contains(proposal_id) {
            return Err(Error::NotFound(proposal_id));
        }

        self.proposals.increment(proposal_id);
        self.voters.record_vote(caller, proposal_id);
        Ok(Event::Voted {
            voter: caller.clone(),
            proposal_id,
        })
    }

    // Tally engine

    /// Select the winner and close the workflow.
    pub fn tally(&mut self, caller: &Identity) -> Result<Event, Error> {
        self.ensure_administrator(caller)?;
        self.ensure_phase(
            Phase::VotingSessionEnded,
            "tally",
            "current phase is not voting session ended",
        )?;
        self.winning_proposal_id = tally::select_winner(self.proposals.as_slice());
        Ok(self.change_phase(Phase::VotesTallied))
    }
}
