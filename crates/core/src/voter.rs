//! Voter records and the identity-keyed registry.

use crate::{Identity, ProposalId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A participant's standing in the ballot.
///
/// The default value is what an unregistered identity looks like.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub is_registered: bool,
    pub has_voted: bool,
    /// 0 until the voter has voted.
    pub voted_proposal_id: ProposalId,
}

impl Voter {
    fn registered() -> Self {
        Self {
            is_registered: true,
            ..Self::default()
        }
    }
}

/// Identity-keyed voter records. Grows only; entries are never removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterRegistry {
    voters: BTreeMap<Identity, Voter>,
}

impl VoterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.voters.get(identity).is_some_and(|v| v.is_registered)
    }

    /// Record for `identity`, or the default record if it was never registered.
    pub fn get(&self, identity: &Identity) -> Voter {
        self.voters.get(identity).copied().unwrap_or_default()
    }

    /// Insert a fresh registration. Returns false if the identity is already present.
    pub(crate) fn insert(&mut self, identity: Identity) -> bool {
        if self.voters.contains_key(&identity) {
            return false;
        }
        self.voters.insert(identity, Voter::registered());
        true
    }

    /// Mark `identity` as having voted for `proposal`. The caller has
    /// already checked registration and the one-vote rule.
    pub(crate) fn record_vote(&mut self, identity: &Identity, proposal: ProposalId) {
        if let Some(voter) = self.voters.get_mut(identity) {
            voter.has_voted = true;
            voter.voted_proposal_id = proposal;
        }
    }

    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identity, &Voter)> {
        self.voters.iter()
    }
}
