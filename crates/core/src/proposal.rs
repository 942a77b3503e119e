//! Proposals and the append-only proposal registry.

use serde::{Deserialize, Serialize};

/// Index of a proposal in the registry.
pub type ProposalId = usize;

/// Description of the proposal seeded at index 0 when proposals open.
pub const GENESIS_DESCRIPTION: &str = "GENESIS";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub description: String,
    pub vote_count: u64,
}

impl Proposal {
    fn new(description: String) -> Self {
        Self {
            description,
            vote_count: 0,
        }
    }
}

/// Index-stable sequence of proposals. Entries are never removed or reordered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalRegistry {
    proposals: Vec<Proposal>,
}

impl ProposalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the GENESIS proposal at index 0. No-op if anything is already stored.
    pub(crate) fn seed_genesis(&mut self) {
        if self.proposals.is_empty() {
            self.proposals.push(Proposal::new(GENESIS_DESCRIPTION.to_string()));
        }
    }

    /// Append a proposal and return its index.
    pub(crate) fn push(&mut self, description: String) -> ProposalId {
        self.proposals.push(Proposal::new(description));
        self.proposals.len() - 1
    }

    pub(crate) fn increment(&mut self, id: ProposalId) {
        if let Some(proposal) = self.proposals.get_mut(id) {
            proposal.vote_count += 1;
        }
    }

    pub fn get(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    pub fn contains(&self, id: ProposalId) -> bool {
        id < self.proposals.len()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn as_slice(&self) -> &[Proposal] {
        &self.proposals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_takes_index_zero() {
        let mut registry = ProposalRegistry::new();
        assert!(registry.get(0).is_none());

        registry.seed_genesis();
        registry.seed_genesis();

        assert_eq!(registry.len(), 1);
        let genesis = registry.get(0).unwrap();
        assert_eq!(genesis.description, GENESIS_DESCRIPTION);
        assert_eq!(genesis.vote_count, 0);
    }

    #[test]
    fn indices_follow_insertion_order() {
        let mut registry = ProposalRegistry::new();
        registry.seed_genesis();

        assert_eq!(registry.push("P1".into()), 1);
        assert_eq!(registry.push("P1".into()), 2);
        assert!(registry.contains(2));
        assert!(!registry.contains(3));
    }

    #[test]
    fn increment_counts_votes() {
        let mut registry = ProposalRegistry::new();
        registry.seed_genesis();
        registry.increment(0);
        registry.increment(0);
        assert_eq!(registry.get(0).unwrap().vote_count, 2);
    }
}
