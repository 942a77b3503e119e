//! Workflow phases and the transition table.
//!
//! The workflow is linear:
//! ```text
//! RegisteringVoters -> ProposalsRegistrationStarted -> ProposalsRegistrationEnded
//!   -> VotingSessionStarted -> VotingSessionEnded -> VotesTallied
//! ```
//! The first four steps are driven by [`Transition`]s. The last one is fused
//! with the tally and has no standalone transition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current stage of the workflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    RegisteringVoters,
    ProposalsRegistrationStarted,
    ProposalsRegistrationEnded,
    VotingSessionStarted,
    VotingSessionEnded,
    VotesTallied,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::RegisteringVoters,
        Phase::ProposalsRegistrationStarted,
        Phase::ProposalsRegistrationEnded,
        Phase::VotingSessionStarted,
        Phase::VotingSessionEnded,
        Phase::VotesTallied,
    ];

    /// Position in the workflow, starting at 0.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// The single successor, if any.
    pub fn next(self) -> Option<Phase> {
        Phase::ALL.get(self.index() as usize + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::VotesTallied
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::RegisteringVoters => "registering voters",
            Phase::ProposalsRegistrationStarted => "proposals registration started",
            Phase::ProposalsRegistrationEnded => "proposals registration ended",
            Phase::VotingSessionStarted => "voting session started",
            Phase::VotingSessionEnded => "voting session ended",
            Phase::VotesTallied => "votes tallied",
        };
        f.write_str(name)
    }
}

/// An administrator-driven phase advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    StartProposalsRegistration,
    EndProposalsRegistration,
    StartVotingSession,
    EndVotingSession,
}

struct Edge {
    transition: Transition,
    from: Phase,
    to: Phase,
    refusal: &'static str,
}

const TABLE: [Edge; 4] = [
    Edge {
        transition: Transition::StartProposalsRegistration,
        from: Phase::RegisteringVoters,
        to: Phase::ProposalsRegistrationStarted,
        refusal: "registering proposals cannot be started now",
    },
    Edge {
        transition: Transition::EndProposalsRegistration,
        from: Phase::ProposalsRegistrationStarted,
        to: Phase::ProposalsRegistrationEnded,
        refusal: "registering proposals has not started yet",
    },
    Edge {
        transition: Transition::StartVotingSession,
        from: Phase::ProposalsRegistrationEnded,
        to: Phase::VotingSessionStarted,
        refusal: "registering proposals phase is not finished",
    },
    Edge {
        transition: Transition::EndVotingSession,
        from: Phase::VotingSessionStarted,
        to: Phase::VotingSessionEnded,
        refusal: "voting session has not started yet",
    },
];

impl Transition {
    pub const ALL: [Transition; 4] = [
        Transition::StartProposalsRegistration,
        Transition::EndProposalsRegistration,
        Transition::StartVotingSession,
        Transition::EndVotingSession,
    ];

    fn edge(self) -> &'static Edge {
        // TABLE holds exactly one edge per variant, in declaration order.
        &TABLE[self as usize]
    }

    /// The phase this transition must start from.
    pub fn source(self) -> Phase {
        self.edge().from
    }

    /// The phase this transition leads to.
    pub fn target(self) -> Phase {
        self.edge().to
    }

    /// Reason given when the transition is attempted from any other phase.
    pub fn refusal(self) -> &'static str {
        self.edge().refusal
    }

    /// Target phase when fired from `current`, or `None` if the pair is not in the table.
    pub fn fire(self, current: Phase) -> Option<Phase> {
        let edge = self.edge();
        (edge.from == current).then_some(edge.to)
    }

    /// The transition that leaves `phase`, if the administrator drives it directly.
    pub fn leaving(phase: Phase) -> Option<Transition> {
        TABLE.iter().find(|e| e.from == phase).map(|e| e.transition)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source(), self.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_declaration_order() {
        for (i, edge) in TABLE.iter().enumerate() {
            assert_eq!(edge.transition as usize, i);
            assert_eq!(edge.from.next(), Some(edge.to));
        }
    }

    #[test]
    fn each_transition_fires_from_exactly_one_phase() {
        for transition in Transition::ALL {
            let firing: Vec<Phase> = Phase::ALL
                .into_iter()
                .filter(|p| transition.fire(*p).is_some())
                .collect();
            assert_eq!(firing, vec![transition.source()]);
        }
    }

    #[test]
    fn phases_are_linear() {
        assert_eq!(Phase::default(), Phase::RegisteringVoters);
        assert_eq!(Phase::VotingSessionEnded.next(), Some(Phase::VotesTallied));
        assert_eq!(Phase::VotesTallied.next(), None);
        assert!(Phase::VotesTallied.is_terminal());
        assert_eq!(Transition::leaving(Phase::VotingSessionEnded), None);
        assert_eq!(
            Transition::leaving(Phase::ProposalsRegistrationEnded),
            Some(Transition::StartVotingSession)
        );
    }
}
