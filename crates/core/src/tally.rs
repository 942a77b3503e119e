//! Winner selection.

use crate::{Proposal, ProposalId};

/// Pick the proposal with the highest vote count.
///
/// Single forward scan; a later proposal replaces the current leader only
/// with a strictly greater count, so ties go to the lower index and an
/// unvoted registry elects index 0.
pub fn select_winner(proposals: &[Proposal]) -> ProposalId {
    let mut winner = 0;
    let mut best = 0;
    for (id, proposal) in proposals.iter().enumerate() {
        if proposal.vote_count > best {
            best = proposal.vote_count;
            winner = id;
        }
    }
    winner
}
