//! Commands and signed command envelopes.
//!
//! A [`Command`] names one mutating operation. A [`SignedCommand`] binds it
//! to an ed25519 key; the caller identity is derived from that key, so the
//! submitter cannot claim somebody else's role.

use crate::{Ballot, Error, Event, Hash, Identity, ProposalId, Transition};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// A mutating operation on the ballot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Advance(Transition),
    RegisterVoter { voter: Identity },
    SubmitProposal { description: String },
    CastVote { proposal_id: ProposalId },
    Tally,
}

impl Command {
    /// Short operation name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Advance(_) => "advance",
            Command::RegisterVoter { .. } => "register_voter",
            Command::SubmitProposal { .. } => "submit_proposal",
            Command::CastVote { .. } => "cast_vote",
            Command::Tally => "tally",
        }
    }
}

impl Ballot {
    /// Dispatch a command on behalf of `caller`.
    pub fn apply(&mut self, caller: &Identity, command: &Command) -> Result<Event, Error> {
        match command {
            Command::Advance(transition) => self.advance(caller, *transition),
            Command::RegisterVoter { voter } => self.register_voter(caller, voter.clone()),
            Command::SubmitProposal { description } => {
                self.submit_proposal(caller, description.as_str())
            }
            Command::CastVote { proposal_id } => self.cast_vote(caller, *proposal_id),
            Command::Tally => self.tally(caller),
        }
    }
}

/// A command signed by its caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedCommand {
    /// Raw ed25519 public key of the caller.
    pub signer: [u8; 32],

    pub command: Command,

    /// Unix timestamp in milliseconds. Keeps otherwise identical commands distinct.
    pub timestamp: u64,

    /// Signature over signer, command and timestamp.
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct SignableCommand<'a> {
    signer: &'a [u8; 32],
    command: &'a Command,
    timestamp: u64,
}

impl SignedCommand {
    /// Sign `command` with the current time.
    pub fn new(command: Command, signing_key: &SigningKey) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self::at(command, timestamp, signing_key)
    }

    /// Sign `command` with an explicit timestamp.
    pub fn at(command: Command, timestamp: u64, signing_key: &SigningKey) -> Self {
        let mut signed = Self {
            signer: signing_key.verifying_key().to_bytes(),
            command,
            timestamp,
            signature: Vec::new(),
        };
        let signature = signing_key.sign(&signed.signable_content());
        signed.signature = signature.to_bytes().to_vec();
        signed
    }

    fn signable_content(&self) -> Vec<u8> {
        let signable = SignableCommand {
            signer: &self.signer,
            command: &self.command,
            timestamp: self.timestamp,
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&signable, &mut buf).expect("serialization should not fail");
        buf
    }

    /// Content hash; identical for a command and its replays.
    pub fn id(&self) -> Hash {
        Hash::of(&self.signable_content())
    }

    /// Identity derived from the signer key, whether or not the key is well formed.
    pub fn caller(&self) -> Identity {
        match VerifyingKey::from_bytes(&self.signer) {
            Ok(key) => Identity::from_public_key(&key),
            Err(_) => Identity::new(format!("0x{}", Hash::of(&self.signer).to_hex())),
        }
    }

    /// Check the signature and return the authenticated caller.
    pub fn verify(&self) -> Result<Identity, Error> {
        let invalid = || Error::InvalidSignature(self.caller());

        let key = VerifyingKey::from_bytes(&self.signer).map_err(|_| invalid())?;
        let bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| invalid())?;
        let signature = Signature::from_bytes(&bytes);

        key.verify(&self.signable_content(), &signature)
            .map_err(|_| invalid())?;
        Ok(Identity::from_public_key(&key))
    }
}
