pub mod scheme;

pub use scheme::{CommitHash, CommitmentScheme};

use crate::types::ShipPlacement;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain separator for ship commitments.
const SHIP_COMMIT_DOMAIN: &[u8] = b"SALVO_SHIP_COMMIT_V1";

pub type Nonce = [u8; 32];

/// Plaintext a participant keeps locally until reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipOpening {
    pub placement: ShipPlacement,
    pub nonce: Nonce,
}

impl ShipOpening {
    pub fn new(placement: ShipPlacement, nonce: Nonce) -> Self {
        Self { placement, nonce }
    }

    pub fn commitment(&self) -> CommitHash {
        ShipCommitment::commit(self)
    }
}

/// SHA-256 over the domain tag, length, orientation, x, y and nonce.
pub struct ShipCommitment;

impl CommitmentScheme for ShipCommitment {
    type Opening = ShipOpening;

    fn commit(opening: &ShipOpening) -> CommitHash {
        let placement = &opening.placement;
        let mut hasher = Sha256::new();
        hasher.update(SHIP_COMMIT_DOMAIN);
        hasher.update(placement.length.to_be_bytes());
        hasher.update([placement.orientation.tag()]);
        hasher.update(placement.x.to_be_bytes());
        hasher.update(placement.y.to_be_bytes());
        hasher.update(opening.nonce);
        CommitHash::new(hasher.finalize().into())
    }
}

/// Rnd nonce for a ship commitment
pub fn generate_nonce() -> Nonce {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}
