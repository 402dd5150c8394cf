use crate::commitment::{CommitHash, CommitmentScheme, ShipCommitment, ShipOpening};
use crate::config::{RevealPolicy, SessionConfig};
use crate::types::{AccountId, ShipPlacement, Shot};
use crate::{Result, SalvoError};
use serde::{Deserialize, Serialize};

/// One side of a session: hidden fleet, revealed fleet and shots fired.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    id: AccountId,
    commitments: Vec<Option<CommitHash>>,
    revealed: Vec<Option<ShipPlacement>>,
    shots_fired: Vec<Shot>,
    /// `Hit` results this participant has asserted against its own fleet.
    hits_confirmed: u32,
    per_ship_hits: Vec<u32>,
}

impl Participant {
    pub fn new(id: AccountId, fleet_len: usize) -> Self {
        Self {
            id,
            commitments: vec![None; fleet_len],
            revealed: vec![None; fleet_len],
            shots_fired: Vec::new(),
            hits_confirmed: 0,
            per_ship_hits: vec![0; fleet_len],
        }
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn commitments(&self) -> &[Option<CommitHash>] {
        &self.commitments
    }

    pub fn committed_count(&self) -> usize {
        self.commitments.iter().filter(|c| c.is_some()).count()
    }

    pub fn has_committed_all(&self) -> bool {
        self.commitments.iter().all(Option::is_some)
    }

    pub fn revealed(&self) -> &[Option<ShipPlacement>] {
        &self.revealed
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.iter().filter(|r| r.is_some()).count()
    }

    pub fn has_revealed_all(&self) -> bool {
        self.revealed.iter().all(Option::is_some)
    }

    /// The full revealed fleet, once every slot has been opened.
    pub fn revealed_fleet(&self) -> Option<Vec<ShipPlacement>> {
        self.revealed.iter().copied().collect()
    }

    pub fn shots_fired(&self) -> &[Shot] {
        &self.shots_fired
    }

    pub fn shot_count(&self) -> usize {
        self.shots_fired.len()
    }

    pub fn hits_confirmed(&self) -> u32 {
        self.hits_confirmed
    }

    pub fn per_ship_hits(&self) -> &[u32] {
        &self.per_ship_hits
    }

    pub(crate) fn pending_shot(&self) -> Option<&Shot> {
        self.shots_fired.last().filter(|shot| shot.is_pending())
    }

    pub(crate) fn pending_shot_mut(&mut self) -> Option<&mut Shot> {
        self.shots_fired.last_mut().filter(|shot| shot.is_pending())
    }

    pub(crate) fn push_shot(&mut self, shot: Shot) {
        self.shots_fired.push(shot);
    }

    pub(crate) fn record_hit_against(&mut self, ship_index: usize) {
        self.hits_confirmed += 1;
        if let Some(tally) = self.per_ship_hits.get_mut(ship_index) {
            *tally += 1;
        }
    }

    pub(crate) fn commit(&mut self, index: usize, hash: CommitHash) -> Result<()> {
        let slot = self
            .commitments
            .get_mut(index)
            .ok_or(SalvoError::ShipIndexOutOfRange {
                index,
                fleet_len: self.revealed.len(),
            })?;

        if slot.is_some() {
            return Err(SalvoError::AlreadyCommitted(index));
        }

        *slot = Some(hash);
        tracing::debug!("Participant {} committed ship {}", self.id, index);
        Ok(())
    }

    /// Open one commitment slot. A hash mismatch is always rejected; structural
    /// problems are rejected only under [`RevealPolicy::Strict`].
    pub(crate) fn reveal(
        &mut self,
        index: usize,
        opening: &ShipOpening,
        config: &SessionConfig,
    ) -> Result<()> {
        let fleet_len = self.commitments.len();
        let commitment = self
            .commitments
            .get(index)
            .ok_or(SalvoError::ShipIndexOutOfRange { index, fleet_len })?
            .ok_or_else(|| SalvoError::invalid_state(format!("ship {} was never committed", index)))?;

        if self.revealed[index].is_some() {
            return Err(SalvoError::AlreadyRevealed(index));
        }

        if !ShipCommitment::verify(&commitment, opening) {
            return Err(SalvoError::CommitmentMismatch(index));
        }

        let placement = opening.placement;
        if config.reveal_policy == RevealPolicy::Strict {
            self.check_structure(index, &placement, config)?;
        }

        self.revealed[index] = Some(placement);
        tracing::debug!("Participant {} revealed ship {}", self.id, index);
        Ok(())
    }

    fn check_structure(
        &self,
        index: usize,
        placement: &ShipPlacement,
        config: &SessionConfig,
    ) -> Result<()> {
        let illegal = |reason: String| SalvoError::IllegalPlacement { index, reason };

        if Some(&placement.length) != config.fleet.get(index) {
            return Err(illegal(format!(
                "length {} does not match fleet slot",
                placement.length
            )));
        }

        if !placement.fits(config.board_width, config.board_height) {
            return Err(illegal("ship leaves the board".to_string()));
        }

        if let Some(other) = self
            .revealed
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|p| (i, p)))
            .find(|(_, other)| other.overlaps(placement))
        {
            return Err(illegal(format!("overlaps ship {}", other.0)));
        }

        Ok(())
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("committed", &self.committed_count())
            .field("revealed", &self.revealed_count())
            .field("shots_fired", &self.shots_fired.len())
            .field("hits_confirmed", &self.hits_confirmed)
            .finish()
    }
}
