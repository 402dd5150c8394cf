//! Stake deposits and pull-withdrawal payouts.

use crate::events::SessionEvent;
use crate::session::Session;
use crate::types::{AccountId, EndState, Seat, SessionState};
use crate::{Result, SalvoError};
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moves funds out of the session to a participant.
pub trait PayoutSink {
    fn transfer(&mut self, to: &AccountId, amount: Amount) -> Result<()>;
}

/// Per-seat balances. `owed` is credited once, when the session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    deposited: [Amount; 2],
    has_deposited: [bool; 2],
    owed: [Amount; 2],
    withdrawn: [Amount; 2],
    settled: bool,
}

impl Escrow {
    pub fn new() -> Self {
        Self {
            deposited: [Amount::ZERO; 2],
            has_deposited: [false; 2],
            owed: [Amount::ZERO; 2],
            withdrawn: [Amount::ZERO; 2],
            settled: false,
        }
    }

    pub fn deposited(&self, seat: Seat) -> Amount {
        self.deposited[seat.index()]
    }

    pub fn owed(&self, seat: Seat) -> Amount {
        self.owed[seat.index()]
    }

    pub fn has_deposited(&self, seat: Seat) -> bool {
        self.has_deposited[seat.index()]
    }

    pub fn withdrawn(&self, seat: Seat) -> Amount {
        self.withdrawn[seat.index()]
    }

    pub fn pool(&self) -> Amount {
        Amount::from_sat(self.deposited[0].to_sat() + self.deposited[1].to_sat())
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub(crate) fn settle(&mut self, end_state: EndState) {
        if self.settled {
            return;
        }
        self.owed = payout_split(end_state, self.deposited);
        self.settled = true;
    }
}

impl Default for Escrow {
    fn default() -> Self {
        Self::new()
    }
}

/// Distribution of the pooled deposits for an outcome.
///
/// Draws refund each side its own deposit, invalid games pay the winner the
/// whole pool, valid games pay the loser `floor(pool / 10)` and the winner the
/// remainder.
pub fn payout_split(end_state: EndState, deposited: [Amount; 2]) -> [Amount; 2] {
    let pool = deposited[0].to_sat() + deposited[1].to_sat();

    let Some(winner) = end_state.winner() else {
        return deposited;
    };

    let (winner_share, loser_share) = if end_state.is_valid_game() {
        let loser_share = pool / 10;
        (pool - loser_share, loser_share)
    } else {
        (pool, 0)
    };

    let mut owed = [Amount::ZERO; 2];
    owed[winner.index()] = Amount::from_sat(winner_share);
    owed[winner.opponent().index()] = Amount::from_sat(loser_share);
    owed
}

impl Session {
    pub fn escrow(&self) -> &Escrow {
        &self.escrow
    }

    pub fn deposited_of(&self, account: &AccountId) -> Result<Amount> {
        Ok(self.escrow.deposited(self.seat_of(account)?))
    }

    pub fn owed_of(&self, account: &AccountId) -> Result<Amount> {
        Ok(self.escrow.owed(self.seat_of(account)?))
    }

    pub fn deposit_stake(&mut self, caller: &AccountId, amount: Amount) -> Result<()> {
        let seat = self.seat_of(caller)?;

        match self.state {
            SessionState::Created | SessionState::PlayersJoined | SessionState::Started => {}
            other => return Err(SalvoError::wrong_phase("a session not yet finished", other)),
        }

        if amount != self.config.stake {
            return Err(SalvoError::StakeMismatch {
                need: self.config.stake.to_sat(),
                got: amount.to_sat(),
            });
        }

        if self.escrow.has_deposited[seat.index()] {
            return Err(SalvoError::AlreadyDeposited(caller.clone()));
        }

        self.escrow.deposited[seat.index()] = amount;
        self.escrow.has_deposited[seat.index()] = true;
        tracing::info!(
            "Session {}: {} deposited {} sats",
            self.id,
            caller,
            amount.to_sat()
        );
        self.events.push(SessionEvent::DepositMade {
            participant: caller.clone(),
            amount,
        });
        Ok(())
    }

    /// Pay out everything owed to the caller through `sink`. A failed transfer
    /// leaves the balance owed.
    pub fn withdraw(&mut self, caller: &AccountId, sink: &mut dyn PayoutSink) -> Result<Amount> {
        let seat = self.seat_of(caller)?;
        if self.state != SessionState::Ended {
            return Err(SalvoError::wrong_phase("Ended", self.state));
        }

        let amount = self.escrow.owed(seat);
        if amount == Amount::ZERO {
            return Err(SalvoError::NothingToWithdraw(caller.clone()));
        }

        sink.transfer(caller, amount)?;

        let i = seat.index();
        self.escrow.owed[i] = Amount::ZERO;
        self.escrow.withdrawn[i] = Amount::from_sat(self.escrow.withdrawn[i].to_sat() + amount.to_sat());
        tracing::info!(
            "Session {}: {} withdrew {} sats",
            self.id,
            caller,
            amount.to_sat()
        );
        self.events.push(SessionEvent::Withdrawn {
            participant: caller.clone(),
            amount,
        });
        Ok(amount)
    }

    /// Circuit breaker for the administrative authority: end now and refund
    /// each participant its own deposit.
    pub fn emergency_stop(&mut self, caller: &AccountId, now: DateTime<Utc>) -> Result<()> {
        if caller != &self.authority {
            return Err(SalvoError::Unauthorized(caller.clone()));
        }

        if self.state == SessionState::Ended {
            return Err(SalvoError::wrong_phase("a live session", self.state));
        }

        tracing::warn!("Session {} emergency stopped in {}", self.id, self.state);
        self.emergency_stopped = true;
        self.end(EndState::Draw, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    struct RecordingSink {
        transfers: Vec<(AccountId, Amount)>,
        fail: bool,
    }

    impl PayoutSink for RecordingSink {
        fn transfer(&mut self, to: &AccountId, amount: Amount) -> Result<()> {
            if self.fail {
                return Err(SalvoError::payout("recipient rejected transfer"));
            }
            self.transfers.push((to.clone(), amount));
            Ok(())
        }
    }

    fn sats(n: u64) -> Amount {
        Amount::from_sat(n)
    }

    #[test]
    fn test_payout_split() {
        let both = [sats(1_000), sats(1_000)];
        assert_eq!(payout_split(EndState::Draw, both), both);
        assert_eq!(
            payout_split(EndState::Player1WinsValidGame, both),
            [sats(1_800), sats(200)]
        );
        assert_eq!(
            payout_split(EndState::Player2WinsInvalidGame, both),
            [sats(0), sats(2_000)]
        );

        // odd pool: loser rounds down, nothing lost
        let odd = payout_split(EndState::Player2WinsValidGame, [sats(7), sats(0)]);
        assert_eq!(odd, [sats(0), sats(7)]);
        let draw_partial = payout_split(EndState::Draw, [sats(5), sats(0)]);
        assert_eq!(draw_partial, [sats(5), sats(0)]);
    }

    #[test]
    fn test_deposit_rules() {
        let now = Utc::now();
        let alice = AccountId::new("alice");
        let mut s = Session::new(
            SessionConfig::classic(sats(1_000)),
            AccountId::new("registry"),
            now,
        )
        .unwrap();
        assert!(matches!(
            s.deposit_stake(&alice, sats(1_000)),
            Err(SalvoError::NotParticipant(_))
        ));
        s.join(&alice).unwrap();
        assert!(matches!(
            s.deposit_stake(&alice, sats(999)),
            Err(SalvoError::StakeMismatch { need: 1_000, got: 999 })
        ));
        s.deposit_stake(&alice, sats(1_000)).unwrap();
        assert!(matches!(
            s.deposit_stake(&alice, sats(1_000)),
            Err(SalvoError::AlreadyDeposited(_))
        ));
        assert_eq!(s.escrow().pool(), sats(1_000));
    }

    #[test]
    fn test_emergency_stop_refunds_and_withdraw_is_pull_based() {
        let now = Utc::now();
        let registry = AccountId::new("registry");
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");
        let mut s = Session::new(SessionConfig::classic(sats(1_000)), registry.clone(), now).unwrap();
        s.join(&alice).unwrap();
        s.join(&bob).unwrap();
        s.deposit_stake(&alice, sats(1_000)).unwrap();

        let mut sink = RecordingSink {
            transfers: Vec::new(),
            fail: false,
        };
        assert!(s.withdraw(&alice, &mut sink).is_err());

        assert!(matches!(
            s.emergency_stop(&alice, now),
            Err(SalvoError::Unauthorized(_))
        ));
        s.emergency_stop(&registry, now).unwrap();
        assert!(s.is_emergency_stopped());
        assert_eq!(s.end_state(), EndState::Draw);
        assert!(s.emergency_stop(&registry, now).is_err());

        let mut failing = RecordingSink {
            transfers: Vec::new(),
            fail: true,
        };
        assert!(matches!(
            s.withdraw(&alice, &mut failing),
            Err(SalvoError::PayoutFailed(_))
        ));
        assert_eq!(s.owed_of(&alice).unwrap(), sats(1_000));

        assert_eq!(s.withdraw(&alice, &mut sink).unwrap(), sats(1_000));
        assert!(matches!(
            s.withdraw(&alice, &mut sink),
            Err(SalvoError::NothingToWithdraw(_))
        ));
        assert!(matches!(
            s.withdraw(&bob, &mut sink),
            Err(SalvoError::NothingToWithdraw(_))
        ));
        assert_eq!(sink.transfers, vec![(alice.clone(), sats(1_000))]);
        assert_eq!(s.escrow().withdrawn(Seat::First), sats(1_000));
    }
}
