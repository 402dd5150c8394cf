use chrono::{DateTime, Utc};
use proptest::prelude::*;
use salvo_core::{
    payout_split, AccountId, Amount, CommitmentScheme, EndState, Orientation, Report, SalvoError,
    Session, SessionConfig, ShipCommitment, ShipOpening, ShipPlacement, ShotResult,
};

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn started() -> (Session, AccountId, AccountId) {
    let registry = AccountId::new("registry");
    let alice = AccountId::new("alice");
    let bob = AccountId::new("bob");
    let mut s = Session::new(SessionConfig::default(), registry, t0()).unwrap();
    s.join(&alice).unwrap();
    s.join(&bob).unwrap();

    let hashes: Vec<_> = [5u32, 4, 3, 3, 2]
        .iter()
        .enumerate()
        .map(|(row, &len)| {
            ShipOpening::new(
                ShipPlacement::new(len, Orientation::Horizontal, 0, row as u32),
                [9u8; 32],
            )
            .commitment()
        })
        .collect();
    s.submit_all_ship_commitments(&alice, &hashes, t0()).unwrap();
    s.submit_all_ship_commitments(&bob, &hashes, t0()).unwrap();
    (s, alice, bob)
}

fn orientation() -> impl Strategy<Value = Orientation> {
    prop_oneof![Just(Orientation::Horizontal), Just(Orientation::Vertical)]
}

fn end_state() -> impl Strategy<Value = EndState> {
    prop_oneof![
        Just(EndState::Draw),
        Just(EndState::Player1WinsValidGame),
        Just(EndState::Player2WinsValidGame),
        Just(EndState::Player1WinsInvalidGame),
        Just(EndState::Player2WinsInvalidGame),
    ]
}

proptest! {
    /// Only the turn holder can move, never at a cell it already targeted, and
    /// participant1 never trails or leads by more than one shot.
    #[test]
    fn turns_alternate(moves in prop::collection::vec((any::<bool>(), 0u32..10, 0u32..10), 1..60)) {
        let (mut s, alice, bob) = started();

        for (by_alice, x, y) in moves {
            let caller = if by_alice { &alice } else { &bob };
            let holder = s.current_turn_holder().cloned();
            let opening = s.participants().iter().all(|p| p.shot_count() == 0);
            let repeat = s
                .participant(caller)
                .unwrap()
                .shots_fired()
                .iter()
                .any(|shot| shot.x == x && shot.y == y);

            let outcome = if opening {
                s.fire_shot(caller, x, y, t0())
            } else {
                s.fire_shot_and_report_prior_result(caller, x, y, Report::miss(), t0())
            };

            if holder.as_ref() != Some(caller) {
                prop_assert!(matches!(outcome, Err(SalvoError::NotYourTurn(_))));
            } else if repeat {
                prop_assert!(
                    matches!(outcome, Err(SalvoError::AlreadyFired { x: rx, y: ry }) if rx == x && ry == y),
                    "expected AlreadyFired for repeated shot"
                );
            } else {
                prop_assert!(outcome.is_ok());
            }

            let first = s.participants()[0].shot_count();
            let second = s.participants()[1].shot_count();
            prop_assert!(first == second || first == second + 1);
        }
    }

    /// A replayed batch leaves the ledger exactly as the single calls did.
    #[test]
    fn batch_matches_single_moves(
        moves in prop::collection::vec((0u32..10, 0u32..10, any::<bool>(), 0usize..5), 1..40)
    ) {
        let (mut single, _, _) = started();
        let mut applied = Vec::new();

        for &(x, y, hit, ship) in &moves {
            let mover = match single.current_turn_holder() {
                Some(id) => id.clone(),
                None => break,
            };
            let result = if hit { ShotResult::Hit } else { ShotResult::Miss };
            let outcome = if applied.is_empty() {
                single.fire_shot(&mover, x, y, t0())
            } else {
                single.fire_shot_and_report_prior_result(
                    &mover,
                    x,
                    y,
                    Report { result, ship_index: ship },
                    t0(),
                )
            };
            if outcome.is_err() {
                break;
            }
            applied.push((x, y, result, ship));
        }

        let (mut batched, _, _) = started();
        let xs: Vec<_> = applied.iter().map(|m| m.0).collect();
        let ys: Vec<_> = applied.iter().map(|m| m.1).collect();
        let results: Vec<_> = applied.iter().map(|m| m.2).collect();
        let ships: Vec<_> = applied.iter().map(|m| m.3).collect();
        batched
            .batch_report_moves(&AccountId::new("registry"), &xs, &ys, &results, &ships, t0())
            .unwrap();

        for (a, b) in single.participants().iter().zip(batched.participants()) {
            prop_assert_eq!(a.shots_fired(), b.shots_fired());
            prop_assert_eq!(a.hits_confirmed(), b.hits_confirmed());
            prop_assert_eq!(a.per_ship_hits(), b.per_ship_hits());
        }
        prop_assert_eq!(single.current_turn_holder(), batched.current_turn_holder());
    }

    /// An opening verifies only against its own commitment.
    #[test]
    fn commitment_binds_placement_and_nonce(
        length in 1u32..6,
        orient in orientation(),
        x in 0u32..10,
        y in 0u32..10,
        nonce in prop::array::uniform32(0u8..),
        flip in 0usize..32,
    ) {
        let opening = ShipOpening::new(ShipPlacement::new(length, orient, x, y), nonce);
        let hash = opening.commitment();
        prop_assert!(ShipCommitment::verify(&hash, &opening));

        let mut other_nonce = nonce;
        other_nonce[flip] ^= 0x01;
        let tampered = ShipOpening::new(opening.placement, other_nonce);
        prop_assert!(!ShipCommitment::verify(&hash, &tampered));

        let moved = ShipOpening::new(ShipPlacement::new(length, orient, x + 1, y), nonce);
        prop_assert!(!ShipCommitment::verify(&hash, &moved));
    }

    /// Payouts never create or destroy funds.
    #[test]
    fn payout_conserves_pool(a in 0u64..1_000_000_000_000, b in 0u64..1_000_000_000_000, outcome in end_state()) {
        let owed = payout_split(outcome, [Amount::from_sat(a), Amount::from_sat(b)]);
        prop_assert_eq!(owed[0].to_sat() + owed[1].to_sat(), a + b);

        if outcome.is_valid_game() {
            let loser = outcome.winner().map(|w| w.opponent()).unwrap();
            let loser_owed = match loser {
                salvo_core::Seat::First => owed[0],
                salvo_core::Seat::Second => owed[1],
            };
            prop_assert_eq!(loser_owed.to_sat(), (a + b) / 10);
        }
    }
}
