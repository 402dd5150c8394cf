use super::{parse_session_id, App, ClientState};
use anyhow::Result;
use salvo_core::{AccountId, Amount, PayoutSink, Session};

/// Credits payouts to the local balance book kept in the client state.
struct LocalWallet<'a> {
    client: &'a mut ClientState,
}

impl PayoutSink for LocalWallet<'_> {
    fn transfer(&mut self, to: &AccountId, amount: Amount) -> salvo_core::Result<()> {
        let balance = self.client.credit(to, amount.to_sat());
        tracing::debug!("Credited {} sats to {} (balance {})", amount.to_sat(), to, balance);
        Ok(())
    }
}

pub async fn deposit(app: &mut App, player: &str, session_id: &str) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let account = AccountId::new(player);
    let stake = app.arena.with_session(id, Session::stake)?;

    app.arena
        .with_session_mut(id, |s| s.deposit_stake(&account, stake))?;
    println!("Deposited {} sats into session {}", stake.to_sat(), id);
    app.commit(id).await
}

pub async fn withdraw(app: &mut App, player: &str, session_id: &str) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let account = AccountId::new(player);

    let mut wallet = LocalWallet {
        client: &mut app.client,
    };
    let amount = app
        .arena
        .with_session_mut(id, |s| s.withdraw(&account, &mut wallet))?;

    println!("Withdrew {} sats", amount.to_sat());
    println!("Local balance of {}: {} sats", account, app.client.balance(&account));
    app.commit(id).await
}
