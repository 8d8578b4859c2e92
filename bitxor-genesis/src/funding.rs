// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_cache::{AccountState, AccountStateCache};
use bitxor_chain::{ChainError, Notification, NotificationObserver, NotifyMode, ObserverContext};
use bitxor_models::address::Address;
use bitxor_models::amount::Amount;
use bitxor_models::height::Height;
use bitxor_models::token::TokenId;
use std::collections::BTreeMap;

/// How the genesis account obtains the tokens it transfers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GenesisFundingType {
    /// no transfer observed yet
    #[default]
    Unknown,
    /// the genesis account owned the tokens before transferring them
    Explicit,
    /// the genesis account is credited with every token it transfers
    Implicit,
}

/// Tokens funded by the genesis block
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenesisFundingState {
    /// total amount transferred out of the genesis account, per token
    pub total_funded_tokens: BTreeMap<TokenId, Amount>,
    /// funding mode, decided by the first transfer
    pub funding_type: GenesisFundingType,
}

impl GenesisFundingState {
    /// Total funded amount of `token_id`
    pub fn funded(&self, token_id: TokenId) -> Amount {
        self.total_funded_tokens
            .get(&token_id)
            .copied()
            .unwrap_or_else(Amount::zero)
    }
}

/// Accumulates the transfers made by the genesis account into a `GenesisFundingState`.
///
/// With implicit funding the sender is credited before the transfer is applied, so it must run
/// ahead of the balance transfer observer.
pub struct GenesisFundingObserver {
    genesis_address: Address,
    state: GenesisFundingState,
}

impl GenesisFundingObserver {
    /// Observer of the transfers made by `genesis_address`
    pub fn new(genesis_address: Address) -> Self {
        GenesisFundingObserver {
            genesis_address,
            state: GenesisFundingState::default(),
        }
    }

    /// Funding accumulated so far
    pub fn state(&self) -> &GenesisFundingState {
        &self.state
    }

    /// Consumes the observer
    pub fn into_state(self) -> GenesisFundingState {
        self.state
    }

    fn invalid(&self, reason: String) -> ChainError {
        ChainError::InvalidObservation {
            observer: self.name(),
            reason,
        }
    }
}

impl NotificationObserver for GenesisFundingObserver {
    fn name(&self) -> &'static str {
        "GenesisFundingObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::BalanceTransfer {
            sender,
            token_id,
            amount,
            ..
        } = notification
        else {
            return Ok(());
        };
        if context.mode != NotifyMode::Commit {
            return Err(self.invalid("only commit mode is supported".to_string()));
        }
        if context.height != Height::GENESIS {
            return Err(self.invalid(format!(
                "only the genesis height is supported, got {}",
                context.height
            )));
        }
        if *sender != self.genesis_address {
            return Ok(());
        }

        let token_id = context.resolve(*token_id)?;
        let height = context.height;
        let mut accounts = context.delta.sub_mut::<AccountStateCache>();
        let mut account = accounts
            .find(sender)?
            .unwrap_or_else(|| AccountState::new(*sender, height));

        let funded = self.state.funded(token_id).checked_add(*amount).ok_or_else(|| {
            ChainError::AmountOverflow(format!("genesis funding of {}", token_id))
        })?;
        self.state.total_funded_tokens.insert(token_id, funded);

        if self.state.funding_type == GenesisFundingType::Unknown {
            self.state.funding_type = if account.balance(token_id).is_zero() {
                GenesisFundingType::Implicit
            } else {
                GenesisFundingType::Explicit
            };
        }
        if self.state.funding_type == GenesisFundingType::Implicit {
            account.credit(token_id, *amount)?;
        }
        accounts.insert(&account)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bitxor_cache::{CacheConfiguration, CacheDelta, CoreCache};
    use bitxor_chain::test_exports::create_test_configuration;
    use bitxor_models::network::NetworkIdentifier;
    use bitxor_signature::KeyPair;

    fn address(seed: u8) -> Address {
        Address::from_public_key(
            &KeyPair::from_bytes(&[seed; 32]).get_public_key(),
            NetworkIdentifier::PrivateTest,
        )
    }

    fn transfer(sender: Address, token: u64, amount: u64) -> Notification {
        Notification::BalanceTransfer {
            sender,
            recipient: address(9),
            token_id: TokenId(token).unresolve(),
            amount: Amount::from_raw(amount),
        }
    }

    fn notify(
        observer: &mut GenesisFundingObserver,
        delta: &mut CacheDelta,
        notification: &Notification,
        height: Height,
        mode: NotifyMode,
    ) -> Result<(), ChainError> {
        let config = create_test_configuration();
        observer.notify(
            notification,
            &mut ObserverContext {
                delta,
                height,
                mode,
                config: &config,
                statement_builder: None,
            },
        )
    }

    #[test]
    fn implicit_funding_credits_the_genesis_account() {
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let genesis = address(1);
        let mut observer = GenesisFundingObserver::new(genesis);

        for (token, amount) in [(1, 100), (2, 50), (1, 25)] {
            notify(
                &mut observer,
                &mut delta,
                &transfer(genesis, token, amount),
                Height::GENESIS,
                NotifyMode::Commit,
            )
            .unwrap();
        }

        let state = observer.into_state();
        assert_eq!(state.funding_type, GenesisFundingType::Implicit);
        assert_eq!(state.funded(TokenId(1)), Amount::from_raw(125));
        assert_eq!(state.funded(TokenId(2)), Amount::from_raw(50));
        let account = delta
            .sub::<AccountStateCache>()
            .find(&genesis)
            .unwrap()
            .unwrap();
        assert_eq!(account.balance(TokenId(1)), Amount::from_raw(125));
    }

    #[test]
    fn explicit_funding_leaves_balances_untouched() {
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let genesis = address(1);
        let mut account = AccountState::new(genesis, Height::GENESIS);
        account.credit(TokenId(1), Amount::from_raw(1_000)).unwrap();
        delta.sub_mut::<AccountStateCache>().insert(&account).unwrap();
        let mut observer = GenesisFundingObserver::new(genesis);

        notify(
            &mut observer,
            &mut delta,
            &transfer(genesis, 1, 400),
            Height::GENESIS,
            NotifyMode::Commit,
        )
        .unwrap();

        assert_eq!(observer.state().funding_type, GenesisFundingType::Explicit);
        assert_eq!(observer.state().funded(TokenId(1)), Amount::from_raw(400));
        let account = delta
            .sub::<AccountStateCache>()
            .find(&genesis)
            .unwrap()
            .unwrap();
        assert_eq!(account.balance(TokenId(1)), Amount::from_raw(1_000));
    }

    #[test]
    fn other_senders_are_ignored() {
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let mut observer = GenesisFundingObserver::new(address(1));

        notify(
            &mut observer,
            &mut delta,
            &transfer(address(2), 1, 400),
            Height::GENESIS,
            NotifyMode::Commit,
        )
        .unwrap();

        assert_eq!(observer.state(), &GenesisFundingState::default());
        assert!(delta.sub::<AccountStateCache>().is_empty());
    }

    #[test]
    fn rollback_and_later_heights_are_rejected() {
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let genesis = address(1);
        let mut observer = GenesisFundingObserver::new(genesis);

        assert_matches!(
            notify(
                &mut observer,
                &mut delta,
                &transfer(genesis, 1, 1),
                Height::GENESIS,
                NotifyMode::Rollback,
            ),
            Err(ChainError::InvalidObservation { .. })
        );
        assert_matches!(
            notify(
                &mut observer,
                &mut delta,
                &transfer(genesis, 1, 1),
                Height(2),
                NotifyMode::Commit,
            ),
            Err(ChainError::InvalidObservation { .. })
        );
    }
}
