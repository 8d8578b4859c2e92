// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::ChainError;
use crate::notifications::Notification;
use crate::observers::{NotificationObserver, NotifyMode, ObserverContext};
use crate::validation::{
    StatefulValidator, StatelessValidator, ValidationFailure, ValidationResult, ValidatorContext,
};
use bitxor_cache::{AccountState, AccountStateCache, BlockStatistic, BlockStatisticCache};
use bitxor_models::address::Address;
use bitxor_models::amount::Amount;
use bitxor_models::height::Height;
use bitxor_models::network::NetworkIdentifier;
use bitxor_models::receipt::{Receipt, ReceiptSource, ReceiptType};
use bitxor_models::token::TokenId;

/// Adds `amount` of `token_id` to `address`, creating the account when needed
pub(crate) fn credit_account(
    context: &mut ObserverContext<'_>,
    address: Address,
    token_id: TokenId,
    amount: Amount,
) -> Result<(), ChainError> {
    let height = context.height;
    let mut accounts = context.delta.sub_mut::<AccountStateCache>();
    let mut account = accounts
        .find(&address)?
        .unwrap_or_else(|| AccountState::new(address, height));
    account.credit(token_id, amount)?;
    accounts.insert(&account)?;
    Ok(())
}

/// Removes `amount` of `token_id` from `address`
pub(crate) fn debit_account(
    context: &mut ObserverContext<'_>,
    address: Address,
    token_id: TokenId,
    amount: Amount,
    observer: &'static str,
) -> Result<(), ChainError> {
    let mut accounts = context.delta.sub_mut::<AccountStateCache>();
    let mut account = accounts
        .find(&address)?
        .ok_or_else(|| ChainError::InvalidObservation {
            observer,
            reason: format!("unknown account {}", address),
        })?;
    account.debit(token_id, amount)?;
    accounts.insert(&account)?;
    Ok(())
}

/// Removes an account created at `height` once everything attached to it is undone
fn prune_account(
    context: &mut ObserverContext<'_>,
    address: &Address,
    height: Height,
) -> Result<(), ChainError> {
    let mut accounts = context.delta.sub_mut::<AccountStateCache>();
    if let Some(account) = accounts.find(address)? {
        if account.address_height == height
            && account.public_key.is_none()
            && account.balances.is_empty()
        {
            accounts.remove(address)?;
        }
    }
    Ok(())
}

/// Moves the receipt source
pub struct SourceChangeObserver;

impl NotificationObserver for SourceChangeObserver {
    fn name(&self) -> &'static str {
        "SourceChangeObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        if let Notification::SourceChange {
            primary_id,
            secondary_id,
        } = notification
        {
            context.set_source(ReceiptSource {
                primary_id: *primary_id,
                secondary_id: *secondary_id,
            });
        }
        Ok(())
    }
}

/// Creates accounts known by address
pub struct AccountAddressObserver;

impl NotificationObserver for AccountAddressObserver {
    fn name(&self) -> &'static str {
        "AccountAddressObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::AccountAddress { address } = notification else {
            return Ok(());
        };
        match context.mode {
            NotifyMode::Commit => {
                let height = context.height;
                let mut accounts = context.delta.sub_mut::<AccountStateCache>();
                if !accounts.contains(address)? {
                    accounts.insert(&AccountState::new(*address, height))?;
                }
                Ok(())
            }
            NotifyMode::Rollback => {
                let height = context.height;
                prune_account(context, address, height)
            }
        }
    }
}

/// Creates accounts known by public key and records the key
pub struct AccountPublicKeyObserver;

impl NotificationObserver for AccountPublicKeyObserver {
    fn name(&self) -> &'static str {
        "AccountPublicKeyObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::AccountPublicKey { public_key } = notification else {
            return Ok(());
        };
        let address = Address::from_public_key(public_key, context.config.network.identifier);
        let height = context.height;
        let mut accounts = context.delta.sub_mut::<AccountStateCache>();
        match context.mode {
            NotifyMode::Commit => {
                let mut account = accounts
                    .find(&address)?
                    .unwrap_or_else(|| AccountState::new(address, height));
                if account.public_key.is_none() {
                    account.public_key = Some(*public_key);
                    account.public_key_height = height;
                    accounts.insert(&account)?;
                }
            }
            NotifyMode::Rollback => {
                if let Some(mut account) = accounts.find(&address)? {
                    if account.public_key_height == height {
                        account.public_key = None;
                        account.public_key_height = Height(0);
                        accounts.insert(&account)?;
                        drop(accounts);
                        prune_account(context, &address, height)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Moves balances between accounts
pub struct BalanceTransferObserver;

impl NotificationObserver for BalanceTransferObserver {
    fn name(&self) -> &'static str {
        "BalanceTransferObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::BalanceTransfer {
            sender,
            recipient,
            token_id,
            amount,
        } = notification
        else {
            return Ok(());
        };
        let token_id = context.resolve(*token_id)?;
        match context.mode {
            NotifyMode::Commit => {
                debit_account(context, *sender, token_id, *amount, self.name())?;
                credit_account(context, *recipient, token_id, *amount)
            }
            NotifyMode::Rollback => {
                debit_account(context, *recipient, token_id, *amount, self.name())?;
                credit_account(context, *sender, token_id, *amount)
            }
        }
    }
}

/// Takes balances out of accounts
pub struct BalanceDebitObserver;

impl NotificationObserver for BalanceDebitObserver {
    fn name(&self) -> &'static str {
        "BalanceDebitObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::BalanceDebit {
            sender,
            token_id,
            amount,
        } = notification
        else {
            return Ok(());
        };
        let token_id = context.resolve(*token_id)?;
        match context.mode {
            NotifyMode::Commit => debit_account(context, *sender, token_id, *amount, self.name()),
            NotifyMode::Rollback => credit_account(context, *sender, token_id, *amount),
        }
    }
}

/// Records the statistic of every block
pub struct BlockStatisticObserver;

impl NotificationObserver for BlockStatisticObserver {
    fn name(&self) -> &'static str {
        "BlockStatisticObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::Block {
            timestamp,
            difficulty,
            fee_multiplier,
            ..
        } = notification
        else {
            return Ok(());
        };
        let height = context.height;
        let mut statistics = context.delta.sub_mut::<BlockStatisticCache>();
        match context.mode {
            NotifyMode::Commit => statistics.insert(&BlockStatistic {
                height,
                timestamp: *timestamp,
                difficulty: *difficulty,
                fee_multiplier: *fee_multiplier,
            })?,
            NotifyMode::Rollback => {
                statistics.remove(&height)?;
            }
        }
        Ok(())
    }
}

/// Counts confirmed transactions in the dependent state
pub struct TotalTransactionsObserver;

impl NotificationObserver for TotalTransactionsObserver {
    fn name(&self) -> &'static str {
        "TotalTransactionsObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::Block {
            num_transactions, ..
        } = notification
        else {
            return Ok(());
        };
        let state = context.delta.dependent_state_mut();
        let count = *num_transactions as u64;
        state.num_total_transactions = match context.mode {
            NotifyMode::Commit => state.num_total_transactions.checked_add(count),
            NotifyMode::Rollback => state.num_total_transactions.checked_sub(count),
        }
        .ok_or_else(|| ChainError::InvalidObservation {
            observer: "TotalTransactionsObserver",
            reason: format!("transaction count out of range after {} transactions", count),
        })?;
        Ok(())
    }
}

/// Credits block fees to the beneficiary, minus the network sink share
pub struct HarvestFeeObserver {
    currency_token_id: TokenId,
    sink: Option<Address>,
    sink_percentage: u8,
}

impl HarvestFeeObserver {
    /// Observer crediting fees in `currency_token_id`
    pub fn new(currency_token_id: TokenId, sink: Option<Address>, sink_percentage: u8) -> Self {
        HarvestFeeObserver {
            currency_token_id,
            sink,
            sink_percentage: sink_percentage.min(100),
        }
    }

    fn split(&self, total_fee: Amount) -> (Amount, Amount) {
        match self.sink {
            Some(_) => {
                let sink_share = Amount::from_raw(
                    (total_fee.to_raw() as u128 * self.sink_percentage as u128 / 100) as u64,
                );
                let beneficiary_share = total_fee
                    .checked_sub(sink_share)
                    .unwrap_or_else(Amount::zero);
                (beneficiary_share, sink_share)
            }
            None => (total_fee, Amount::zero()),
        }
    }
}

impl NotificationObserver for HarvestFeeObserver {
    fn name(&self) -> &'static str {
        "HarvestFeeObserver"
    }

    fn notify(
        &mut self,
        notification: &Notification,
        context: &mut ObserverContext<'_>,
    ) -> Result<(), ChainError> {
        let Notification::Block {
            beneficiary,
            total_fee,
            ..
        } = notification
        else {
            return Ok(());
        };
        let (beneficiary_share, sink_share) = self.split(*total_fee);
        let mut shares = vec![(*beneficiary, beneficiary_share, ReceiptType::HarvestFee)];
        if let Some(sink) = self.sink {
            shares.push((sink, sink_share, ReceiptType::NetworkFeeSink));
        }

        for (target, amount, receipt_type) in shares {
            if amount.is_zero() {
                continue;
            }
            match context.mode {
                NotifyMode::Commit => {
                    credit_account(context, target, self.currency_token_id, amount)?;
                    context.add_receipt(Receipt::BalanceChange {
                        receipt_type,
                        target,
                        token_id: self.currency_token_id,
                        amount,
                    });
                }
                NotifyMode::Rollback => {
                    debit_account(context, target, self.currency_token_id, amount, self.name())?
                }
            }
        }
        Ok(())
    }
}

/// Rejects entities of other networks
pub struct NetworkValidator {
    network: NetworkIdentifier,
}

impl NetworkValidator {
    /// Validator accepting `network` only
    pub fn new(network: NetworkIdentifier) -> Self {
        NetworkValidator { network }
    }
}

impl StatelessValidator for NetworkValidator {
    fn name(&self) -> &'static str {
        "NetworkValidator"
    }

    fn validate(&self, notification: &Notification) -> ValidationResult {
        match notification {
            Notification::Entity { network, .. } => {
                ValidationResult::check(*network == self.network, ValidationFailure::WrongNetwork)
            }
            _ => ValidationResult::Success,
        }
    }
}

/// Rejects unsupported entity versions
pub struct EntityVersionValidator;

impl StatelessValidator for EntityVersionValidator {
    fn name(&self) -> &'static str {
        "EntityVersionValidator"
    }

    fn validate(&self, notification: &Notification) -> ValidationResult {
        match notification {
            Notification::Entity { version, .. } => {
                ValidationResult::check(*version == 1, ValidationFailure::InvalidVersion)
            }
            _ => ValidationResult::Success,
        }
    }
}

/// Verifies entity signatures
pub struct SignatureValidator;

impl StatelessValidator for SignatureValidator {
    fn name(&self) -> &'static str {
        "SignatureValidator"
    }

    fn validate(&self, notification: &Notification) -> ValidationResult {
        match notification {
            Notification::Signature {
                signer,
                signature,
                data,
            } => ValidationResult::check(
                signer.verify_signature(data, signature).is_ok(),
                ValidationFailure::InvalidSignature,
            ),
            _ => ValidationResult::Success,
        }
    }
}

/// Bounds the number of transactions per block
pub struct MaxTransactionsValidator {
    max_transactions: u32,
}

impl MaxTransactionsValidator {
    /// Validator accepting up to `max_transactions` per block
    pub fn new(max_transactions: u32) -> Self {
        MaxTransactionsValidator { max_transactions }
    }
}

impl StatelessValidator for MaxTransactionsValidator {
    fn name(&self) -> &'static str {
        "MaxTransactionsValidator"
    }

    fn validate(&self, notification: &Notification) -> ValidationResult {
        match notification {
            Notification::Block {
                num_transactions, ..
            } => ValidationResult::check(
                *num_transactions <= self.max_transactions,
                ValidationFailure::TooManyTransactions,
            ),
            _ => ValidationResult::Success,
        }
    }
}

/// Rejects transactions charged more than their maximum fee
pub struct TransactionFeeValidator;

impl StatelessValidator for TransactionFeeValidator {
    fn name(&self) -> &'static str {
        "TransactionFeeValidator"
    }

    fn validate(&self, notification: &Notification) -> ValidationResult {
        match notification {
            Notification::TransactionFee { fee, max_fee, .. } => {
                ValidationResult::check(fee <= max_fee, ValidationFailure::InsufficientFee)
            }
            _ => ValidationResult::Success,
        }
    }
}

/// Checks that senders can afford transfers and debits.
///
/// The genesis block is exempt: its balances are created by the transfers themselves.
pub struct BalanceValidator;

impl StatefulValidator for BalanceValidator {
    fn name(&self) -> &'static str {
        "BalanceValidator"
    }

    fn validate(
        &self,
        notification: &Notification,
        context: &ValidatorContext<'_>,
    ) -> Result<ValidationResult, ChainError> {
        let (sender, token_id, amount) = match notification {
            Notification::BalanceTransfer {
                sender,
                token_id,
                amount,
                ..
            }
            | Notification::BalanceDebit {
                sender,
                token_id,
                amount,
            } => (sender, token_id, amount),
            _ => return Ok(ValidationResult::Success),
        };
        if context.height == Height::GENESIS || amount.is_zero() {
            return Ok(ValidationResult::Success);
        }
        let Some(token_id) = context.resolve(*token_id)? else {
            return Ok(ValidationResult::Failure(ValidationFailure::UnknownToken));
        };
        let balance = context
            .delta
            .sub::<AccountStateCache>()
            .find(sender)?
            .map(|account| account.balance(token_id))
            .unwrap_or_else(Amount::zero);
        Ok(ValidationResult::check(
            balance >= *amount,
            ValidationFailure::InsufficientBalance,
        ))
    }
}

/// Checks transaction deadlines against the block time, except in the genesis block
pub struct DeadlineValidator;

impl StatefulValidator for DeadlineValidator {
    fn name(&self) -> &'static str {
        "DeadlineValidator"
    }

    fn validate(
        &self,
        notification: &Notification,
        context: &ValidatorContext<'_>,
    ) -> Result<ValidationResult, ChainError> {
        let Notification::TransactionDeadline {
            deadline,
            max_lifetime_ms,
        } = notification
        else {
            return Ok(ValidationResult::Success);
        };
        if context.height == Height::GENESIS {
            return Ok(ValidationResult::Success);
        }
        if *deadline < context.block_time {
            return Ok(ValidationResult::Failure(ValidationFailure::PastDeadline));
        }
        Ok(ValidationResult::check(
            deadline.millis_since(context.block_time) <= *max_lifetime_ms,
            ValidationFailure::FutureDeadline,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_exports::create_test_configuration;
    use bitxor_cache::{CacheConfiguration, CacheDelta, CoreCache};
    use bitxor_hash::Hash;
    use bitxor_models::config::BlockchainConfiguration;
    use bitxor_models::receipt::BlockStatementBuilder;
    use bitxor_models::timestamp::Timestamp;
    use bitxor_signature::KeyPair;

    fn address(seed: u8) -> Address {
        Address::from_public_key(
            &KeyPair::from_bytes(&[seed; 32]).get_public_key(),
            NetworkIdentifier::PrivateTest,
        )
    }

    fn notify(
        observer: &mut dyn NotificationObserver,
        notification: &Notification,
        delta: &mut CacheDelta,
        config: &BlockchainConfiguration,
        mode: NotifyMode,
        builder: Option<&mut BlockStatementBuilder>,
    ) {
        let mut context = ObserverContext {
            delta,
            height: Height(5),
            mode,
            config,
            statement_builder: builder,
        };
        observer.notify(notification, &mut context).unwrap();
    }

    fn balance(delta: &CacheDelta, address: &Address, token_id: TokenId) -> Amount {
        delta
            .sub::<AccountStateCache>()
            .find(address)
            .unwrap()
            .map(|account| account.balance(token_id))
            .unwrap_or_else(Amount::zero)
    }

    #[test]
    fn transfer_moves_balance_and_rolls_back() {
        let config = create_test_configuration();
        let token_id = config.currency_token_id;
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let mut sender = AccountState::new(address(1), Height(1));
        sender.credit(token_id, Amount::from_raw(100)).unwrap();
        delta.sub_mut::<AccountStateCache>().insert(&sender).unwrap();

        let notification = Notification::BalanceTransfer {
            sender: address(1),
            recipient: address(2),
            token_id: token_id.unresolve(),
            amount: Amount::from_raw(40),
        };
        let mut observer = BalanceTransferObserver;
        notify(&mut observer, &notification, &mut delta, &config, NotifyMode::Commit, None);
        assert_eq!(balance(&delta, &address(1), token_id), Amount::from_raw(60));
        assert_eq!(balance(&delta, &address(2), token_id), Amount::from_raw(40));

        notify(&mut observer, &notification, &mut delta, &config, NotifyMode::Rollback, None);
        assert_eq!(balance(&delta, &address(1), token_id), Amount::from_raw(100));
        assert_eq!(balance(&delta, &address(2), token_id), Amount::zero());
    }

    #[test]
    fn account_address_rollback_removes_new_accounts_only() {
        let config = create_test_configuration();
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let notification = Notification::AccountAddress { address: address(3) };
        let mut observer = AccountAddressObserver;

        notify(&mut observer, &notification, &mut delta, &config, NotifyMode::Commit, None);
        assert!(delta.sub::<AccountStateCache>().contains(&address(3)).unwrap());
        notify(&mut observer, &notification, &mut delta, &config, NotifyMode::Rollback, None);
        assert!(!delta.sub::<AccountStateCache>().contains(&address(3)).unwrap());

        delta
            .sub_mut::<AccountStateCache>()
            .insert(&AccountState::new(address(4), Height(2)))
            .unwrap();
        let notification = Notification::AccountAddress { address: address(4) };
        notify(&mut observer, &notification, &mut delta, &config, NotifyMode::Rollback, None);
        assert!(delta.sub::<AccountStateCache>().contains(&address(4)).unwrap());
    }

    #[test]
    fn harvest_fee_is_split_with_the_sink() {
        let config = create_test_configuration();
        let token_id = config.currency_token_id;
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let mut builder = BlockStatementBuilder::new();
        let mut observer = HarvestFeeObserver::new(token_id, Some(address(9)), 25);
        let notification = Notification::Block {
            harvester: address(1),
            beneficiary: address(2),
            timestamp: Timestamp(1),
            difficulty: 1,
            fee_multiplier: 1,
            total_fee: Amount::from_raw(200),
            num_transactions: 2,
        };

        notify(
            &mut observer,
            &notification,
            &mut delta,
            &config,
            NotifyMode::Commit,
            Some(&mut builder),
        );
        assert_eq!(balance(&delta, &address(2), token_id), Amount::from_raw(150));
        assert_eq!(balance(&delta, &address(9), token_id), Amount::from_raw(50));
        let statement = builder.build();
        let receipts: Vec<&Receipt> = statement
            .transaction_statements
            .values()
            .flat_map(|statement| statement.receipts.iter())
            .collect();
        assert_eq!(receipts.len(), 2);

        notify(&mut observer, &notification, &mut delta, &config, NotifyMode::Rollback, None);
        assert_eq!(balance(&delta, &address(2), token_id), Amount::zero());
        assert_eq!(balance(&delta, &address(9), token_id), Amount::zero());
    }

    #[test]
    fn statistics_and_transaction_count_follow_blocks() {
        let config = create_test_configuration();
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let notification = Notification::Block {
            harvester: address(1),
            beneficiary: address(1),
            timestamp: Timestamp(77),
            difficulty: 3,
            fee_multiplier: 2,
            total_fee: Amount::zero(),
            num_transactions: 4,
        };
        for observer in [
            &mut BlockStatisticObserver as &mut dyn NotificationObserver,
            &mut TotalTransactionsObserver,
        ] {
            notify(observer, &notification, &mut delta, &config, NotifyMode::Commit, None);
        }
        assert_eq!(delta.dependent_state().num_total_transactions, 4);
        let statistic = delta
            .sub::<BlockStatisticCache>()
            .find(&Height(5))
            .unwrap()
            .unwrap();
        assert_eq!(statistic.timestamp, Timestamp(77));

        for observer in [
            &mut TotalTransactionsObserver as &mut dyn NotificationObserver,
            &mut BlockStatisticObserver,
        ] {
            notify(observer, &notification, &mut delta, &config, NotifyMode::Rollback, None);
        }
        assert_eq!(delta.dependent_state().num_total_transactions, 0);
        assert!(delta.sub::<BlockStatisticCache>().is_empty());
    }

    #[test]
    fn stateless_validators_check_their_notifications() {
        let entity = Notification::Entity {
            network: NetworkIdentifier::Mainnet,
            entity_type: bitxor_models::entity::EntityType::TRANSFER,
            version: 2,
        };
        assert_eq!(
            NetworkValidator::new(NetworkIdentifier::PrivateTest).validate(&entity),
            ValidationResult::Failure(ValidationFailure::WrongNetwork)
        );
        assert_eq!(
            EntityVersionValidator.validate(&entity),
            ValidationResult::Failure(ValidationFailure::InvalidVersion)
        );

        let keypair = KeyPair::from_bytes(&[7; 32]);
        let data = Hash::compute_from(b"data");
        let signature = keypair.sign(&data);
        assert_eq!(
            SignatureValidator.validate(&Notification::Signature {
                signer: keypair.get_public_key(),
                signature,
                data,
            }),
            ValidationResult::Success
        );
        assert_eq!(
            SignatureValidator.validate(&Notification::Signature {
                signer: keypair.get_public_key(),
                signature,
                data: Hash::compute_from(b"other"),
            }),
            ValidationResult::Failure(ValidationFailure::InvalidSignature)
        );
        assert_eq!(
            TransactionFeeValidator.validate(&Notification::TransactionFee {
                transaction_size: 10,
                fee: Amount::from_raw(11),
                max_fee: Amount::from_raw(10),
            }),
            ValidationResult::Failure(ValidationFailure::InsufficientFee)
        );
    }

    #[test]
    fn stateful_checks_are_skipped_for_the_genesis_block() {
        let config = create_test_configuration();
        let cache = CoreCache::new(CacheConfiguration::default());
        let delta = cache.create_delta();
        let debit = Notification::BalanceDebit {
            sender: address(1),
            token_id: config.currency_token_id.unresolve(),
            amount: Amount::from_raw(1),
        };
        let deadline = Notification::TransactionDeadline {
            deadline: Timestamp(0),
            max_lifetime_ms: 10,
        };
        let context = |height| ValidatorContext {
            delta: &delta,
            height,
            block_time: Timestamp(1_000),
            config: &config,
        };

        assert_eq!(
            BalanceValidator.validate(&debit, &context(Height(1))).unwrap(),
            ValidationResult::Success
        );
        assert_eq!(
            BalanceValidator.validate(&debit, &context(Height(2))).unwrap(),
            ValidationResult::Failure(ValidationFailure::InsufficientBalance)
        );
        assert_eq!(
            DeadlineValidator.validate(&deadline, &context(Height(1))).unwrap(),
            ValidationResult::Success
        );
        assert_eq!(
            DeadlineValidator.validate(&deadline, &context(Height(2))).unwrap(),
            ValidationResult::Failure(ValidationFailure::PastDeadline)
        );
    }
}
