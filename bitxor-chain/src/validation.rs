// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::ChainError;
use crate::notifications::Notification;
use crate::resolvers::resolve_token_id;
use bitxor_cache::CacheDelta;
use bitxor_models::config::BlockchainConfiguration;
use bitxor_models::height::Height;
use bitxor_models::timestamp::Timestamp;
use bitxor_models::token::{TokenId, UnresolvedTokenId};
use displaydoc::Display;

/// Reason a notification was rejected
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ValidationFailure {
    /// Failure_Core_Wrong_Network
    WrongNetwork,
    /// Failure_Core_Invalid_Version
    InvalidVersion,
    /// Failure_Signature_Not_Verifiable
    InvalidSignature,
    /// Failure_Core_Too_Many_Transactions
    TooManyTransactions,
    /// Failure_Core_Insufficient_Balance
    InsufficientBalance,
    /// Failure_Core_Past_Deadline
    PastDeadline,
    /// Failure_Core_Future_Deadline
    FutureDeadline,
    /// Failure_Core_Insufficient_Fee
    InsufficientFee,
    /// Failure_Namespace_Already_Exists
    NamespaceAlreadyExists,
    /// Failure_Namespace_Invalid_Name
    InvalidNamespaceName,
    /// Failure_Namespace_Unknown
    UnknownNamespace,
    /// Failure_Namespace_Owner_Conflict
    NamespaceOwnerConflict,
    /// Failure_Namespace_Alias_Already_Exists
    AliasAlreadyExists,
    /// Failure_Token_Expired
    UnknownToken,
    /// Failure_Token_Already_Exists
    TokenAlreadyExists,
    /// Failure_Token_Invalid_Supply
    InvalidTokenSupply,
    /// Failure_Token_Invalid_Divisibility
    InvalidDivisibility,
}

impl ValidationFailure {
    /// Raw result code: failure severity bit, facility and code
    pub fn code(self) -> u32 {
        let (facility, code): (u32, u32) = match self {
            ValidationFailure::WrongNetwork => (0x43, 0x01),
            ValidationFailure::InvalidVersion => (0x43, 0x02),
            ValidationFailure::InvalidSignature => (0x53, 0x01),
            ValidationFailure::TooManyTransactions => (0x43, 0x03),
            ValidationFailure::InsufficientBalance => (0x43, 0x04),
            ValidationFailure::PastDeadline => (0x43, 0x05),
            ValidationFailure::FutureDeadline => (0x43, 0x06),
            ValidationFailure::InsufficientFee => (0x43, 0x07),
            ValidationFailure::NamespaceAlreadyExists => (0x4E, 0x01),
            ValidationFailure::InvalidNamespaceName => (0x4E, 0x02),
            ValidationFailure::UnknownNamespace => (0x4E, 0x03),
            ValidationFailure::NamespaceOwnerConflict => (0x4E, 0x04),
            ValidationFailure::AliasAlreadyExists => (0x4E, 0x05),
            ValidationFailure::UnknownToken => (0x4D, 0x01),
            ValidationFailure::TokenAlreadyExists => (0x4D, 0x02),
            ValidationFailure::InvalidTokenSupply => (0x4D, 0x03),
            ValidationFailure::InvalidDivisibility => (0x4D, 0x04),
        };
        0x8000_0000 | (facility << 16) | code
    }
}

/// Outcome of a validation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// the notification is valid
    Success,
    /// the validator has no opinion
    Neutral,
    /// the notification is invalid
    Failure(ValidationFailure),
}

impl ValidationResult {
    /// Whether the result is a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, ValidationResult::Failure(_))
    }

    /// Raw result code, as reported in transaction statuses
    pub fn code(&self) -> u32 {
        match self {
            ValidationResult::Success => 0,
            ValidationResult::Neutral => 0x4000_0000,
            ValidationResult::Failure(failure) => failure.code(),
        }
    }

    /// Fails with `failure` unless `condition` holds
    pub fn check(condition: bool, failure: ValidationFailure) -> ValidationResult {
        if condition {
            ValidationResult::Success
        } else {
            ValidationResult::Failure(failure)
        }
    }
}

/// Validates notifications without looking at the ledger state
pub trait StatelessValidator: Send + Sync {
    /// validator name, for logs
    fn name(&self) -> &'static str;

    /// validates `notification`
    fn validate(&self, notification: &Notification) -> ValidationResult;
}

/// Read access to the state seen by stateful validators
pub struct ValidatorContext<'a> {
    /// cache, including the changes of previous notifications
    pub delta: &'a CacheDelta,
    /// height of the block being validated
    pub height: Height,
    /// timestamp of the block being validated
    pub block_time: Timestamp,
    /// network configuration
    pub config: &'a BlockchainConfiguration,
}

impl<'a> ValidatorContext<'a> {
    /// Resolves a token id, `None` when it is an alias of an unknown or unaliased namespace
    pub fn resolve(&self, unresolved: UnresolvedTokenId) -> Result<Option<TokenId>, ChainError> {
        resolve_token_id(self.delta, unresolved)
    }
}

/// Validates notifications against the ledger state
pub trait StatefulValidator: Send + Sync {
    /// validator name, for logs
    fn name(&self) -> &'static str;

    /// validates `notification` against `context`
    fn validate(
        &self,
        notification: &Notification,
        context: &ValidatorContext<'_>,
    ) -> Result<ValidationResult, ChainError>;
}

/// Runs validators in order. The first failure wins; a neutral result is kept unless a
/// later validator fails.
pub struct AggregateStatelessValidator {
    validators: Vec<Box<dyn StatelessValidator>>,
}

impl AggregateStatelessValidator {
    /// Aggregates `validators`
    pub fn new(validators: Vec<Box<dyn StatelessValidator>>) -> Self {
        AggregateStatelessValidator { validators }
    }

    /// Names of the aggregated validators
    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|validator| validator.name()).collect()
    }
}

impl StatelessValidator for AggregateStatelessValidator {
    fn name(&self) -> &'static str {
        "AggregateStatelessValidator"
    }

    fn validate(&self, notification: &Notification) -> ValidationResult {
        let mut aggregate = ValidationResult::Success;
        for validator in self.validators.iter() {
            match validator.validate(notification) {
                ValidationResult::Failure(failure) => return ValidationResult::Failure(failure),
                ValidationResult::Neutral => aggregate = ValidationResult::Neutral,
                ValidationResult::Success => {}
            }
        }
        aggregate
    }
}

/// Stateful counterpart of `AggregateStatelessValidator`
pub struct AggregateStatefulValidator {
    validators: Vec<Box<dyn StatefulValidator>>,
}

impl AggregateStatefulValidator {
    /// Aggregates `validators`
    pub fn new(validators: Vec<Box<dyn StatefulValidator>>) -> Self {
        AggregateStatefulValidator { validators }
    }

    /// Names of the aggregated validators
    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|validator| validator.name()).collect()
    }
}

impl StatefulValidator for AggregateStatefulValidator {
    fn name(&self) -> &'static str {
        "AggregateStatefulValidator"
    }

    fn validate(
        &self,
        notification: &Notification,
        context: &ValidatorContext<'_>,
    ) -> Result<ValidationResult, ChainError> {
        let mut aggregate = ValidationResult::Success;
        for validator in self.validators.iter() {
            match validator.validate(notification, context)? {
                ValidationResult::Failure(failure) => {
                    return Ok(ValidationResult::Failure(failure))
                }
                ValidationResult::Neutral => aggregate = ValidationResult::Neutral,
                ValidationResult::Success => {}
            }
        }
        Ok(aggregate)
    }
}

/// Validates every notification, stopping at the first failure
pub fn validate_stateless(
    validator: &dyn StatelessValidator,
    notifications: &[Notification],
) -> Result<(), ChainError> {
    for notification in notifications {
        if let ValidationResult::Failure(failure) = validator.validate(notification) {
            return Err(ChainError::ValidationFailed {
                description: format!("stateless {}", notification.name()),
                failure,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_models::amount::Amount;
    use bitxor_models::timestamp::Timestamp;

    struct Fixed(&'static str, ValidationResult);

    impl StatelessValidator for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn validate(&self, _: &Notification) -> ValidationResult {
            self.1
        }
    }

    fn notification() -> Notification {
        Notification::TransactionFee {
            transaction_size: 100,
            fee: Amount::zero(),
            max_fee: Amount::zero(),
        }
    }

    #[test]
    fn first_failure_wins() {
        let aggregate = AggregateStatelessValidator::new(vec![
            Box::new(Fixed("a", ValidationResult::Neutral)),
            Box::new(Fixed("b", ValidationResult::Failure(ValidationFailure::PastDeadline))),
            Box::new(Fixed("c", ValidationResult::Failure(ValidationFailure::WrongNetwork))),
        ]);
        assert_eq!(aggregate.names(), vec!["a", "b", "c"]);
        assert_eq!(
            aggregate.validate(&notification()),
            ValidationResult::Failure(ValidationFailure::PastDeadline)
        );
    }

    #[test]
    fn neutral_is_kept_without_failure() {
        let aggregate = AggregateStatelessValidator::new(vec![
            Box::new(Fixed("a", ValidationResult::Success)),
            Box::new(Fixed("b", ValidationResult::Neutral)),
            Box::new(Fixed("c", ValidationResult::Success)),
        ]);
        assert_eq!(aggregate.validate(&notification()), ValidationResult::Neutral);
        assert_eq!(
            AggregateStatelessValidator::new(Vec::new()).validate(&notification()),
            ValidationResult::Success
        );
    }

    #[test]
    fn failure_codes_carry_the_severity_bit() {
        let code = ValidationFailure::InsufficientBalance.code();
        assert_eq!(code & 0x8000_0000, 0x8000_0000);
        assert_ne!(code, ValidationFailure::PastDeadline.code());
        assert_eq!(ValidationResult::Success.code(), 0);
        assert_eq!(ValidationFailure::WrongNetwork.to_string(), "Failure_Core_Wrong_Network");
    }

    #[test]
    fn validate_stateless_reports_the_notification() {
        let validator = Fixed("a", ValidationResult::Failure(ValidationFailure::FutureDeadline));
        let notifications = vec![Notification::TransactionDeadline {
            deadline: Timestamp(1),
            max_lifetime_ms: 1,
        }];
        match validate_stateless(&validator, &notifications) {
            Err(ChainError::ValidationFailed { description, failure }) => {
                assert_eq!(description, "stateless TransactionDeadline");
                assert_eq!(failure, ValidationFailure::FutureDeadline);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
