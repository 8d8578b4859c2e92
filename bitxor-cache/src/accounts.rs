// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::CacheError;
use crate::sub_cache::{deserialization_error, SubCacheDescriptor, SubCacheId};
use bitxor_models::address::{Address, AddressDeserializer, AddressSerializer};
use bitxor_models::amount::Amount;
use bitxor_models::height::{Height, HeightDeserializer, HeightSerializer};
use bitxor_models::token::{IdentifierSerializer, TokenId, TokenIdDeserializer};
use bitxor_serialization::{
    deserialize_exact, Deserializer, SerializeError, Serializer, U32VarIntDeserializer,
    U32VarIntSerializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use bitxor_signature::{PublicKey, PublicKeyDeserializer, PublicKeySerializer};
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::number::complete::le_u8;
use nom::sequence::tuple;
use nom::IResult;
use std::collections::BTreeMap;
use std::ops::Bound::Included;

/// Maximum number of distinct token balances held by an account
pub const MAX_ACCOUNT_BALANCES: u32 = 1_000;

/// State of an account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountState {
    /// address of the account
    pub address: Address,
    /// height at which the address became known
    pub address_height: Height,
    /// public key, once revealed by a signed entity
    pub public_key: Option<PublicKey>,
    /// height at which the public key became known
    pub public_key_height: Height,
    /// non zero balances per token
    pub balances: BTreeMap<TokenId, Amount>,
}

impl AccountState {
    /// Account known by address only
    pub fn new(address: Address, address_height: Height) -> Self {
        AccountState {
            address,
            address_height,
            public_key: None,
            public_key_height: Height(0),
            balances: BTreeMap::new(),
        }
    }

    /// Balance of `token_id`
    pub fn balance(&self, token_id: TokenId) -> Amount {
        self.balances
            .get(&token_id)
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    /// Adds `amount` to the balance of `token_id`
    pub fn credit(&mut self, token_id: TokenId, amount: Amount) -> Result<(), CacheError> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self
            .balance(token_id)
            .checked_add(amount)
            .ok_or(CacheError::BalanceOverflow {
                address: self.address,
                token_id,
            })?;
        self.balances.insert(token_id, balance);
        Ok(())
    }

    /// Subtracts `amount` from the balance of `token_id`
    pub fn debit(&mut self, token_id: TokenId, amount: Amount) -> Result<(), CacheError> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self
            .balance(token_id)
            .checked_sub(amount)
            .ok_or(CacheError::InsufficientBalance {
                address: self.address,
                token_id,
            })?;
        if balance.is_zero() {
            self.balances.remove(&token_id);
        } else {
            self.balances.insert(token_id, balance);
        }
        Ok(())
    }
}

/// Serializer for `AccountState`
#[derive(Clone, Default)]
pub struct AccountStateSerializer {
    address_serializer: AddressSerializer,
    height_serializer: HeightSerializer,
    public_key_serializer: PublicKeySerializer,
    identifier_serializer: IdentifierSerializer,
    u32_serializer: U32VarIntSerializer,
    u64_serializer: U64VarIntSerializer,
}

impl AccountStateSerializer {
    /// Creates an `AccountStateSerializer`
    pub const fn new() -> Self {
        Self {
            address_serializer: AddressSerializer::new(),
            height_serializer: HeightSerializer::new(),
            public_key_serializer: PublicKeySerializer::new(),
            identifier_serializer: IdentifierSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<AccountState> for AccountStateSerializer {
    fn serialize(&self, value: &AccountState, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.address_serializer.serialize(&value.address, buffer)?;
        self.height_serializer
            .serialize(&value.address_height, buffer)?;
        match &value.public_key {
            Some(public_key) => {
                buffer.push(1);
                self.public_key_serializer.serialize(public_key, buffer)?;
            }
            None => buffer.push(0),
        }
        self.height_serializer
            .serialize(&value.public_key_height, buffer)?;

        let count: u32 = value.balances.len().try_into().map_err(|_| {
            SerializeError::NumberTooBig("too many balances in account".to_string())
        })?;
        self.u32_serializer.serialize(&count, buffer)?;
        for (token_id, amount) in value.balances.iter() {
            self.identifier_serializer.serialize(token_id, buffer)?;
            self.u64_serializer.serialize(&amount.to_raw(), buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `AccountState`
#[derive(Clone)]
pub struct AccountStateDeserializer {
    address_deserializer: AddressDeserializer,
    height_deserializer: HeightDeserializer,
    public_key_deserializer: PublicKeyDeserializer,
    token_id_deserializer: TokenIdDeserializer,
    count_deserializer: U32VarIntDeserializer,
    amount_deserializer: U64VarIntDeserializer,
}

impl AccountStateDeserializer {
    /// Creates an `AccountStateDeserializer`
    pub const fn new() -> Self {
        Self {
            address_deserializer: AddressDeserializer::new(),
            height_deserializer: HeightDeserializer::new(),
            public_key_deserializer: PublicKeyDeserializer::new(),
            token_id_deserializer: TokenIdDeserializer::new(),
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_ACCOUNT_BALANCES),
            ),
            amount_deserializer: U64VarIntDeserializer::new(Included(1), Included(u64::MAX)),
        }
    }

    fn deserialize_public_key<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Option<PublicKey>, E> {
        let (rest, flag) = le_u8(buffer)?;
        match flag {
            0 => Ok((rest, None)),
            1 => self
                .public_key_deserializer
                .deserialize(rest)
                .map(|(rest, public_key)| (rest, Some(public_key))),
            _ => Err(nom::Err::Error(ParseError::from_error_kind(
                buffer,
                nom::error::ErrorKind::Switch,
            ))),
        }
    }
}

impl Default for AccountStateDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<AccountState> for AccountStateDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], AccountState, E> {
        context(
            "Failed AccountState deserialization",
            tuple((
                |input| self.address_deserializer.deserialize(input),
                |input| self.height_deserializer.deserialize(input),
                |input| self.deserialize_public_key(input),
                |input| self.height_deserializer.deserialize(input),
                length_count(
                    |input| self.count_deserializer.deserialize(input),
                    tuple((
                        |input| self.token_id_deserializer.deserialize(input),
                        |input| self.amount_deserializer.deserialize(input),
                    )),
                ),
            )),
        )(buffer)
        .map(
            |(rest, (address, address_height, public_key, public_key_height, balances))| {
                (
                    rest,
                    AccountState {
                        address,
                        address_height,
                        public_key,
                        public_key_height,
                        balances: balances
                            .into_iter()
                            .map(|(token_id, raw)| (token_id, Amount::from_raw(raw)))
                            .collect(),
                    },
                )
            },
        )
    }
}

/// Accounts keyed by address
pub struct AccountStateCache;

impl SubCacheDescriptor for AccountStateCache {
    const ID: SubCacheId = SubCacheId::AccountState;
    type Key = Address;
    type Value = AccountState;

    fn key_of(value: &AccountState) -> Address {
        value.address
    }

    fn serialize_key(key: &Address) -> Result<Vec<u8>, CacheError> {
        Ok(key.to_bytes().to_vec())
    }

    fn deserialize_key(bytes: &[u8]) -> Result<Address, CacheError> {
        deserialize_exact(&AddressDeserializer::new(), bytes)
            .map_err(deserialization_error::<Self>)
    }

    fn serialize_value(value: &AccountState) -> Result<Vec<u8>, CacheError> {
        let mut buffer = Vec::new();
        AccountStateSerializer::new().serialize(value, &mut buffer)?;
        Ok(buffer)
    }

    fn deserialize_value(bytes: &[u8]) -> Result<AccountState, CacheError> {
        deserialize_exact(&AccountStateDeserializer::new(), bytes)
            .map_err(deserialization_error::<Self>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bitxor_models::network::NetworkIdentifier;
    use bitxor_signature::KeyPair;

    fn account() -> AccountState {
        let public_key = KeyPair::generate().get_public_key();
        AccountState::new(
            Address::from_public_key(&public_key, NetworkIdentifier::PrivateTest),
            Height(3),
        )
    }

    #[test]
    fn credit_and_debit_balances() {
        let mut account = account();
        let token_id = TokenId(0x1234);
        account.credit(token_id, Amount::from_raw(100)).unwrap();
        account.debit(token_id, Amount::from_raw(40)).unwrap();
        assert_eq!(account.balance(token_id), Amount::from_raw(60));
        assert_matches!(
            account.debit(token_id, Amount::from_raw(61)),
            Err(CacheError::InsufficientBalance { .. })
        );
        account.debit(token_id, Amount::from_raw(60)).unwrap();
        assert!(account.balances.is_empty());
    }

    #[test]
    fn account_value_is_restored() {
        let keypair = KeyPair::generate();
        let mut account = account();
        account.public_key = Some(keypair.get_public_key());
        account.public_key_height = Height(4);
        account.credit(TokenId(1), Amount::from_raw(5)).unwrap();
        account.credit(TokenId(2), Amount::from_raw(u64::MAX)).unwrap();

        let bytes = AccountStateCache::serialize_value(&account).unwrap();
        assert_eq!(AccountStateCache::deserialize_value(&bytes).unwrap(), account);
        assert_matches!(
            AccountStateCache::deserialize_value(&bytes[..bytes.len() - 1]),
            Err(CacheError::Deserialization { .. })
        );
    }
}
