// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::address::Address;
use crate::amount::Amount;
use crate::token::{TokenId, UnresolvedTokenId};
use bitxor_hash::{Hash, MerkleHashBuilder};
use std::collections::BTreeMap;

/// Receipt type, part of the hashed receipt content
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum ReceiptType {
    /// harvest fee credited to the beneficiary
    HarvestFee = 0x2143,
    /// fee credited to the network sink
    NetworkFeeSink = 0x2243,
    /// token creation charge
    TokenRental = 0x124D,
    /// namespace rental fee
    NamespaceRental = 0x124E,
    /// inflation
    Inflation = 0x5143,
    /// token balance credit
    BalanceCredit = 0x3143,
    /// token balance debit
    BalanceDebit = 0x3243,
}

/// A typed side effect recorded while executing a block
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receipt {
    /// tokens moved from `sender` to `recipient`
    BalanceTransfer {
        /// receipt type
        receipt_type: ReceiptType,
        /// debited account
        sender: Address,
        /// credited account
        recipient: Address,
        /// token
        token_id: TokenId,
        /// amount
        amount: Amount,
    },
    /// tokens credited to or debited from `target`
    BalanceChange {
        /// receipt type
        receipt_type: ReceiptType,
        /// account
        target: Address,
        /// token
        token_id: TokenId,
        /// amount
        amount: Amount,
    },
    /// tokens created out of thin air
    Inflation {
        /// token
        token_id: TokenId,
        /// amount
        amount: Amount,
    },
}

impl Receipt {
    /// Deterministic bytes, hashed as part of the statement
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            Receipt::BalanceTransfer {
                receipt_type,
                sender,
                recipient,
                token_id,
                amount,
            } => {
                bytes.extend_from_slice(&(*receipt_type as u16).to_le_bytes());
                bytes.extend_from_slice(&token_id.0.to_le_bytes());
                bytes.extend_from_slice(&amount.to_raw().to_le_bytes());
                bytes.extend_from_slice(sender.to_bytes());
                bytes.extend_from_slice(recipient.to_bytes());
            }
            Receipt::BalanceChange {
                receipt_type,
                target,
                token_id,
                amount,
            } => {
                bytes.extend_from_slice(&(*receipt_type as u16).to_le_bytes());
                bytes.extend_from_slice(&token_id.0.to_le_bytes());
                bytes.extend_from_slice(&amount.to_raw().to_le_bytes());
                bytes.extend_from_slice(target.to_bytes());
            }
            Receipt::Inflation { token_id, amount } => {
                bytes.extend_from_slice(&(ReceiptType::Inflation as u16).to_le_bytes());
                bytes.extend_from_slice(&token_id.0.to_le_bytes());
                bytes.extend_from_slice(&amount.to_raw().to_le_bytes());
            }
        }
        bytes
    }
}

/// Identifies what produced a receipt: `(transaction index + 1, 0)` for top level transactions,
/// `(0, 0)` for the block itself
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReceiptSource {
    /// primary id
    pub primary_id: u32,
    /// secondary id
    pub secondary_id: u32,
}

impl ReceiptSource {
    fn to_bytes(self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.primary_id.to_le_bytes());
        bytes[4..].copy_from_slice(&self.secondary_id.to_le_bytes());
        bytes
    }
}

/// Receipts produced by one source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionStatement {
    /// source
    pub source: ReceiptSource,
    /// receipts, in the order they were produced
    pub receipts: Vec<Receipt>,
}

impl TransactionStatement {
    /// Statement hash
    pub fn hash(&self) -> Hash {
        let receipt_bytes: Vec<Vec<u8>> = self.receipts.iter().map(Receipt::to_bytes).collect();
        let source = self.source.to_bytes();
        let mut chunks: Vec<&[u8]> = vec![b"transaction-statement".as_slice(), source.as_slice()];
        chunks.extend(receipt_bytes.iter().map(|bytes| bytes.as_slice()));
        Hash::compute_from_tuple(&chunks)
    }
}

/// Resolutions of one unresolved token id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenResolutionStatement {
    /// unresolved value
    pub unresolved: UnresolvedTokenId,
    /// resolved values, each with the source from which it applies
    pub entries: Vec<(ReceiptSource, TokenId)>,
}

impl TokenResolutionStatement {
    /// Statement hash
    pub fn hash(&self) -> Hash {
        let mut bytes = Vec::with_capacity(8 + self.entries.len() * 16);
        bytes.extend_from_slice(&self.unresolved.0.to_le_bytes());
        for (source, resolved) in self.entries.iter() {
            bytes.extend_from_slice(&source.to_bytes());
            bytes.extend_from_slice(&resolved.0.to_le_bytes());
        }
        Hash::compute_from_tuple(&[b"resolution-statement".as_slice(), bytes.as_slice()])
    }
}

/// All statements of a block
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockStatement {
    /// receipts grouped by source
    pub transaction_statements: BTreeMap<ReceiptSource, TransactionStatement>,
    /// token resolutions grouped by unresolved value
    pub token_resolution_statements: BTreeMap<UnresolvedTokenId, TokenResolutionStatement>,
}

impl BlockStatement {
    /// Merkle root of all statement hashes: transaction statements first, then resolutions,
    /// each in key order. An empty statement hashes to zero.
    pub fn merkle_hash(&self) -> Hash {
        let mut builder = MerkleHashBuilder::with_capacity(
            self.transaction_statements.len() + self.token_resolution_statements.len(),
        );
        for statement in self.transaction_statements.values() {
            builder.update(statement.hash());
        }
        for statement in self.token_resolution_statements.values() {
            builder.update(statement.hash());
        }
        builder.final_hash()
    }
}

/// Builds a `BlockStatement` while a block is executed
#[derive(Debug, Default)]
pub struct BlockStatementBuilder {
    active_source: ReceiptSource,
    statement: BlockStatement,
}

impl BlockStatementBuilder {
    /// Creates an empty builder with the block as active source
    pub fn new() -> Self {
        Self::default()
    }

    /// Active source
    pub fn source(&self) -> ReceiptSource {
        self.active_source
    }

    /// Sets the active source
    pub fn set_source(&mut self, source: ReceiptSource) {
        self.active_source = source;
    }

    /// Adds a receipt attributed to the active source
    pub fn add_receipt(&mut self, receipt: Receipt) {
        let source = self.active_source;
        self.statement
            .transaction_statements
            .entry(source)
            .or_insert_with(|| TransactionStatement {
                source,
                receipts: Vec::new(),
            })
            .receipts
            .push(receipt);
    }

    /// Records a resolution. Repeated identical resolutions are only recorded once.
    pub fn add_resolution(&mut self, unresolved: UnresolvedTokenId, resolved: TokenId) {
        let source = self.active_source;
        let statement = self
            .statement
            .token_resolution_statements
            .entry(unresolved)
            .or_insert_with(|| TokenResolutionStatement {
                unresolved,
                entries: Vec::new(),
            });
        if let Some((_, last)) = statement.entries.last() {
            if *last == resolved {
                return;
            }
        }
        statement.entries.push((source, resolved));
    }

    /// Finishes the statement
    pub fn build(self) -> BlockStatement {
        self.statement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkIdentifier;
    use bitxor_signature::KeyPair;

    fn address() -> Address {
        Address::from_public_key(
            &KeyPair::generate().get_public_key(),
            NetworkIdentifier::PrivateTest,
        )
    }

    #[test]
    fn empty_statement_hashes_to_zero() {
        assert_eq!(BlockStatementBuilder::new().build().merkle_hash(), Hash::zero());
    }

    #[test]
    fn receipts_are_grouped_by_source() {
        let mut builder = BlockStatementBuilder::new();
        let target = address();
        builder.set_source(ReceiptSource {
            primary_id: 1,
            secondary_id: 0,
        });
        builder.add_receipt(Receipt::BalanceChange {
            receipt_type: ReceiptType::HarvestFee,
            target,
            token_id: TokenId(1),
            amount: Amount::from_raw(10),
        });
        builder.add_receipt(Receipt::Inflation {
            token_id: TokenId(1),
            amount: Amount::from_raw(5),
        });
        builder.set_source(ReceiptSource::default());
        builder.add_receipt(Receipt::Inflation {
            token_id: TokenId(1),
            amount: Amount::from_raw(7),
        });
        let statement = builder.build();
        assert_eq!(statement.transaction_statements.len(), 2);
        let first = statement
            .transaction_statements
            .values()
            .next()
            .unwrap();
        // block source (0, 0) sorts first
        assert_eq!(first.source, ReceiptSource::default());
        assert_ne!(statement.merkle_hash(), Hash::zero());
    }

    #[test]
    fn duplicate_resolutions_are_collapsed() {
        let mut builder = BlockStatementBuilder::new();
        let unresolved = UnresolvedTokenId(0x8000_0000_0000_0001);
        builder.add_resolution(unresolved, TokenId(5));
        builder.set_source(ReceiptSource {
            primary_id: 2,
            secondary_id: 0,
        });
        builder.add_resolution(unresolved, TokenId(5));
        builder.add_resolution(unresolved, TokenId(6));
        let statement = builder.build();
        assert_eq!(
            statement.token_resolution_statements[&unresolved].entries.len(),
            2
        );
    }
}
