// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use serde::{Deserialize, Serialize};

/// Category of an entity, encoded in the two high bits of its type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasicEntityType {
    /// block entity
    Block,
    /// transaction entity
    Transaction,
    /// anything else
    Other,
}

/// Type of a block or transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(pub u16);

impl EntityType {
    /// genesis block
    pub const BLOCK_GENESIS: EntityType = EntityType(0x8043);
    /// normal block
    pub const BLOCK_NORMAL: EntityType = EntityType(0x8143);
    /// importance block
    pub const BLOCK_IMPORTANCE: EntityType = EntityType(0x8243);
    /// transfer transaction
    pub const TRANSFER: EntityType = EntityType(0x4154);
    /// namespace registration transaction
    pub const NAMESPACE_REGISTRATION: EntityType = EntityType(0x414E);
    /// token definition transaction
    pub const TOKEN_DEFINITION: EntityType = EntityType(0x414D);
    /// token alias transaction
    pub const TOKEN_ALIAS: EntityType = EntityType(0x434E);

    /// Category of the entity type
    pub fn basic_type(&self) -> BasicEntityType {
        match self.0 >> 14 {
            0b10 => BasicEntityType::Block,
            0b01 => BasicEntityType::Transaction,
            _ => BasicEntityType::Other,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            EntityType::BLOCK_GENESIS => write!(f, "Block_Genesis"),
            EntityType::BLOCK_NORMAL => write!(f, "Block_Normal"),
            EntityType::BLOCK_IMPORTANCE => write!(f, "Block_Importance"),
            EntityType::TRANSFER => write!(f, "Transfer"),
            EntityType::NAMESPACE_REGISTRATION => write!(f, "Namespace_Registration"),
            EntityType::TOKEN_DEFINITION => write!(f, "Token_Definition"),
            EntityType::TOKEN_ALIAS => write!(f, "Token_Alias"),
            EntityType(raw) => write!(f, "EntityType<0x{:04X}>", raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_types_are_derived_from_high_bits() {
        assert_eq!(EntityType::BLOCK_GENESIS.basic_type(), BasicEntityType::Block);
        assert_eq!(EntityType::BLOCK_IMPORTANCE.basic_type(), BasicEntityType::Block);
        assert_eq!(EntityType::TRANSFER.basic_type(), BasicEntityType::Transaction);
        assert_eq!(EntityType(0x0001).basic_type(), BasicEntityType::Other);
    }
}
