// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use bitxor_chain::{ChainError, Entity, EntityInfo, Notification, NotificationPublisher};
use bitxor_models::address::Address;
use bitxor_models::entity::EntityType;

/// Publisher adding the special accounts of the network to the genesis block notifications
pub struct GenesisNotificationPublisher {
    inner: Box<dyn NotificationPublisher>,
    special_accounts: Vec<Address>,
}

impl GenesisNotificationPublisher {
    /// Wraps `inner`. The harvest network fee sink, when configured, is created by the genesis block.
    pub fn new(
        inner: Box<dyn NotificationPublisher>,
        harvest_network_fee_sink: Option<Address>,
    ) -> Self {
        GenesisNotificationPublisher {
            inner,
            special_accounts: harvest_network_fee_sink.into_iter().collect(),
        }
    }
}

impl NotificationPublisher for GenesisNotificationPublisher {
    fn publish(
        &self,
        entity_info: &EntityInfo<'_>,
        sink: &mut Vec<Notification>,
    ) -> Result<(), ChainError> {
        self.inner.publish(entity_info, sink)?;
        if let Entity::Block(block) = entity_info.entity {
            if block.header.block_type == EntityType::BLOCK_GENESIS {
                sink.extend(
                    self.special_accounts
                        .iter()
                        .map(|address| Notification::AccountAddress { address: *address }),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_chain::publish_block;
    use bitxor_chain::test_exports::{create_signed_block, create_test_plugin_manager};
    use bitxor_models::height::Height;
    use bitxor_models::network::NetworkIdentifier;
    use bitxor_signature::KeyPair;

    fn sink_address() -> Address {
        Address::from_public_key(
            &KeyPair::from_bytes(&[3; 32]).get_public_key(),
            NetworkIdentifier::PrivateTest,
        )
    }

    fn count_sink_notifications(height: Height, sink: Option<Address>) -> usize {
        let plugins = create_test_plugin_manager();
        let publisher =
            GenesisNotificationPublisher::new(plugins.create_notification_publisher(), sink);
        let block = create_signed_block(&KeyPair::from_bytes(&[1; 32]), height, Vec::new());
        publish_block(&publisher, &block)
            .unwrap()
            .into_iter()
            .filter(|notification| {
                *notification
                    == Notification::AccountAddress {
                        address: sink_address(),
                    }
            })
            .count()
    }

    #[test]
    fn fee_sink_is_published_for_the_genesis_block_only() {
        assert_eq!(count_sink_notifications(Height::GENESIS, Some(sink_address())), 1);
        assert_eq!(count_sink_notifications(Height(2), Some(sink_address())), 0);
        assert_eq!(count_sink_notifications(Height::GENESIS, None), 0);
    }
}
