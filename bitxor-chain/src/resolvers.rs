// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::error::ChainError;
use bitxor_cache::{CacheDelta, NamespaceCache};
use bitxor_models::token::{TokenId, UnresolvedTokenId};

/// Resolves `unresolved` against the namespace aliases of `delta`.
///
/// Plain token ids resolve to themselves. Namespace ids resolve to the aliased token, or to
/// `None` when the namespace is unknown or has no alias.
pub fn resolve_token_id(
    delta: &CacheDelta,
    unresolved: UnresolvedTokenId,
) -> Result<Option<TokenId>, ChainError> {
    if !unresolved.is_namespace_alias() {
        return Ok(Some(TokenId(unresolved.0)));
    }

    Ok(delta
        .sub::<NamespaceCache>()
        .find(&unresolved.as_namespace())?
        .and_then(|entry| entry.alias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitxor_cache::{CacheConfiguration, CoreCache, NamespaceEntry};
    use bitxor_models::address::Address;
    use bitxor_models::height::Height;
    use bitxor_models::network::NetworkIdentifier;
    use bitxor_models::token::NamespaceId;
    use bitxor_signature::KeyPair;

    #[test]
    fn aliases_resolve_through_namespaces() {
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        let namespace_id = NamespaceId::from_name("bitxor");
        let token_id = TokenId(0x1234);
        delta
            .sub_mut::<NamespaceCache>()
            .insert(&NamespaceEntry {
                id: namespace_id,
                name: "bitxor".to_string(),
                owner: Address::from_public_key(
                    &KeyPair::from_bytes(&[1; 32]).get_public_key(),
                    NetworkIdentifier::PrivateTest,
                ),
                registration_height: Height(1),
                alias: Some(token_id),
            })
            .unwrap();

        assert_eq!(
            resolve_token_id(&delta, namespace_id.as_unresolved_token()).unwrap(),
            Some(token_id)
        );
        assert_eq!(
            resolve_token_id(&delta, TokenId(0x55).unresolve()).unwrap(),
            Some(TokenId(0x55))
        );
        assert_eq!(
            resolve_token_id(&delta, NamespaceId::from_name("other").as_unresolved_token())
                .unwrap(),
            None
        );
    }
}
