//! Property-based tests using proptest
//!
//! These tests verify the resource id codec: decoding inverts encoding,
//! canonical ids survive a decode/encode cycle byte-for-byte, and
//! misspelled or extended paths are rejected.

use azrm::resource::types::batch_pool::BatchPoolId;
use azrm::resource::types::resource_group::ResourceGroupId;
use azrm::resource::types::subnet::SubnetId;
use azrm::resourceid::{IdError, ResourceId, ResourceIdentifier};
use proptest::prelude::*;

/// A single id value: never empty, never contains `/`
fn arb_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9._()-]{0,23}"
}

fn arb_subscription() -> impl Strategy<Value = String> {
    "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"
}

fn arb_pool_id() -> impl Strategy<Value = BatchPoolId> {
    (arb_subscription(), arb_value(), arb_value(), arb_value()).prop_map(
        |(subscription_id, resource_group, batch_account_name, name)| BatchPoolId {
            subscription_id,
            resource_group,
            batch_account_name,
            name,
        },
    )
}

fn arb_subnet_id() -> impl Strategy<Value = SubnetId> {
    (arb_subscription(), arb_value(), arb_value(), arb_value()).prop_map(
        |(subscription_id, resource_group, virtual_network_name, name)| SubnetId {
            subscription_id,
            resource_group,
            virtual_network_name,
            name,
        },
    )
}

proptest! {
    /// Decode(Encode(x)) == x
    #[test]
    fn pool_id_round_trips(id in arb_pool_id()) {
        let encoded = id.id();
        let decoded = BatchPoolId::parse(&encoded).unwrap();
        prop_assert_eq!(decoded, id);
    }

    #[test]
    fn subnet_id_round_trips(id in arb_subnet_id()) {
        let decoded: SubnetId = id.to_string().parse().unwrap();
        prop_assert_eq!(decoded, id);
    }

    #[test]
    fn resource_group_id_round_trips(sub in arb_subscription(), name in arb_value()) {
        let id = ResourceGroupId::new(sub, name);
        prop_assert_eq!(ResourceGroupId::parse(&id.id()).unwrap(), id);
    }

    /// Encode(Decode(s)) == s for canonical s
    #[test]
    fn canonical_id_is_reproduced(id in arb_pool_id()) {
        let canonical = id.id();
        let reencoded = BatchPoolId::parse(&canonical).unwrap().id();
        prop_assert_eq!(&reencoded, &canonical);

        let generic = ResourceIdentifier::parse(&canonical).unwrap();
        prop_assert_eq!(generic.to_string(), canonical);
    }

    /// The generic decoder sees the same names as the typed one
    #[test]
    fn generic_decoder_agrees(id in arb_pool_id()) {
        let generic = ResourceIdentifier::parse(&id.id()).unwrap();
        prop_assert_eq!(generic.subscription_id, id.subscription_id);
        prop_assert_eq!(generic.resource_group, Some(id.resource_group));
        prop_assert_eq!(generic.namespace.as_deref(), Some("Microsoft.Batch"));
        prop_assert_eq!(generic.resources.len(), 2);
        prop_assert_eq!(&generic.resources[1].name, &id.name);
    }

    #[test]
    fn leading_slash_is_optional(id in arb_pool_id()) {
        let canonical = id.id();
        let without = canonical.trim_start_matches('/');
        prop_assert_eq!(BatchPoolId::parse(without).unwrap(), id);
    }

    /// Upper-cased keywords are rejected
    #[test]
    fn uppercase_keywords_fail(
        id in arb_pool_id(),
        keyword in prop_oneof!["subscriptions", "resourceGroups", "providers", "batchAccounts", "pools"],
    ) {
        let canonical = id.id();
        let needle = format!("/{}/", keyword);
        let shouted = canonical.replacen(&needle, &needle.to_uppercase(), 1);
        let result = BatchPoolId::parse(&shouted);
        prop_assert!(
            matches!(result, Err(IdError::MalformedIdentifier { .. })),
            "expected MalformedIdentifier for {}",
            shouted
        );
    }

    /// A missing trailing value is malformed
    #[test]
    fn missing_name_fails(id in arb_pool_id()) {
        let truncated = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Batch/batchAccounts/{}/pools/",
            id.subscription_id, id.resource_group, id.batch_account_name
        );
        let result = BatchPoolId::parse(&truncated);
        prop_assert!(
            matches!(result, Err(IdError::MalformedIdentifier { .. })),
            "expected MalformedIdentifier for {}",
            truncated
        );
    }

    /// Extra segments after a complete id are reported, not ignored
    #[test]
    fn trailing_segments_fail(id in arb_pool_id(), child in arb_value(), name in arb_value()) {
        let extended = format!("{}/{}/{}", id.id(), child, name);
        let result = BatchPoolId::parse(&extended);
        prop_assert!(
            matches!(result, Err(IdError::UnexpectedSegments { .. })),
            "expected UnexpectedSegments for {}",
            extended
        );
    }

    /// Parsing never panics on arbitrary input
    #[test]
    fn parse_never_panics(input in "\\PC{0,120}") {
        let _ = BatchPoolId::parse(&input);
        let _ = ResourceIdentifier::parse(&input);
    }
}

#[test]
fn empty_id_is_malformed() {
    assert!(matches!(
        BatchPoolId::parse(""),
        Err(IdError::MalformedIdentifier { .. })
    ));
    assert!(matches!(
        ResourceIdentifier::parse(""),
        Err(IdError::MalformedIdentifier { .. })
    ));
}
