use cam_core::{
    normalize, CamError, EntityKind, ListQuery, Normalizer, OrderParam, SchemaRegistry,
    DEFAULT_LIMIT, MAX_LIMIT,
};
use proptest::prelude::*;

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
}

fn entity_strategy() -> impl Strategy<Value = EntityKind> {
    prop::sample::select(EntityKind::ALL.to_vec())
}

fn order_field_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "id",
        "created_at",
        "description",
        "status",
        "incident_role",
        "not_a_column",
    ])
    .prop_map(str::to_string)
}

fn list_query_strategy() -> impl Strategy<Value = ListQuery> {
    (
        0u32..2_000,
        0u64..10_000,
        "[a-z ]{0,12}",
        prop::collection::vec((order_field_strategy(), any::<bool>()), 0..4),
    )
        .prop_map(|(limit, offset, search_term, order)| ListQuery {
            limit,
            offset,
            search_term,
            order: order
                .into_iter()
                .map(|(id, desc)| OrderParam { id, desc })
                .collect(),
            ..Default::default()
        })
}

#[test]
fn unknown_filter_fails_before_anything_else() {
    let registry = registry();
    let params = vec![
        ("limit".to_string(), "5".to_string()),
        ("not_a_column".to_string(), "x".to_string()),
    ];
    let err = normalize(registry.get(EntityKind::Victim), &params).unwrap_err();
    assert!(matches!(err, CamError::InvalidFilterField { .. }));
}

proptest! {
    #[test]
    fn normalization_is_deterministic(entity in entity_strategy(), query in list_query_strategy()) {
        let registry = registry();
        let descriptor = registry.get(entity);
        let params = query.to_params();

        let first = normalize(descriptor, &params);
        let second = normalize(descriptor, &params);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn limit_is_always_within_bounds(raw in ".{0,8}", max in 1u32..500) {
        let registry = registry();
        let params = vec![("limit".to_string(), raw)];
        let query = Normalizer::new(max)
            .normalize(registry.get(EntityKind::Allegation), &params)
            .unwrap();
        prop_assert!(query.limit >= 1);
        prop_assert!(query.limit <= max);
    }

    #[test]
    fn requested_limit_is_honored_up_to_maximum(limit in 1u32..5_000) {
        let registry = registry();
        let params = vec![("limit".to_string(), limit.to_string())];
        let query = normalize(registry.get(EntityKind::Allegation), &params).unwrap();
        prop_assert_eq!(query.limit, limit.min(MAX_LIMIT));
    }

    #[test]
    fn order_always_ends_with_unique_id_tiebreaker(entity in entity_strategy(), query in list_query_strategy()) {
        let registry = registry();
        let normalized = normalize(registry.get(entity), &query.to_params()).unwrap();

        let id_keys = normalized.order.iter().filter(|o| o.field == "id").count();
        prop_assert_eq!(id_keys, 1);
        prop_assert!(!normalized.order.is_empty());
        // Every surviving key names a real column.
        for key in &normalized.order {
            prop_assert!(registry.get(entity).field(key.field).is_some());
        }
    }

    #[test]
    fn missing_limit_uses_default(offset in 0u64..1_000) {
        let registry = registry();
        let params = vec![("offset".to_string(), offset.to_string())];
        let query = normalize(registry.get(EntityKind::Perpetrator), &params).unwrap();
        prop_assert_eq!(query.limit, DEFAULT_LIMIT);
        prop_assert_eq!(query.offset, offset);
    }
}
