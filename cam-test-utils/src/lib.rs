//! CAM Test Utilities
//!
//! Shared test infrastructure for the CAM workspace:
//! - Proptest generators for list queries and callers
//! - Fixtures for callers, policies and seeded case files
//! - Assertions for CAM error variants and page shapes

pub use cam_storage::InMemoryStorage;

pub use cam_core::{
    id_value, timestamp_value, AccessPolicy, CallerContext, CamError, CamResult, EntityKind,
    ListQuery, Operation, OrderParam, OwnershipRules, Page, Record, Scoper, StorageError,
    Visibility, ROLE_ADMIN, ROLE_INVESTIGATOR, ROLE_VICTIM,
};

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for CAM request shapes.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_entity() -> impl Strategy<Value = EntityKind> {
        prop::sample::select(EntityKind::ALL.to_vec())
    }

    pub fn arb_operation() -> impl Strategy<Value = Operation> {
        prop::sample::select(Operation::ALL.to_vec())
    }

    /// Role sets drawn from the stock roles plus one the policy does not know.
    pub fn arb_roles() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            prop::sample::select(vec![ROLE_ADMIN, ROLE_INVESTIGATOR, ROLE_VICTIM, "Clerk"]),
            0..3,
        )
        .prop_map(|roles| roles.into_iter().map(str::to_string).collect())
    }

    pub fn arb_caller() -> impl Strategy<Value = CallerContext> {
        (arb_uuid(), arb_uuid(), arb_roles())
            .prop_map(|(user, tenant, roles)| CallerContext::new(user, tenant, roles))
    }

    /// List queries with in-range and out-of-range paging plus mixed order keys.
    pub fn arb_list_query() -> impl Strategy<Value = ListQuery> {
        (
            0u32..1_000,
            0u64..500,
            "[a-z]{0,6}",
            prop::collection::vec(
                (
                    prop::sample::select(vec!["created_at", "id", "description", "bogus"]),
                    any::<bool>(),
                ),
                0..3,
            ),
        )
            .prop_map(|(limit, offset, search_term, order)| ListQuery {
                limit,
                offset,
                search_term,
                order: order
                    .into_iter()
                    .map(|(id, desc)| OrderParam {
                        id: id.to_string(),
                        desc,
                    })
                    .collect(),
                ..Default::default()
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built callers, policies and seeded records.

    use super::*;
    use cam_storage::Storage;
    use serde_json::json;

    pub const TENANT: Uuid = Uuid::from_u128(0x0100);
    pub const OTHER_TENANT: Uuid = Uuid::from_u128(0x0200);

    /// A role the stock policy does not know. [`clerk_policy`] lets it read
    /// allegations and nothing else.
    pub const ROLE_CLERK: &str = "Clerk";

    pub fn admin(tenant: Uuid) -> CallerContext {
        CallerContext::new(Uuid::from_u128(0xAD), tenant, [ROLE_ADMIN])
    }

    pub fn investigator(user: Uuid) -> CallerContext {
        CallerContext::new(user, TENANT, [ROLE_INVESTIGATOR])
    }

    pub fn victim(user: Uuid) -> CallerContext {
        CallerContext::new(user, TENANT, [ROLE_VICTIM])
    }

    pub fn clerk() -> CallerContext {
        CallerContext::new(Uuid::from_u128(0xC1), TENANT, [ROLE_CLERK])
    }

    /// The stock policy plus tenant-wide allegation reads for clerks.
    pub fn clerk_policy() -> AccessPolicy {
        let mut policy = AccessPolicy::standard();
        policy.grant(
            ROLE_CLERK,
            EntityKind::Allegation,
            [Operation::Read],
            Visibility::Tenant,
        );
        policy
    }

    pub fn scoper(policy: AccessPolicy) -> Scoper {
        Scoper::new(policy, OwnershipRules::default())
    }

    /// Ids of one allegation and the records linked to it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CaseFile {
        pub allegation: Uuid,
        pub victim: Uuid,
        pub investigator: Uuid,
        pub perpetrator: Uuid,
        pub victim_user: Uuid,
        pub investigator_user: Uuid,
    }

    /// Creation time of the `index`th seeded case; later cases are newer.
    pub fn created_at(index: u32) -> serde_json::Value {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
        timestamp_value(base + Duration::minutes(i64::from(index)))
    }

    fn object(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    /// Records for one case file: an allegation and its victim, investigator
    /// and perpetrator, all in `tenant`.
    pub fn case_file_records(tenant: Uuid, index: u32) -> (CaseFile, Vec<(EntityKind, Record)>) {
        let case = CaseFile {
            allegation: Uuid::now_v7(),
            victim: Uuid::now_v7(),
            investigator: Uuid::now_v7(),
            perpetrator: Uuid::now_v7(),
            victim_user: Uuid::now_v7(),
            investigator_user: Uuid::now_v7(),
        };
        let tenant = id_value(tenant);
        let stamp = created_at(index);
        let status = if index % 2 == 0 { "open" } else { "closed" };

        let records = vec![
            (
                EntityKind::Allegation,
                object(json!({
                    "id": id_value(case.allegation),
                    "tenant_id": tenant,
                    "created_at": stamp,
                    "updated_at": stamp,
                    "description": format!("case {index:03} reported"),
                    "status": status,
                    "victim_id": id_value(case.victim),
                    "investigator_id": id_value(case.investigator),
                    "perpetrator_id": id_value(case.perpetrator),
                })),
            ),
            (
                EntityKind::Victim,
                object(json!({
                    "id": id_value(case.victim),
                    "tenant_id": tenant,
                    "created_at": stamp,
                    "updated_at": stamp,
                    "user_id": id_value(case.victim_user),
                    "allegation_id": id_value(case.allegation),
                    "incident_date": "2024-01-01",
                    "incident_description": format!("victim statement {index}"),
                    "incident_location": "Main street",
                })),
            ),
            (
                EntityKind::Investigator,
                object(json!({
                    "id": id_value(case.investigator),
                    "tenant_id": tenant,
                    "created_at": stamp,
                    "updated_at": stamp,
                    "user_id": id_value(case.investigator_user),
                    "assigned_allegation_id": id_value(case.allegation),
                    "investigation_status": "in progress",
                    "investigation_result": null,
                    "investigation_date": null,
                })),
            ),
            (
                EntityKind::Perpetrator,
                object(json!({
                    "id": id_value(case.perpetrator),
                    "tenant_id": tenant,
                    "created_at": stamp,
                    "updated_at": stamp,
                    "user_id": id_value(Uuid::now_v7()),
                    "allegation_id": id_value(case.allegation),
                    "incident_role": "primary",
                    "incident_consequence": null,
                    "incident_remarks": null,
                })),
            ),
        ];
        (case, records)
    }

    /// Seed `count` case files into `tenant`, oldest first.
    pub async fn seed_case_files(
        storage: &dyn Storage,
        tenant: Uuid,
        count: u32,
    ) -> CamResult<Vec<CaseFile>> {
        let mut cases = Vec::with_capacity(count as usize);
        for index in 0..count {
            let (case, records) = case_file_records(tenant, index);
            for (entity, record) in records {
                storage.insert(entity, record).await?;
            }
            cases.push(case);
        }
        Ok(cases)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for CAM results and pages.

    use super::*;

    #[track_caller]
    pub fn assert_forbidden<T: std::fmt::Debug>(
        result: &CamResult<T>,
        entity: EntityKind,
        operation: Operation,
    ) {
        match result {
            Err(CamError::Forbidden {
                entity: e,
                operation: op,
            }) => {
                assert_eq!(*e, entity, "Wrong entity in Forbidden error");
                assert_eq!(*op, operation, "Wrong operation in Forbidden error");
            }
            other => panic!("Expected Forbidden for {operation} on {entity}, got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_invalid_field<T: std::fmt::Debug>(result: &CamResult<T>, field: &str) {
        match result {
            Err(CamError::InvalidFilterField { field: f, .. }) => {
                assert_eq!(f, field, "Wrong field in InvalidFilterField error");
            }
            other => panic!("Expected InvalidFilterField for {field}, got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &CamResult<T>) {
        match result {
            Err(CamError::NotFound { .. }) | Err(CamError::Storage(StorageError::NotFound { .. })) => {}
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    /// A page never holds more rows than requested or than the total.
    #[track_caller]
    pub fn assert_page_shape<T>(page: &Page<T>, limit: u32) {
        assert!(
            page.data.len() <= limit as usize,
            "Page holds {} rows, limit {limit}",
            page.data.len()
        );
        assert!(
            page.total_count >= page.data.len() as u64,
            "totalCount {} below page size {}",
            page.total_count,
            page.data.len()
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
