//! Authorization Scoper
//!
//! Turns a validated [`QueryDescriptor`] into a [`ScopedQuery`] that can only
//! see what the caller may see. The scoper checks the entity-level grant and
//! then injects row constraints for the tenant and, for callers whose grant
//! covers only records they own, the entity's ownership rule. Relation includes
//! targeting entities the caller cannot read are dropped; kept includes carry
//! the target's own read scope.
//!
//! `ScopedQuery` has no public constructor, so the executor cannot be handed an
//! unscoped query.

use crate::error::{CamError, CamResult};
use crate::identity::{id_value, Record, TenantId, UserId};
use crate::query::{OrderSpec, Predicate, QueryDescriptor};
use crate::schema::{
    AllegationRelation, EntityKind, Relation, RelationInclude, TENANT_FIELD,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// CALLER AND OPERATIONS
// ============================================================================

/// CRUD operation being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ];

    /// Map an HTTP method to the operation it performs.
    pub fn from_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => Some(Operation::Read),
            "POST" => Some(Operation::Create),
            "PUT" | "PATCH" => Some(Operation::Update),
            "DELETE" => Some(Operation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Identity of the caller, fixed for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub roles: BTreeSet<String>,
}

impl CallerContext {
    pub fn new(
        user_id: UserId,
        tenant_id: TenantId,
        roles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            user_id,
            tenant_id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

// ============================================================================
// POLICY
// ============================================================================

/// Which records of an entity a grant reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Every record of the caller's tenant.
    Tenant,
    /// Only records matching the entity's ownership rule.
    #[default]
    Owned,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityGrant {
    #[serde(default)]
    pub operations: BTreeSet<Operation>,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleGrant {
    /// Keyed by singular entity name.
    #[serde(default)]
    pub entities: BTreeMap<String, EntityGrant>,
}

/// Role based access policy.
///
/// Loadable from TOML:
///
/// ```toml
/// [roles."System Administrator".entities.allegation]
/// operations = ["create", "read", "update", "delete"]
/// visibility = "tenant"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessPolicy {
    #[serde(default)]
    pub roles: BTreeMap<String, RoleGrant>,
}

/// Errors loading an access policy.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to parse access policy: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Role '{role}' grants access to unknown entity '{entity}'")]
    UnknownEntity { role: String, entity: String },
}

pub const ROLE_ADMIN: &str = "System Administrator";
pub const ROLE_INVESTIGATOR: &str = "Investigator";
pub const ROLE_VICTIM: &str = "Victim";

impl AccessPolicy {
    pub fn from_toml_str(raw: &str) -> Result<Self, PolicyError> {
        let policy: AccessPolicy = toml::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Reject grants naming entities that do not exist.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (role, grant) in &self.roles {
            for name in grant.entities.keys() {
                if EntityKind::from_name(name).is_none() {
                    return Err(PolicyError::UnknownEntity {
                        role: role.clone(),
                        entity: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The stock policy for the three tenant roles.
    pub fn standard() -> Self {
        use Operation::*;
        use Visibility::*;

        let mut policy = AccessPolicy::default();
        for entity in EntityKind::ALL {
            policy.grant(ROLE_ADMIN, entity, [Create, Read, Update, Delete], Tenant);
        }

        for entity in EntityKind::ALL {
            policy.grant(ROLE_INVESTIGATOR, entity, [Read], Owned);
        }
        policy.grant(ROLE_INVESTIGATOR, EntityKind::Allegation, [Update], Owned);
        policy.grant(ROLE_INVESTIGATOR, EntityKind::Investigator, [Update], Owned);

        policy.grant(ROLE_VICTIM, EntityKind::Allegation, [Create, Read], Owned);
        policy.grant(ROLE_VICTIM, EntityKind::Victim, [Read, Update], Owned);
        policy
    }

    /// Add (or widen) a grant for `role` on `entity`.
    pub fn grant(
        &mut self,
        role: &str,
        entity: EntityKind,
        operations: impl IntoIterator<Item = Operation>,
        visibility: Visibility,
    ) -> &mut Self {
        let grant = self
            .roles
            .entry(role.to_string())
            .or_default()
            .entities
            .entry(entity.name().to_string())
            .or_default();
        grant.operations.extend(operations);
        grant.visibility = grant.visibility.min(visibility);
        self
    }

    /// Widest visibility any of the caller's roles grants for `operation`.
    pub fn visibility(
        &self,
        caller: &CallerContext,
        entity: EntityKind,
        operation: Operation,
    ) -> Option<Visibility> {
        caller
            .roles
            .iter()
            .filter_map(|role| self.roles.get(role))
            .filter_map(|grant| grant.entities.get(entity.name()))
            .filter(|grant| grant.operations.contains(&operation))
            .map(|grant| grant.visibility)
            .min()
    }

    pub fn allows(&self, caller: &CallerContext, entity: EntityKind, operation: Operation) -> bool {
        self.visibility(caller, entity, operation).is_some()
    }
}

// ============================================================================
// OWNERSHIP
// ============================================================================

/// How a record is tied to the user who owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipRule {
    /// The column holds the owner's user id.
    Field(&'static str),
    /// Some record across the relation is owned.
    Via(Relation, Box<OwnershipRule>),
    AnyOf(Vec<OwnershipRule>),
}

impl OwnershipRule {
    pub fn via(relation: Relation, rule: OwnershipRule) -> Self {
        OwnershipRule::Via(relation, Box::new(rule))
    }

    fn predicate(&self, user: UserId) -> Predicate {
        match self {
            OwnershipRule::Field(column) => Predicate::eq(*column, id_value(user)),
            OwnershipRule::Via(relation, rule) => Predicate::related(*relation, rule.predicate(user)),
            OwnershipRule::AnyOf(rules) => {
                Predicate::Or(rules.iter().map(|r| r.predicate(user)).collect())
            }
        }
    }

    /// The column that names the owner directly, if the rule has one.
    pub fn owner_column(&self) -> Option<&'static str> {
        match self {
            OwnershipRule::Field(column) => Some(*column),
            _ => None,
        }
    }
}

/// Ownership rules per entity. Entities without a rule own nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRules {
    rules: BTreeMap<EntityKind, OwnershipRule>,
}

impl Default for OwnershipRules {
    fn default() -> Self {
        let user = || OwnershipRule::Field("user_id");
        let mut rules = BTreeMap::new();
        rules.insert(EntityKind::Victim, user());
        rules.insert(EntityKind::Investigator, user());
        rules.insert(EntityKind::Perpetrator, user());
        rules.insert(
            EntityKind::Allegation,
            OwnershipRule::AnyOf(vec![
                OwnershipRule::via(Relation::Allegation(AllegationRelation::Victim), user()),
                OwnershipRule::via(Relation::Allegation(AllegationRelation::Investigator), user()),
            ]),
        );
        Self { rules }
    }
}

impl OwnershipRules {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn with_rule(mut self, entity: EntityKind, rule: OwnershipRule) -> Self {
        self.rules.insert(entity, rule);
        self
    }

    pub fn get(&self, entity: EntityKind) -> Option<&OwnershipRule> {
        self.rules.get(&entity)
    }

    fn predicate(&self, entity: EntityKind, user: UserId) -> Predicate {
        self.rules
            .get(&entity)
            .map(|rule| rule.predicate(user))
            .unwrap_or_else(Predicate::never)
    }
}

// ============================================================================
// SCOPED QUERY
// ============================================================================

/// A query restricted to what one caller may see.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedQuery {
    descriptor: QueryDescriptor,
    operation: Operation,
    scope: Predicate,
    includes: Vec<(RelationInclude, Predicate)>,
}

impl ScopedQuery {
    pub fn entity(&self) -> EntityKind {
        self.descriptor.entity
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn limit(&self) -> u32 {
        self.descriptor.limit
    }

    pub fn offset(&self) -> u64 {
        self.descriptor.offset
    }

    pub fn order(&self) -> &[OrderSpec] {
        &self.descriptor.order
    }

    /// Row predicate: the caller's scope and the client's criteria.
    pub fn criteria(&self) -> Predicate {
        Predicate::all([self.scope.clone(), self.descriptor.criteria()])
    }

    /// Relation includes that survived scoping, each with the predicate the
    /// related rows must satisfy.
    pub fn includes(&self) -> &[(RelationInclude, Predicate)] {
        &self.includes
    }
}

// ============================================================================
// SCOPER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Scoper {
    policy: AccessPolicy,
    ownership: OwnershipRules,
}

impl Scoper {
    pub fn new(policy: AccessPolicy, ownership: OwnershipRules) -> Self {
        Self { policy, ownership }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn can(&self, caller: &CallerContext, entity: EntityKind, operation: Operation) -> bool {
        self.policy.allows(caller, entity, operation)
    }

    /// Effective operations per entity for the caller.
    pub fn permissions(&self, caller: &CallerContext) -> BTreeMap<EntityKind, BTreeSet<Operation>> {
        EntityKind::ALL
            .into_iter()
            .map(|entity| {
                let ops = Operation::ALL
                    .into_iter()
                    .filter(|op| self.can(caller, entity, *op))
                    .collect();
                (entity, ops)
            })
            .collect()
    }

    fn require(
        &self,
        caller: &CallerContext,
        entity: EntityKind,
        operation: Operation,
    ) -> CamResult<Visibility> {
        self.policy
            .visibility(caller, entity, operation)
            .ok_or(CamError::forbidden(entity, operation))
    }

    /// Row predicate limiting `entity` to the caller's reach.
    fn row_scope(&self, caller: &CallerContext, entity: EntityKind, visibility: Visibility) -> Predicate {
        let tenant = Predicate::eq(TENANT_FIELD, id_value(caller.tenant_id));
        match visibility {
            Visibility::Tenant => tenant,
            Visibility::Owned => {
                Predicate::all([tenant, self.ownership.predicate(entity, caller.user_id)])
            }
        }
    }

    /// Restrict a multi-record query.
    pub fn scope(
        &self,
        mut descriptor: QueryDescriptor,
        caller: &CallerContext,
        operation: Operation,
    ) -> CamResult<ScopedQuery> {
        let entity = descriptor.entity;
        let visibility = self.require(caller, entity, operation)?;

        descriptor.filters.remove(TENANT_FIELD);
        if visibility == Visibility::Owned {
            if let Some(column) = self.ownership.get(entity).and_then(OwnershipRule::owner_column) {
                descriptor.filters.remove(column);
            }
        }

        let mut includes = Vec::new();
        for include in &descriptor.relations {
            let target = include.relation.target();
            if let Some(target_visibility) = self.policy.visibility(caller, target, Operation::Read) {
                includes.push((*include, self.row_scope(caller, target, target_visibility)));
            }
        }
        descriptor.relations = includes.iter().map(|(include, _)| *include).collect();

        Ok(ScopedQuery {
            scope: self.row_scope(caller, entity, visibility),
            descriptor,
            operation,
            includes,
        })
    }

    /// Scoped query addressing one record by id. Used for the access check that
    /// precedes read, update and delete of a single record.
    pub fn scope_record(
        &self,
        entity: EntityKind,
        id: uuid::Uuid,
        relations: BTreeSet<RelationInclude>,
        caller: &CallerContext,
        operation: Operation,
    ) -> CamResult<ScopedQuery> {
        self.scope(
            QueryDescriptor::by_id(entity, id).with_relations(relations),
            caller,
            operation,
        )
    }

    /// Check a write and pin the server-controlled ownership columns.
    ///
    /// The tenant column always becomes the caller's tenant. Under owned
    /// visibility a direct owner column becomes the caller's user id.
    pub fn scope_write(
        &self,
        entity: EntityKind,
        caller: &CallerContext,
        operation: Operation,
        record: &mut Record,
    ) -> CamResult<()> {
        let visibility = self.require(caller, entity, operation)?;
        record.insert(TENANT_FIELD.to_string(), id_value(caller.tenant_id));
        if visibility == Visibility::Owned {
            if let Some(column) = self.ownership.get(entity).and_then(OwnershipRule::owner_column) {
                record.insert(column.to_string(), id_value(caller.user_id));
            }
        }
        Ok(())
    }
}
