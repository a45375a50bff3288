use crate::error::{Error, Result};
use crate::permission::{ActionKind, Permission};
use crate::principal::Principal;
use crate::store::Store;
use crate::types::{PrincipalId, ResourceType};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Why an authorization was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DenyReason {
    /// No principal, or an unknown principal id.
    NotAuthenticated,
    /// The principal is deactivated.
    Inactive,
    /// Authenticated, but no held role grants the permission.
    PermissionMissing,
}

impl DenyReason {
    /// Returns true when the denial is about identity rather than grants.
    pub fn is_authentication(self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::Inactive)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::Inactive => "inactive",
            Self::PermissionMissing => "permission_missing",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Permission is granted.
    Allow,
    /// Permission is denied.
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Turns a denial into [`Error::Denied`] for handlers that must fail the
    /// whole request.
    pub fn require(self) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(Error::Denied(reason)),
        }
    }
}

/// Authorization Gate: a read-only decision function over the current store
/// snapshot.
///
/// Nothing is cached between calls; membership or grant changes are visible
/// to the very next call.
#[derive(Debug)]
pub struct Gate<S> {
    store: S,
    superuser_bypass: bool,
    audit_superuser_bypass: bool,
}

/// Builder for [`Gate`].
#[derive(Debug)]
pub struct GateBuilder<S> {
    store: S,
    superuser_bypass: bool,
    audit_superuser_bypass: bool,
}

impl<S> GateBuilder<S> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            superuser_bypass: true,
            audit_superuser_bypass: true,
        }
    }

    /// Enables or disables the unconditional allow for superusers.
    pub fn superuser_bypass(mut self, on: bool) -> Self {
        self.superuser_bypass = on;
        self
    }

    /// Enables or disables the dedicated audit event for bypass allows.
    pub fn audit_superuser_bypass(mut self, on: bool) -> Self {
        self.audit_superuser_bypass = on;
        self
    }

    /// Builds the gate.
    pub fn build(self) -> Gate<S> {
        Gate {
            store: self.store,
            superuser_bypass: self.superuser_bypass,
            audit_superuser_bypass: self.audit_superuser_bypass,
        }
    }
}

impl<S> Gate<S>
where
    S: Store,
{
    /// Decides whether `principal` may perform `action` on `resource`.
    ///
    /// Denial is a normal return value; only store failures are errors.
    pub async fn authorize(
        &self,
        principal: Option<&PrincipalId>,
        resource: &ResourceType,
        action: ActionKind,
    ) -> Result<Decision> {
        let decision = self.decide(principal, resource, action).await?;
        match decision {
            Decision::Allow => {
                tracing::debug!(principal = ?principal, resource = %resource, action = %action, "authorization allowed");
            }
            Decision::Deny(reason) => {
                tracing::debug!(principal = ?principal, resource = %resource, action = %action, reason = %reason, "authorization denied");
            }
        }
        Ok(decision)
    }

    /// Same as [`Gate::authorize`] for an already-built permission.
    pub async fn check(
        &self,
        principal: Option<&PrincipalId>,
        permission: &Permission,
    ) -> Result<Decision> {
        self.authorize(principal, permission.resource(), permission.action())
            .await
    }

    /// Returns the actions on `resource` that `principal` may perform.
    ///
    /// Empty for anonymous, unknown or deactivated principals.
    pub async fn permitted_actions(
        &self,
        principal: Option<&PrincipalId>,
        resource: &ResourceType,
    ) -> Result<BTreeSet<ActionKind>> {
        let Ok(record) = self.authenticated(principal).await? else {
            return Ok(BTreeSet::new());
        };
        if self.superuser_bypass && record.is_superuser {
            return Ok(ActionKind::ALL.into_iter().collect());
        }
        let permissions = self.effective_permissions(&record.id).await?;
        Ok(permissions
            .into_iter()
            .filter(|permission| permission.resource() == resource)
            .map(|permission| permission.action())
            .collect())
    }

    async fn decide(
        &self,
        principal: Option<&PrincipalId>,
        resource: &ResourceType,
        action: ActionKind,
    ) -> Result<Decision> {
        let record = match self.authenticated(principal).await? {
            Ok(record) => record,
            Err(reason) => return Ok(Decision::Deny(reason)),
        };

        if self.superuser_bypass && record.is_superuser {
            if self.audit_superuser_bypass {
                tracing::info!(
                    principal = %record.id,
                    resource = %resource,
                    action = %action,
                    "superuser bypass"
                );
            }
            return Ok(Decision::Allow);
        }

        let permissions = self.effective_permissions(&record.id).await?;
        let allowed = permissions
            .iter()
            .any(|granted| granted.grants(resource, action));

        Ok(if allowed {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::PermissionMissing)
        })
    }

    /// Resolves the acting principal, or the reason it cannot act.
    async fn authenticated(
        &self,
        principal: Option<&PrincipalId>,
    ) -> Result<std::result::Result<Principal, DenyReason>> {
        let Some(id) = principal else {
            return Ok(Err(DenyReason::NotAuthenticated));
        };
        let Some(record) = self.store.principal(id).await.map_err(Error::from)? else {
            return Ok(Err(DenyReason::NotAuthenticated));
        };
        if !record.is_active {
            return Ok(Err(DenyReason::Inactive));
        }
        Ok(Ok(record))
    }

    /// Union of the grant sets of every role the principal holds.
    async fn effective_permissions(&self, principal: &PrincipalId) -> Result<HashSet<Permission>> {
        let roles = self
            .store
            .principal_roles(principal)
            .await
            .map_err(Error::from)?;

        let mut seen = HashSet::new();
        let mut permissions = HashSet::new();
        for role in roles {
            if !seen.insert(role.clone()) {
                continue;
            }
            // A role removed underneath a stale edge contributes nothing.
            if let Some(role_permissions) = self
                .store
                .role_permissions(&role)
                .await
                .map_err(Error::from)?
            {
                permissions.extend(role_permissions);
            }
        }
        Ok(permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialHash;
    use crate::principal::{Profile, ProfileChanges};
    use crate::store::{MembershipStore, PermissionStore, PrincipalStore, RoleStore};
    use crate::types::{Handle, RoleName};
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::executor::block_on;
    use std::collections::HashMap;

    #[derive(Default, Clone)]
    struct TestStore {
        principal: Option<Principal>,
        roles: Vec<RoleName>,
        role_permissions: HashMap<RoleName, Vec<Permission>>,
    }

    fn principal_record(active: bool, superuser: bool) -> Principal {
        Principal {
            id: PrincipalId::new(),
            handle: Handle::try_from("user_1").unwrap(),
            profile: Profile::default(),
            is_active: active,
            is_staff: superuser,
            is_superuser: superuser,
            created_at: Utc::now(),
        }
    }

    fn store_with(principal: Principal) -> TestStore {
        TestStore {
            principal: Some(principal),
            ..TestStore::default()
        }
    }

    #[async_trait]
    impl PrincipalStore for TestStore {
        async fn insert_principal(
            &self,
            _principal: Principal,
            _credential: CredentialHash,
        ) -> std::result::Result<bool, crate::StoreError> {
            Ok(false)
        }

        async fn principal(
            &self,
            id: &PrincipalId,
        ) -> std::result::Result<Option<Principal>, crate::StoreError> {
            Ok(self.principal.clone().filter(|p| &p.id == id))
        }

        async fn principal_by_handle(
            &self,
            handle: &Handle,
        ) -> std::result::Result<Option<Principal>, crate::StoreError> {
            Ok(self.principal.clone().filter(|p| &p.handle == handle))
        }

        async fn credential_hash(
            &self,
            _id: &PrincipalId,
        ) -> std::result::Result<Option<CredentialHash>, crate::StoreError> {
            Ok(None)
        }

        async fn set_principal_active(
            &self,
            _id: &PrincipalId,
            _active: bool,
        ) -> std::result::Result<bool, crate::StoreError> {
            Ok(false)
        }

        async fn update_profile(
            &self,
            _id: &PrincipalId,
            _changes: &ProfileChanges,
        ) -> std::result::Result<Option<Principal>, crate::StoreError> {
            Ok(None)
        }

        async fn principals(&self) -> std::result::Result<Vec<Principal>, crate::StoreError> {
            Ok(self.principal.iter().cloned().collect())
        }
    }

    #[async_trait]
    impl PermissionStore for TestStore {
        async fn insert_permission(
            &self,
            _permission: &Permission,
        ) -> std::result::Result<bool, crate::StoreError> {
            Ok(false)
        }

        async fn permission_exists(
            &self,
            _permission: &Permission,
        ) -> std::result::Result<bool, crate::StoreError> {
            Ok(true)
        }

        async fn permissions(
            &self,
            _resource: &ResourceType,
        ) -> std::result::Result<Vec<Permission>, crate::StoreError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl RoleStore for TestStore {
        async fn insert_role(&self, _name: &RoleName) -> std::result::Result<bool, crate::StoreError> {
            Ok(false)
        }

        async fn role_exists(&self, name: &RoleName) -> std::result::Result<bool, crate::StoreError> {
            Ok(self.role_permissions.contains_key(name))
        }

        async fn add_role_permissions(
            &self,
            _name: &RoleName,
            _permissions: &[Permission],
        ) -> std::result::Result<Option<usize>, crate::StoreError> {
            Ok(None)
        }

        async fn role_permissions(
            &self,
            name: &RoleName,
        ) -> std::result::Result<Option<Vec<Permission>>, crate::StoreError> {
            Ok(self.role_permissions.get(name).cloned())
        }

        async fn roles(&self) -> std::result::Result<Vec<RoleName>, crate::StoreError> {
            Ok(self.role_permissions.keys().cloned().collect())
        }
    }

    #[async_trait]
    impl MembershipStore for TestStore {
        async fn insert_membership(
            &self,
            _principal: &PrincipalId,
            _role: &RoleName,
        ) -> std::result::Result<bool, crate::StoreError> {
            Ok(false)
        }

        async fn remove_membership(
            &self,
            _principal: &PrincipalId,
            _role: &RoleName,
        ) -> std::result::Result<bool, crate::StoreError> {
            Ok(false)
        }

        async fn principal_roles(
            &self,
            _principal: &PrincipalId,
        ) -> std::result::Result<Vec<RoleName>, crate::StoreError> {
            Ok(self.roles.clone())
        }

        async fn role_principals(
            &self,
            _role: &RoleName,
        ) -> std::result::Result<Vec<PrincipalId>, crate::StoreError> {
            Ok(Vec::new())
        }
    }

    struct FailingStore;

    fn book() -> ResourceType {
        ResourceType::try_from("Book").unwrap()
    }

    fn grant(store: &mut TestStore, role: &str, permissions: &[&str]) {
        let role = RoleName::try_from(role).unwrap();
        store.roles.push(role.clone());
        store.role_permissions.insert(
            role,
            permissions
                .iter()
                .map(|value| Permission::try_from(*value).unwrap())
                .collect(),
        );
    }

    #[test]
    fn authorize_should_allow_exact_permission() {
        let record = principal_record(true, false);
        let id = record.id;
        let mut store = store_with(record);
        grant(&mut store, "Viewers", &["book:view"]);

        let gate = GateBuilder::new(store).build();
        let decision = block_on(gate.authorize(Some(&id), &book(), ActionKind::View)).unwrap();

        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn authorize_should_deny_anonymous() {
        let gate = GateBuilder::new(TestStore::default()).build();
        let decision = block_on(gate.authorize(None, &book(), ActionKind::View)).unwrap();

        assert_eq!(decision, Decision::Deny(DenyReason::NotAuthenticated));
    }

    #[test]
    fn authorize_should_treat_unknown_principal_as_anonymous() {
        let gate = GateBuilder::new(TestStore::default()).build();
        let decision =
            block_on(gate.authorize(Some(&PrincipalId::new()), &book(), ActionKind::View)).unwrap();

        assert_eq!(decision, Decision::Deny(DenyReason::NotAuthenticated));
    }

    #[test]
    fn authorize_should_deny_inactive_admin() {
        let record = principal_record(false, false);
        let id = record.id;
        let mut store = store_with(record);
        grant(&mut store, "Admins", &["book:view", "book:create", "book:edit", "book:delete"]);

        let gate = GateBuilder::new(store).build();
        for action in ActionKind::ALL {
            let decision = block_on(gate.authorize(Some(&id), &book(), action)).unwrap();
            assert_eq!(decision, Decision::Deny(DenyReason::Inactive));
        }
    }

    #[test]
    fn authorize_should_allow_superuser_without_roles() {
        let record = principal_record(true, true);
        let id = record.id;
        let gate = GateBuilder::new(store_with(record)).build();

        let decision = block_on(gate.authorize(Some(&id), &book(), ActionKind::Delete)).unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn inactive_superuser_is_denied() {
        let record = principal_record(false, true);
        let id = record.id;
        let gate = GateBuilder::new(store_with(record)).build();

        let decision = block_on(gate.authorize(Some(&id), &book(), ActionKind::View)).unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::Inactive));
    }

    #[test]
    fn superuser_bypass_can_be_disabled() {
        let record = principal_record(true, true);
        let id = record.id;
        let gate = GateBuilder::new(store_with(record))
            .superuser_bypass(false)
            .build();

        let decision = block_on(gate.authorize(Some(&id), &book(), ActionKind::View)).unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::PermissionMissing));
    }

    #[test]
    fn authorize_should_union_role_grants() {
        let record = principal_record(true, false);
        let id = record.id;
        let mut store = store_with(record);
        grant(&mut store, "R1", &["book:view"]);
        grant(&mut store, "R2", &["book:create"]);

        let gate = GateBuilder::new(store).build();
        let decide = |action| block_on(gate.authorize(Some(&id), &book(), action)).unwrap();

        assert_eq!(decide(ActionKind::View), Decision::Allow);
        assert_eq!(decide(ActionKind::Create), Decision::Allow);
        assert_eq!(
            decide(ActionKind::Delete),
            Decision::Deny(DenyReason::PermissionMissing)
        );
    }

    #[test]
    fn grants_on_other_resource_do_not_leak() {
        let record = principal_record(true, false);
        let id = record.id;
        let mut store = store_with(record);
        grant(&mut store, "Authors", &["author:view"]);

        let gate = GateBuilder::new(store).build();
        let decision = block_on(gate.authorize(Some(&id), &book(), ActionKind::View)).unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::PermissionMissing));
    }

    #[test]
    fn permitted_actions_should_filter_by_resource() {
        let record = principal_record(true, false);
        let id = record.id;
        let mut store = store_with(record);
        grant(&mut store, "Editors", &["book:view", "book:create", "book:edit", "author:delete"]);

        let gate = GateBuilder::new(store).build();
        let actions = block_on(gate.permitted_actions(Some(&id), &book())).unwrap();

        assert_eq!(
            actions.into_iter().collect::<Vec<_>>(),
            vec![ActionKind::View, ActionKind::Create, ActionKind::Edit]
        );
        assert!(block_on(gate.permitted_actions(None, &book())).unwrap().is_empty());
    }

    #[test]
    fn require_should_map_deny_to_error() {
        assert!(Decision::Allow.require().is_ok());
        let err = Decision::Deny(DenyReason::PermissionMissing).require().unwrap_err();
        assert!(matches!(err, Error::Denied(DenyReason::PermissionMissing)));
        assert!(!DenyReason::PermissionMissing.is_authentication());
        assert!(DenyReason::Inactive.is_authentication());
    }

    #[async_trait]
    impl PrincipalStore for FailingStore {
        async fn insert_principal(
            &self,
            _principal: Principal,
            _credential: CredentialHash,
        ) -> std::result::Result<bool, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn principal(
            &self,
            _id: &PrincipalId,
        ) -> std::result::Result<Option<Principal>, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn principal_by_handle(
            &self,
            _handle: &Handle,
        ) -> std::result::Result<Option<Principal>, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn credential_hash(
            &self,
            _id: &PrincipalId,
        ) -> std::result::Result<Option<CredentialHash>, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn set_principal_active(
            &self,
            _id: &PrincipalId,
            _active: bool,
        ) -> std::result::Result<bool, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn update_profile(
            &self,
            _id: &PrincipalId,
            _changes: &ProfileChanges,
        ) -> std::result::Result<Option<Principal>, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn principals(&self) -> std::result::Result<Vec<Principal>, crate::StoreError> {
            Err("store unavailable".into())
        }
    }

    #[async_trait]
    impl PermissionStore for FailingStore {
        async fn insert_permission(
            &self,
            _permission: &Permission,
        ) -> std::result::Result<bool, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn permission_exists(
            &self,
            _permission: &Permission,
        ) -> std::result::Result<bool, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn permissions(
            &self,
            _resource: &ResourceType,
        ) -> std::result::Result<Vec<Permission>, crate::StoreError> {
            Err("store unavailable".into())
        }
    }

    #[async_trait]
    impl RoleStore for FailingStore {
        async fn insert_role(&self, _name: &RoleName) -> std::result::Result<bool, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn role_exists(&self, _name: &RoleName) -> std::result::Result<bool, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn add_role_permissions(
            &self,
            _name: &RoleName,
            _permissions: &[Permission],
        ) -> std::result::Result<Option<usize>, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn role_permissions(
            &self,
            _name: &RoleName,
        ) -> std::result::Result<Option<Vec<Permission>>, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn roles(&self) -> std::result::Result<Vec<RoleName>, crate::StoreError> {
            Err("store unavailable".into())
        }
    }

    #[async_trait]
    impl MembershipStore for FailingStore {
        async fn insert_membership(
            &self,
            _principal: &PrincipalId,
            _role: &RoleName,
        ) -> std::result::Result<bool, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn remove_membership(
            &self,
            _principal: &PrincipalId,
            _role: &RoleName,
        ) -> std::result::Result<bool, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn principal_roles(
            &self,
            _principal: &PrincipalId,
        ) -> std::result::Result<Vec<RoleName>, crate::StoreError> {
            Err("store unavailable".into())
        }

        async fn role_principals(
            &self,
            _role: &RoleName,
        ) -> std::result::Result<Vec<PrincipalId>, crate::StoreError> {
            Err("store unavailable".into())
        }
    }

    #[test]
    fn store_failure_should_propagate_as_error() {
        let gate = GateBuilder::new(FailingStore).build();
        let result = block_on(gate.authorize(Some(&PrincipalId::new()), &book(), ActionKind::View));

        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[test]
    fn anonymous_is_denied_without_store_access() {
        let gate = GateBuilder::new(FailingStore).build();
        let decision = block_on(gate.authorize(None, &book(), ActionKind::View)).unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::NotAuthenticated));
    }
}
