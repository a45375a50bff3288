use crate::catalog::PermissionCatalog;
use crate::error::Result;
use crate::permission::{ActionKind, Permission};
use crate::role::RoleRegistry;
use crate::store::Store;
use crate::types::{ResourceType, RoleName};
use std::collections::BTreeSet;

/// A role to ensure and the actions it is granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSeed {
    pub name: RoleName,
    pub actions: BTreeSet<ActionKind>,
}

/// Idempotent catalog definition plus role seeding for one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrap {
    resource: ResourceType,
    roles: Vec<RoleSeed>,
}

/// Outcome of a [`Bootstrap::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Roles created by this run.
    pub created_roles: Vec<RoleName>,
    /// Roles that were already present.
    pub existing_roles: Vec<RoleName>,
    /// Permissions defined for the resource type after the run.
    pub permissions: BTreeSet<Permission>,
    /// Grants added by this run.
    pub granted: usize,
}

impl Bootstrap {
    /// Starts an empty plan for `resource`; every supported action is defined.
    pub fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            roles: Vec::new(),
        }
    }

    /// The library plan: `book` with Viewers, Editors and Admins.
    pub fn library() -> Self {
        use ActionKind::{Create, Delete, Edit, View};

        Self::new(ResourceType::from_string(crate::book::BOOK_RESOURCE.to_string()))
            .role(RoleName::from_string("Viewers".to_string()), [View])
            .role(
                RoleName::from_string("Editors".to_string()),
                [View, Create, Edit],
            )
            .role(
                RoleName::from_string("Admins".to_string()),
                [View, Create, Edit, Delete],
            )
    }

    /// Adds a role seed.
    pub fn role(mut self, name: RoleName, actions: impl IntoIterator<Item = ActionKind>) -> Self {
        self.roles.push(RoleSeed {
            name,
            actions: actions.into_iter().collect(),
        });
        self
    }

    pub fn resource(&self) -> &ResourceType {
        &self.resource
    }

    pub fn seeds(&self) -> &[RoleSeed] {
        &self.roles
    }

    /// Defines the catalog and seeds the roles.
    ///
    /// Safe to rerun: a second run leaves roles, permissions and grant sets
    /// unchanged.
    pub async fn run<S>(&self, store: &S) -> Result<BootstrapReport>
    where
        S: Store + Clone,
    {
        let catalog = PermissionCatalog::new(store.clone());
        let registry = RoleRegistry::new(store.clone());

        let permissions = catalog
            .define_actions(&self.resource, ActionKind::ALL)
            .await?;
        let mut report = BootstrapReport {
            permissions,
            ..BootstrapReport::default()
        };

        for seed in &self.roles {
            let (_, created) = registry.ensure_role(&seed.name).await?;
            if created {
                tracing::info!(role = %seed.name, "created role");
                report.created_roles.push(seed.name.clone());
            } else {
                tracing::info!(role = %seed.name, "role already exists");
                report.existing_roles.push(seed.name.clone());
            }
            let grants = seed
                .actions
                .iter()
                .map(|action| Permission::new(self.resource.clone(), *action));
            report.granted += registry.grant(&seed.name, grants).await?;
        }

        tracing::info!(
            resource = %self.resource,
            created = report.created_roles.len(),
            existing = report.existing_roles.len(),
            granted = report.granted,
            "role setup completed"
        );
        Ok(report)
    }
}
