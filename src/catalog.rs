use crate::error::{Error, Result};
use crate::permission::{ActionKind, Permission};
use crate::store::PermissionStore;
use crate::types::ResourceType;
use std::collections::BTreeSet;

/// Permission Catalog: the fixed set of `(resource type, action)` pairs.
#[derive(Debug, Clone)]
pub struct PermissionCatalog<S> {
    store: S,
}

impl<S> PermissionCatalog<S>
where
    S: PermissionStore + Send + Sync,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Defines permissions for `resource` from action names.
    ///
    /// All names are parsed before anything is written, so an unsupported
    /// action fails with [`Error::UnknownActionKind`] and defines nothing.
    /// Redefining existing pairs is a no-op.
    pub async fn define<I, A>(
        &self,
        resource: &ResourceType,
        actions: I,
    ) -> Result<BTreeSet<Permission>>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        let actions = actions
            .into_iter()
            .map(|action| action.as_ref().parse::<ActionKind>())
            .collect::<Result<Vec<_>>>()?;
        self.define_actions(resource, actions).await
    }

    /// Defines permissions for `resource` from typed actions.
    pub async fn define_actions(
        &self,
        resource: &ResourceType,
        actions: impl IntoIterator<Item = ActionKind>,
    ) -> Result<BTreeSet<Permission>> {
        let mut defined = BTreeSet::new();
        for action in actions {
            let permission = Permission::new(resource.clone(), action);
            if self
                .store
                .insert_permission(&permission)
                .await
                .map_err(Error::from)?
            {
                tracing::info!(permission = %permission, "permission defined");
            }
            defined.insert(permission);
        }
        Ok(defined)
    }

    /// Returns whether a permission has been defined.
    pub async fn contains(&self, permission: &Permission) -> Result<bool> {
        self.store
            .permission_exists(permission)
            .await
            .map_err(Error::from)
    }

    /// Returns the permissions defined for `resource`.
    pub async fn permissions(&self, resource: &ResourceType) -> Result<BTreeSet<Permission>> {
        let permissions = self
            .store
            .permissions(resource)
            .await
            .map_err(Error::from)?;
        Ok(permissions.into_iter().collect())
    }
}
