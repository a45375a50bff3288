use crate::error::{Error, Result};
use crate::permission::Permission;
use crate::store::{PermissionStore, RoleStore};
use crate::types::RoleName;
use std::collections::BTreeSet;

/// Named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    pub name: RoleName,
    pub permissions: BTreeSet<Permission>,
}

/// Role Registry: get-or-create roles and additive grants.
///
/// There is no removal path for roles or grants.
#[derive(Debug, Clone)]
pub struct RoleRegistry<S> {
    store: S,
}

impl<S> RoleRegistry<S>
where
    S: RoleStore + PermissionStore + Send + Sync,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the role named `name`, creating it when absent.
    ///
    /// The flag is `true` when this call created the role.
    pub async fn ensure_role(&self, name: &RoleName) -> Result<(Role, bool)> {
        let created = self.store.insert_role(name).await.map_err(Error::from)?;
        if created {
            tracing::info!(role = %name, "role created");
        }
        let role = self.role(name).await?;
        Ok((role, created))
    }

    /// Adds permissions to a role's grant set.
    ///
    /// Re-granting a held permission is a no-op. Every permission must be
    /// defined in the catalog. Returns how many permissions were new.
    pub async fn grant<I>(&self, name: &RoleName, permissions: I) -> Result<usize>
    where
        I: IntoIterator<Item = Permission>,
    {
        let permissions: BTreeSet<Permission> = permissions.into_iter().collect();
        for permission in &permissions {
            if !self
                .store
                .permission_exists(permission)
                .await
                .map_err(Error::from)?
            {
                return Err(Error::PermissionNotFound(permission.clone()));
            }
        }
        let permissions: Vec<Permission> = permissions.into_iter().collect();
        let added = self
            .store
            .add_role_permissions(name, &permissions)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::RoleNotFound(name.clone()))?;
        if added > 0 {
            tracing::info!(role = %name, added, "permissions granted");
        }
        Ok(added)
    }

    /// Returns the permissions granted to a role.
    pub async fn effective_permissions(&self, name: &RoleName) -> Result<BTreeSet<Permission>> {
        self.store
            .role_permissions(name)
            .await
            .map_err(Error::from)?
            .map(|permissions| permissions.into_iter().collect())
            .ok_or_else(|| Error::RoleNotFound(name.clone()))
    }

    /// Returns a role with its grant set.
    pub async fn role(&self, name: &RoleName) -> Result<Role> {
        Ok(Role {
            name: name.clone(),
            permissions: self.effective_permissions(name).await?,
        })
    }

    /// Returns all roles, ordered by name.
    pub async fn roles(&self) -> Result<Vec<Role>> {
        let mut names = self.store.roles().await.map_err(Error::from)?;
        names.sort();
        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            roles.push(self.role(&name).await?);
        }
        Ok(roles)
    }
}
