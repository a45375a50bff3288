use crate::error::{Error, Result};
use crate::principal::Principal;
use crate::role::Role;
use crate::store::{MembershipStore, PermissionStore, PrincipalStore, RoleStore};
use crate::types::{PrincipalId, RoleName};

/// Membership Graph: many-to-many edges between principals and roles.
///
/// The graph is bipartite, so there is nothing to detect cycles in.
#[derive(Debug, Clone)]
pub struct MembershipGraph<S> {
    store: S,
}

impl<S> MembershipGraph<S>
where
    S: MembershipStore + PrincipalStore + RoleStore + PermissionStore + Send + Sync,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds an edge; no-op when already present.
    pub async fn assign(&self, principal: &PrincipalId, role: &RoleName) -> Result<()> {
        self.require_principal(principal).await?;
        self.require_role(role).await?;
        if self
            .store
            .insert_membership(principal, role)
            .await
            .map_err(Error::from)?
        {
            tracing::info!(principal = %principal, role = %role, "role assigned");
        }
        Ok(())
    }

    /// Removes an edge; no-op when absent, but both endpoints must exist.
    pub async fn revoke(&self, principal: &PrincipalId, role: &RoleName) -> Result<()> {
        self.require_principal(principal).await?;
        self.require_role(role).await?;
        if self
            .store
            .remove_membership(principal, role)
            .await
            .map_err(Error::from)?
        {
            tracing::info!(principal = %principal, role = %role, "role revoked");
        }
        Ok(())
    }

    /// Returns the roles a principal holds, ordered by name.
    pub async fn roles_of(&self, principal: &PrincipalId) -> Result<Vec<Role>> {
        self.require_principal(principal).await?;
        let mut names = self
            .store
            .principal_roles(principal)
            .await
            .map_err(Error::from)?;
        names.sort();
        names.dedup();

        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            let permissions = self
                .store
                .role_permissions(&name)
                .await
                .map_err(Error::from)?
                .ok_or_else(|| Error::RoleNotFound(name.clone()))?;
            roles.push(Role {
                name,
                permissions: permissions.into_iter().collect(),
            });
        }
        Ok(roles)
    }

    /// Returns the principals holding a role, ordered by handle.
    pub async fn principals_of(&self, role: &RoleName) -> Result<Vec<Principal>> {
        self.require_role(role).await?;
        let ids = self
            .store
            .role_principals(role)
            .await
            .map_err(Error::from)?;

        let mut principals = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(principal) = self.store.principal(&id).await.map_err(Error::from)? {
                principals.push(principal);
            }
        }
        principals.sort_by(|a, b| a.handle.cmp(&b.handle));
        principals.dedup_by(|a, b| a.id == b.id);
        Ok(principals)
    }

    async fn require_principal(&self, principal: &PrincipalId) -> Result<()> {
        match self.store.principal(principal).await.map_err(Error::from)? {
            Some(_) => Ok(()),
            None => Err(Error::PrincipalNotFound(*principal)),
        }
    }

    async fn require_role(&self, role: &RoleName) -> Result<()> {
        if self.store.role_exists(role).await.map_err(Error::from)? {
            Ok(())
        } else {
            Err(Error::RoleNotFound(role.clone()))
        }
    }
}
