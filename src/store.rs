use crate::book::{Book, BookId, NewBook};
use crate::credential::CredentialHash;
use crate::error::StoreError;
use crate::permission::Permission;
use crate::principal::{Principal, ProfileChanges};
use crate::types::{Handle, PrincipalId, ResourceType, RoleName};
use async_trait::async_trait;

/// Store interface for principal records.
#[async_trait]
pub trait PrincipalStore {
    /// Inserts a principal with its credential hash.
    ///
    /// Returns `false` without writing when the handle is already taken.
    async fn insert_principal(
        &self,
        principal: Principal,
        credential: CredentialHash,
    ) -> std::result::Result<bool, StoreError>;

    /// Returns a principal by id.
    async fn principal(
        &self,
        id: &PrincipalId,
    ) -> std::result::Result<Option<Principal>, StoreError>;

    /// Returns a principal by login handle.
    async fn principal_by_handle(
        &self,
        handle: &Handle,
    ) -> std::result::Result<Option<Principal>, StoreError>;

    /// Returns the stored credential hash of a principal.
    async fn credential_hash(
        &self,
        id: &PrincipalId,
    ) -> std::result::Result<Option<CredentialHash>, StoreError>;

    /// Sets the active flag. Returns `false` when the principal is unknown.
    async fn set_principal_active(
        &self,
        id: &PrincipalId,
        active: bool,
    ) -> std::result::Result<bool, StoreError>;

    /// Applies profile changes atomically and returns the updated record.
    async fn update_profile(
        &self,
        id: &PrincipalId,
        changes: &ProfileChanges,
    ) -> std::result::Result<Option<Principal>, StoreError>;

    /// Returns all principals.
    async fn principals(&self) -> std::result::Result<Vec<Principal>, StoreError>;
}

/// Store interface for the permission table, keyed by `(resource_type, action)`.
#[async_trait]
pub trait PermissionStore {
    /// Inserts a permission unless present. Returns `true` when created.
    async fn insert_permission(
        &self,
        permission: &Permission,
    ) -> std::result::Result<bool, StoreError>;

    /// Returns whether a permission is defined.
    async fn permission_exists(
        &self,
        permission: &Permission,
    ) -> std::result::Result<bool, StoreError>;

    /// Returns permissions defined for a resource type.
    async fn permissions(
        &self,
        resource: &ResourceType,
    ) -> std::result::Result<Vec<Permission>, StoreError>;
}

/// Store interface for roles and their grant sets.
#[async_trait]
pub trait RoleStore {
    /// Inserts a role unless present. Returns `true` when created.
    async fn insert_role(&self, name: &RoleName) -> std::result::Result<bool, StoreError>;

    /// Returns whether a role exists.
    async fn role_exists(&self, name: &RoleName) -> std::result::Result<bool, StoreError>;

    /// Adds permissions to a role's grant set.
    ///
    /// Returns the number of newly granted permissions, or `None` when the
    /// role is unknown.
    async fn add_role_permissions(
        &self,
        name: &RoleName,
        permissions: &[Permission],
    ) -> std::result::Result<Option<usize>, StoreError>;

    /// Returns the grant set of a role, or `None` when the role is unknown.
    async fn role_permissions(
        &self,
        name: &RoleName,
    ) -> std::result::Result<Option<Vec<Permission>>, StoreError>;

    /// Returns all role names.
    async fn roles(&self) -> std::result::Result<Vec<RoleName>, StoreError>;
}

/// Store interface for principal/role membership edges.
#[async_trait]
pub trait MembershipStore {
    /// Inserts an edge. Returns `true` when created.
    async fn insert_membership(
        &self,
        principal: &PrincipalId,
        role: &RoleName,
    ) -> std::result::Result<bool, StoreError>;

    /// Removes an edge. Returns `true` when an edge was removed.
    async fn remove_membership(
        &self,
        principal: &PrincipalId,
        role: &RoleName,
    ) -> std::result::Result<bool, StoreError>;

    /// Returns roles held by a principal.
    async fn principal_roles(
        &self,
        principal: &PrincipalId,
    ) -> std::result::Result<Vec<RoleName>, StoreError>;

    /// Returns principals holding a role.
    async fn role_principals(
        &self,
        role: &RoleName,
    ) -> std::result::Result<Vec<PrincipalId>, StoreError>;
}

/// Store interface for catalog records.
#[async_trait]
pub trait BookStore {
    /// Inserts a record and returns it with its assigned id.
    async fn insert_book(&self, book: NewBook) -> std::result::Result<Book, StoreError>;

    /// Returns a record by id.
    async fn book(&self, id: BookId) -> std::result::Result<Option<Book>, StoreError>;

    /// Returns all records ordered by id.
    async fn books(&self) -> std::result::Result<Vec<Book>, StoreError>;

    /// Replaces a record's fields. Returns `None` when the id is unknown.
    async fn update_book(
        &self,
        id: BookId,
        book: NewBook,
    ) -> std::result::Result<Option<Book>, StoreError>;

    /// Deletes a record. Returns `false` when the id is unknown.
    async fn delete_book(&self, id: BookId) -> std::result::Result<bool, StoreError>;
}

/// Composite store for the authorization core.
pub trait Store: PrincipalStore + PermissionStore + RoleStore + MembershipStore + Send + Sync {}

impl<T> Store for T where T: PrincipalStore + PermissionStore + RoleStore + MembershipStore + Send + Sync
{}
