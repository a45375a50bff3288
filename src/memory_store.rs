use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::book::{Book, BookId, NewBook};
use crate::credential::CredentialHash;
use crate::permission::Permission;
use crate::principal::{Principal, ProfileChanges};
use crate::store::{BookStore, MembershipStore, PermissionStore, PrincipalStore, RoleStore};
use crate::types::{Handle, PrincipalId, ResourceType, RoleName};

/// In-memory store implementation for tests and demos.
///
/// Clones share state. Uniqueness constraints (handle, permission pair, role
/// name, membership edge, role grant) are checked and written under one write
/// lock, so concurrent inserts never duplicate.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    principals: RwLock<Principals>,
    permissions: RwLock<HashSet<Permission>>,
    roles: RwLock<HashMap<RoleName, HashSet<Permission>>>,
    memberships: RwLock<Memberships>,
    books: RwLock<Books>,
}

#[derive(Debug, Default)]
struct Principals {
    records: HashMap<PrincipalId, (Principal, CredentialHash)>,
    handles: HashMap<Handle, PrincipalId>,
}

/// Membership edges indexed from both ends.
#[derive(Debug, Default)]
struct Memberships {
    principal_roles: HashMap<PrincipalId, HashSet<RoleName>>,
    role_principals: HashMap<RoleName, HashSet<PrincipalId>>,
}

#[derive(Debug, Default)]
struct Books {
    next_id: BookId,
    records: BTreeMap<BookId, Book>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn insert_principal(
        &self,
        principal: Principal,
        credential: CredentialHash,
    ) -> std::result::Result<bool, crate::StoreError> {
        let mut guard = self.inner.principals.write().expect("poisoned lock");
        if guard.handles.contains_key(&principal.handle) {
            return Ok(false);
        }
        guard.handles.insert(principal.handle.clone(), principal.id);
        guard.records.insert(principal.id, (principal, credential));
        Ok(true)
    }

    async fn principal(
        &self,
        id: &PrincipalId,
    ) -> std::result::Result<Option<Principal>, crate::StoreError> {
        let guard = self.inner.principals.read().expect("poisoned lock");
        Ok(guard.records.get(id).map(|(principal, _)| principal.clone()))
    }

    async fn principal_by_handle(
        &self,
        handle: &Handle,
    ) -> std::result::Result<Option<Principal>, crate::StoreError> {
        let guard = self.inner.principals.read().expect("poisoned lock");
        Ok(guard
            .handles
            .get(handle)
            .and_then(|id| guard.records.get(id))
            .map(|(principal, _)| principal.clone()))
    }

    async fn credential_hash(
        &self,
        id: &PrincipalId,
    ) -> std::result::Result<Option<CredentialHash>, crate::StoreError> {
        let guard = self.inner.principals.read().expect("poisoned lock");
        Ok(guard.records.get(id).map(|(_, hash)| hash.clone()))
    }

    async fn set_principal_active(
        &self,
        id: &PrincipalId,
        active: bool,
    ) -> std::result::Result<bool, crate::StoreError> {
        let mut guard = self.inner.principals.write().expect("poisoned lock");
        Ok(match guard.records.get_mut(id) {
            Some((principal, _)) => {
                principal.is_active = active;
                true
            }
            None => false,
        })
    }

    async fn update_profile(
        &self,
        id: &PrincipalId,
        changes: &ProfileChanges,
    ) -> std::result::Result<Option<Principal>, crate::StoreError> {
        let mut guard = self.inner.principals.write().expect("poisoned lock");
        Ok(guard.records.get_mut(id).map(|(principal, _)| {
            changes.apply(&mut principal.profile);
            principal.clone()
        }))
    }

    async fn principals(&self) -> std::result::Result<Vec<Principal>, crate::StoreError> {
        let guard = self.inner.principals.read().expect("poisoned lock");
        Ok(guard
            .records
            .values()
            .map(|(principal, _)| principal.clone())
            .collect())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn insert_permission(
        &self,
        permission: &Permission,
    ) -> std::result::Result<bool, crate::StoreError> {
        let mut guard = self.inner.permissions.write().expect("poisoned lock");
        Ok(guard.insert(permission.clone()))
    }

    async fn permission_exists(
        &self,
        permission: &Permission,
    ) -> std::result::Result<bool, crate::StoreError> {
        let guard = self.inner.permissions.read().expect("poisoned lock");
        Ok(guard.contains(permission))
    }

    async fn permissions(
        &self,
        resource: &ResourceType,
    ) -> std::result::Result<Vec<Permission>, crate::StoreError> {
        let guard = self.inner.permissions.read().expect("poisoned lock");
        Ok(guard
            .iter()
            .filter(|permission| permission.resource() == resource)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn insert_role(&self, name: &RoleName) -> std::result::Result<bool, crate::StoreError> {
        let mut guard = self.inner.roles.write().expect("poisoned lock");
        if guard.contains_key(name) {
            return Ok(false);
        }
        guard.insert(name.clone(), HashSet::new());
        Ok(true)
    }

    async fn role_exists(&self, name: &RoleName) -> std::result::Result<bool, crate::StoreError> {
        let guard = self.inner.roles.read().expect("poisoned lock");
        Ok(guard.contains_key(name))
    }

    async fn add_role_permissions(
        &self,
        name: &RoleName,
        permissions: &[Permission],
    ) -> std::result::Result<Option<usize>, crate::StoreError> {
        let mut guard = self.inner.roles.write().expect("poisoned lock");
        Ok(guard.get_mut(name).map(|granted| {
            permissions
                .iter()
                .filter(|permission| granted.insert((*permission).clone()))
                .count()
        }))
    }

    async fn role_permissions(
        &self,
        name: &RoleName,
    ) -> std::result::Result<Option<Vec<Permission>>, crate::StoreError> {
        let guard = self.inner.roles.read().expect("poisoned lock");
        Ok(guard
            .get(name)
            .map(|perms| perms.iter().cloned().collect()))
    }

    async fn roles(&self) -> std::result::Result<Vec<RoleName>, crate::StoreError> {
        let guard = self.inner.roles.read().expect("poisoned lock");
        Ok(guard.keys().cloned().collect())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn insert_membership(
        &self,
        principal: &PrincipalId,
        role: &RoleName,
    ) -> std::result::Result<bool, crate::StoreError> {
        let mut guard = self.inner.memberships.write().expect("poisoned lock");
        let inserted = guard
            .principal_roles
            .entry(*principal)
            .or_default()
            .insert(role.clone());
        if inserted {
            guard
                .role_principals
                .entry(role.clone())
                .or_default()
                .insert(*principal);
        }
        Ok(inserted)
    }

    async fn remove_membership(
        &self,
        principal: &PrincipalId,
        role: &RoleName,
    ) -> std::result::Result<bool, crate::StoreError> {
        let mut guard = self.inner.memberships.write().expect("poisoned lock");
        let removed = guard
            .principal_roles
            .get_mut(principal)
            .is_some_and(|roles| roles.remove(role));
        if removed {
            if let Some(principals) = guard.role_principals.get_mut(role) {
                principals.remove(principal);
            }
        }
        Ok(removed)
    }

    async fn principal_roles(
        &self,
        principal: &PrincipalId,
    ) -> std::result::Result<Vec<RoleName>, crate::StoreError> {
        let guard = self.inner.memberships.read().expect("poisoned lock");
        Ok(guard
            .principal_roles
            .get(principal)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn role_principals(
        &self,
        role: &RoleName,
    ) -> std::result::Result<Vec<PrincipalId>, crate::StoreError> {
        let guard = self.inner.memberships.read().expect("poisoned lock");
        Ok(guard
            .role_principals
            .get(role)
            .map(|principals| principals.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn insert_book(&self, book: NewBook) -> std::result::Result<Book, crate::StoreError> {
        let mut guard = self.inner.books.write().expect("poisoned lock");
        guard.next_id += 1;
        let record = Book {
            id: guard.next_id,
            title: book.title,
            author: book.author,
            publication_year: book.publication_year,
        };
        guard.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn book(&self, id: BookId) -> std::result::Result<Option<Book>, crate::StoreError> {
        let guard = self.inner.books.read().expect("poisoned lock");
        Ok(guard.records.get(&id).cloned())
    }

    async fn books(&self) -> std::result::Result<Vec<Book>, crate::StoreError> {
        let guard = self.inner.books.read().expect("poisoned lock");
        Ok(guard.records.values().cloned().collect())
    }

    async fn update_book(
        &self,
        id: BookId,
        book: NewBook,
    ) -> std::result::Result<Option<Book>, crate::StoreError> {
        let mut guard = self.inner.books.write().expect("poisoned lock");
        Ok(guard.records.get_mut(&id).map(|record| {
            record.title = book.title;
            record.author = book.author;
            record.publication_year = book.publication_year;
            record.clone()
        }))
    }

    async fn delete_book(&self, id: BookId) -> std::result::Result<bool, crate::StoreError> {
        let mut guard = self.inner.books.write().expect("poisoned lock");
        Ok(guard.records.remove(&id).is_some())
    }
}
