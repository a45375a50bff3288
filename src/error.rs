use crate::gate::DenyReason;
use crate::permission::Permission;
use crate::types::{Handle, PrincipalId, RoleName};
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// A denied authorization is not an error for [`Gate`](crate::Gate); it only
/// becomes [`Error::Denied`] once a handler decides to fail the request.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Registration with a handle that is already taken.
    #[error("handle already registered: {0}")]
    DuplicateHandle(Handle),
    /// Malformed or empty credential.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    /// Credential hashing capability failed.
    #[error("credential hashing failed: {0}")]
    Credential(String),
    /// Action outside the supported enumeration.
    #[error("unknown action kind: {0}")]
    UnknownActionKind(String),
    /// Unknown principal reference.
    #[error("principal not found: {0}")]
    PrincipalNotFound(PrincipalId),
    /// Unknown role reference.
    #[error("role not found: {0}")]
    RoleNotFound(RoleName),
    /// Permission not defined in the catalog.
    #[error("permission not defined: {0}")]
    PermissionNotFound(Permission),
    /// Unknown catalog record.
    #[error("book not found: {0}")]
    BookNotFound(u64),
    /// Operation rejected by the authorization gate.
    #[error("access denied")]
    Denied(DenyReason),
    /// Staff/superuser flags contradict each other or the operation.
    #[error("privilege conflict: {0}")]
    PrivilegeConflict(String),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// Invalid email input.
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    /// Catalog record failed field validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl Error {
    /// Returns true for references to nonexistent principals, roles,
    /// permissions or records.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PrincipalNotFound(_)
                | Self::RoleNotFound(_)
                | Self::PermissionNotFound(_)
                | Self::BookNotFound(_)
        )
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
