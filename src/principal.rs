//! Principal records and the registration/lifecycle service.

use crate::credential::{Credential, CredentialHasher};
use crate::error::{Error, Result};
use crate::store::PrincipalStore;
use crate::types::{Email, Handle, PrincipalId};
use chrono::{DateTime, NaiveDate, Utc};

/// Authenticatable identity.
///
/// A superuser is always staff. Principals are never destroyed; deactivation
/// takes their place and makes every permission check deny.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Principal {
    pub id: PrincipalId,
    pub handle: Handle,
    pub profile: Profile,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

/// Editable profile attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile {
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Reference to a stored image, e.g. `profile_photos/alice.png`.
    pub profile_image: Option<String>,
}

/// Registration input besides handle and credential.
///
/// `is_staff` and `is_superuser` are `None` when the caller does not ask for
/// them explicitly.
#[derive(Debug, Clone, Default)]
pub struct ProfileAttrs {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_image: Option<String>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

/// Profile edit request. `Some` fields are written, `None` fields are kept.
///
/// A blank `email` clears the stored address; `Some(None)` clears the date
/// of birth.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub profile_image: Option<String>,
}

/// Validated profile changes handed to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub email: Option<Option<Email>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub profile_image: Option<String>,
}

impl ProfileChanges {
    /// Applies the changes to a profile in place.
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(first_name) = &self.first_name {
            profile.first_name = non_blank(first_name);
        }
        if let Some(last_name) = &self.last_name {
            profile.last_name = non_blank(last_name);
        }
        if let Some(date_of_birth) = self.date_of_birth {
            profile.date_of_birth = date_of_birth;
        }
        if let Some(profile_image) = &self.profile_image {
            profile.profile_image = non_blank(profile_image);
        }
    }
}

impl TryFrom<ProfileUpdate> for ProfileChanges {
    type Error = Error;

    fn try_from(update: ProfileUpdate) -> Result<Self> {
        let email = match update.email {
            Some(raw) => Some(Email::parse_optional(Some(&raw))?),
            None => None,
        };
        Ok(Self {
            email,
            first_name: update.first_name,
            last_name: update.last_name,
            date_of_birth: update.date_of_birth,
            profile_image: update.profile_image,
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn build_profile(attrs: &ProfileAttrs) -> Result<Profile> {
    Ok(Profile {
        email: Email::parse_optional(attrs.email.as_deref())?,
        first_name: attrs.first_name.as_deref().and_then(non_blank),
        last_name: attrs.last_name.as_deref().and_then(non_blank),
        date_of_birth: attrs.date_of_birth,
        profile_image: attrs.profile_image.as_deref().and_then(non_blank),
    })
}

/// Resolves `(is_staff, is_superuser)` for a regular registration.
fn requested_privileges(attrs: &ProfileAttrs) -> Result<(bool, bool)> {
    let superuser = attrs.is_superuser.unwrap_or(false);
    let staff = match (attrs.is_staff, superuser) {
        (Some(false), true) => {
            return Err(Error::PrivilegeConflict(
                "superuser must have is_staff=true".to_string(),
            ));
        }
        (Some(staff), _) => staff,
        (None, superuser) => superuser,
    };
    Ok((staff, superuser))
}

/// Principal Store service: registration, privileged creation, profile edits
/// and deactivation over a [`PrincipalStore`].
#[derive(Debug, Clone)]
pub struct Principals<S, H> {
    store: S,
    hasher: H,
}

impl<S, H> Principals<S, H>
where
    S: PrincipalStore + Send + Sync,
    H: CredentialHasher,
{
    /// Creates the service over a store and a hashing capability.
    pub fn new(store: S, hasher: H) -> Self {
        Self { store, hasher }
    }

    /// Registers a principal.
    ///
    /// Fails with [`Error::DuplicateHandle`] when the handle is taken and
    /// [`Error::PrivilegeConflict`] when the requested flags contradict.
    pub async fn register(
        &self,
        handle: Handle,
        credential: Credential,
        attrs: ProfileAttrs,
    ) -> Result<Principal> {
        let (is_staff, is_superuser) = requested_privileges(&attrs)?;
        self.create(handle, credential, &attrs, is_staff, is_superuser)
            .await
    }

    /// Registers a principal with `is_staff` and `is_superuser` forced on.
    ///
    /// An explicit `false` for either flag is rejected, not overridden.
    pub async fn create_privileged(
        &self,
        handle: Handle,
        credential: Credential,
        attrs: ProfileAttrs,
    ) -> Result<Principal> {
        if attrs.is_staff == Some(false) {
            return Err(Error::PrivilegeConflict(
                "superuser must have is_staff=true".to_string(),
            ));
        }
        if attrs.is_superuser == Some(false) {
            return Err(Error::PrivilegeConflict(
                "superuser must have is_superuser=true".to_string(),
            ));
        }
        let principal = self.create(handle, credential, &attrs, true, true).await?;
        tracing::info!(principal = %principal.id, handle = %principal.handle, "privileged principal created");
        Ok(principal)
    }

    async fn create(
        &self,
        handle: Handle,
        credential: Credential,
        attrs: &ProfileAttrs,
        is_staff: bool,
        is_superuser: bool,
    ) -> Result<Principal> {
        let profile = build_profile(attrs)?;
        if self
            .store
            .principal_by_handle(&handle)
            .await
            .map_err(Error::from)?
            .is_some()
        {
            return Err(Error::DuplicateHandle(handle));
        }

        let hash = self.hasher.hash(&credential)?;
        let principal = Principal {
            id: PrincipalId::new(),
            handle,
            profile,
            is_active: true,
            is_staff,
            is_superuser,
            created_at: Utc::now(),
        };
        let inserted = self
            .store
            .insert_principal(principal.clone(), hash)
            .await
            .map_err(Error::from)?;
        if !inserted {
            return Err(Error::DuplicateHandle(principal.handle));
        }

        tracing::info!(
            principal = %principal.id,
            handle = %principal.handle,
            is_staff,
            is_superuser,
            "principal registered"
        );
        Ok(principal)
    }

    /// Sets `is_active=false`. Deactivating an inactive principal is a no-op.
    pub async fn deactivate(&self, id: &PrincipalId) -> Result<()> {
        let found = self
            .store
            .set_principal_active(id, false)
            .await
            .map_err(Error::from)?;
        if !found {
            return Err(Error::PrincipalNotFound(*id));
        }
        tracing::info!(principal = %id, "principal deactivated");
        Ok(())
    }

    /// Applies a profile edit and returns the updated principal.
    pub async fn update_profile(&self, id: &PrincipalId, update: ProfileUpdate) -> Result<Principal> {
        let changes = ProfileChanges::try_from(update)?;
        let principal = self
            .store
            .update_profile(id, &changes)
            .await
            .map_err(Error::from)?
            .ok_or(Error::PrincipalNotFound(*id))?;
        tracing::info!(principal = %id, "principal profile updated");
        Ok(principal)
    }

    /// Returns a principal by id.
    pub async fn get(&self, id: &PrincipalId) -> Result<Principal> {
        self.store
            .principal(id)
            .await
            .map_err(Error::from)?
            .ok_or(Error::PrincipalNotFound(*id))
    }

    /// Returns a principal by handle, if registered.
    pub async fn find_by_handle(&self, handle: &Handle) -> Result<Option<Principal>> {
        self.store
            .principal_by_handle(handle)
            .await
            .map_err(Error::from)
    }

    /// Returns the principal when it exists, is active, and the credential
    /// verifies against the stored hash.
    pub async fn verify_credential(
        &self,
        handle: &Handle,
        credential: &Credential,
    ) -> Result<Option<Principal>> {
        let Some(principal) = self.find_by_handle(handle).await? else {
            return Ok(None);
        };
        if !principal.is_active {
            return Ok(None);
        }
        let Some(hash) = self
            .store
            .credential_hash(&principal.id)
            .await
            .map_err(Error::from)?
        else {
            return Ok(None);
        };
        if self.hasher.verify(credential, &hash)? {
            Ok(Some(principal))
        } else {
            tracing::debug!(principal = %principal.id, "credential verification failed");
            Ok(None)
        }
    }
}
