//! Opaque credentials and the hashing capability they are handed to.

use crate::error::{Error, Result};
use std::fmt;

/// Raw secret supplied at registration or login.
///
/// Never persisted and never formatted: `Debug` is redacted and there is no
/// `Display` implementation.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw secret, rejecting empty or whitespace-only input.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(Error::InvalidCredential(
                "credential must not be empty".to_string(),
            ));
        }
        Ok(Self(secret))
    }

    /// Exposes the secret bytes to a hasher.
    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl TryFrom<&str> for Credential {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// Encoded hash as produced by a [`CredentialHasher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialHash(String);

impl CredentialHash {
    pub fn from_string(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// External hashing capability used by the principal service.
pub trait CredentialHasher: Send + Sync {
    /// Hashes a credential for storage.
    fn hash(&self, credential: &Credential) -> Result<CredentialHash>;

    /// Checks a credential against a stored hash.
    fn verify(&self, credential: &Credential, hash: &CredentialHash) -> Result<bool>;
}

#[cfg(feature = "argon2")]
pub use self::argon::Argon2Hasher;

#[cfg(feature = "argon2")]
mod argon {
    use super::{Credential, CredentialHash, CredentialHasher};
    use crate::error::{Error, Result};
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

    /// Argon2id hasher producing PHC strings.
    #[derive(Clone, Default)]
    pub struct Argon2Hasher {
        argon2: Argon2<'static>,
    }

    impl std::fmt::Debug for Argon2Hasher {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Argon2Hasher").finish_non_exhaustive()
        }
    }

    impl Argon2Hasher {
        /// Uses explicitly configured argon2 parameters.
        pub fn new(argon2: Argon2<'static>) -> Self {
            Self { argon2 }
        }
    }

    impl CredentialHasher for Argon2Hasher {
        fn hash(&self, credential: &Credential) -> Result<CredentialHash> {
            let salt = SaltString::generate(&mut OsRng);
            let hash = self
                .argon2
                .hash_password(credential.expose(), &salt)
                .map_err(|err| Error::Credential(err.to_string()))?;
            Ok(CredentialHash::from_string(hash.to_string()))
        }

        fn verify(&self, credential: &Credential, hash: &CredentialHash) -> Result<bool> {
            let parsed =
                PasswordHash::new(hash.as_str()).map_err(|err| Error::Credential(err.to_string()))?;
            Ok(self
                .argon2
                .verify_password(credential.expose(), &parsed)
                .is_ok())
        }
    }

}
