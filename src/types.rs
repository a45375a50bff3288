use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MAX_HANDLE_LEN: usize = 150;
const MAX_NAME_LEN: usize = 128;

fn validate_name(
    value: &str,
    kind: &str,
    max_len: usize,
    allowed: fn(char) -> bool,
) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {max_len}"
        )));
    }
    if !trimmed.chars().all(allowed) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn is_handle_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_')
}

fn is_role_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, ' ' | '_' | '-')
}

fn is_resource_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-')
}

fn validate_handle(value: &str) -> Result<String> {
    validate_name(value, "handle", MAX_HANDLE_LEN, is_handle_char)
}

fn validate_role_name(value: &str) -> Result<String> {
    validate_name(value, "role name", MAX_NAME_LEN, is_role_char)
}

fn validate_resource_type(value: &str) -> Result<String> {
    validate_name(value, "resource type", MAX_NAME_LEN, is_resource_char)
        .map(|name| name.to_ascii_lowercase())
}

macro_rules! define_name_type {
    ($(#[$doc:meta])* $name:ident, $validate:path) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            /// Creates a validated value.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                $validate(value.as_ref()).map(Self)
            }

            /// Creates a value from a trusted literal without validation.
            #[allow(dead_code)]
            pub(crate) fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_name_type!(
    /// Unique login handle of a principal. Case is preserved.
    Handle,
    validate_handle
);
define_name_type!(
    /// Unique role name, e.g. `Viewers`.
    RoleName,
    validate_role_name
);
define_name_type!(
    /// Category of domain object subject to permission checks.
    ///
    /// Normalized to lowercase, so `Book` and `book` are the same type.
    ResourceType,
    validate_resource_type
);

/// Principal identifier (UUIDv7, time ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for PrincipalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::from_str(s.trim())
            .map(Self)
            .map_err(|err| Error::InvalidId(format!("principal id: {err}")))
    }
}

/// Email address in canonical form (trimmed, lowercased).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Email(String);

impl Email {
    /// Validates and normalizes an address.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let normalized = value.as_ref().trim().to_lowercase();
        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(Error::InvalidEmail("missing '@'".to_string()));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(Error::InvalidEmail(format!(
                "malformed address: {normalized}"
            )));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(Error::InvalidEmail(
                "address contains whitespace".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    /// Normalizes optional profile input; blank input means no address.
    pub fn parse_optional(value: Option<&str>) -> Result<Option<Self>> {
        match value {
            Some(raw) if !raw.trim().is_empty() => Self::new(raw).map(Some),
            _ => Ok(None),
        }
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}
