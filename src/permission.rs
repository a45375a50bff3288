use crate::error::{Error, Result};
use crate::types::ResourceType;
use std::fmt;
use std::str::FromStr;

/// Action a permission grants on a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ActionKind {
    View,
    Create,
    Edit,
    Delete,
}

impl ActionKind {
    /// Every supported action, in catalog order.
    pub const ALL: [ActionKind; 4] = [Self::View, Self::Create, Self::Edit, Self::Delete];

    /// Returns the lowercase action name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    /// Parses `view`, `create`, `edit` or `delete`, ignoring case and an
    /// optional `can_` codename prefix.
    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        let name = normalized.strip_prefix("can_").unwrap_or(&normalized);
        match name {
            "view" => Ok(Self::View),
            "create" => Ok(Self::Create),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            _ => Err(Error::UnknownActionKind(value.trim().to_string())),
        }
    }
}

impl TryFrom<&str> for ActionKind {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

/// A `(resource type, action)` capability unit.
///
/// The pair is the identity: two permissions with the same resource type and
/// action are the same permission. Displays as `resource:action`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permission {
    resource: ResourceType,
    action: ActionKind,
}

impl Permission {
    /// Creates a permission from its parts.
    pub fn new(resource: ResourceType, action: ActionKind) -> Self {
        Self { resource, action }
    }

    /// Parses a `resource:action` string.
    ///
    /// The resource segment is trimmed and lowercased; the action must be a
    /// supported [`ActionKind`].
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not be empty".to_string(),
            ));
        }
        let (resource, action) = split_permission(trimmed).ok_or_else(|| {
            Error::InvalidPermission("permission must be in resource:action format".to_string())
        })?;
        if resource.trim().is_empty() || action.trim().is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not have empty segments".to_string(),
            ));
        }
        let resource = ResourceType::new(resource)
            .map_err(|err| Error::InvalidPermission(err.to_string()))?;
        Ok(Self::new(resource, action.parse()?))
    }

    /// Returns the resource type.
    pub fn resource(&self) -> &ResourceType {
        &self.resource
    }

    /// Returns the action.
    pub fn action(&self) -> ActionKind {
        self.action
    }

    /// Returns true when this permission covers `action` on `resource`.
    pub fn grants(&self, resource: &ResourceType, action: ActionKind) -> bool {
        self.action == action && &self.resource == resource
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl TryFrom<&str> for Permission {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

pub(crate) fn split_permission(value: &str) -> Option<(&str, &str)> {
    value.rsplit_once(':')
}
