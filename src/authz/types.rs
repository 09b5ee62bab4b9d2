use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The authenticated actor attached to a request by the upstream
/// authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject_id: i64,
    #[serde(default)]
    pub role: Option<String>,
}

impl Principal {
    pub fn new(subject_id: i64, role: impl Into<String>) -> Self {
        Self {
            subject_id,
            role: Some(role.into()),
        }
    }

    /// Role name, treating an empty string the same as no role.
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_deref().filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Manage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "manage" => Ok(Action::Manage),
            other => Err(format!("unknown action `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    User,
    Role,
    Permission,
    Question,
    Content,
    Exam,
    File,
    Notification,
    Config,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::User,
        Resource::Role,
        Resource::Permission,
        Resource::Question,
        Resource::Content,
        Resource::Exam,
        Resource::File,
        Resource::Notification,
        Resource::Config,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::User => "user",
            Resource::Role => "role",
            Resource::Permission => "permission",
            Resource::Question => "question",
            Resource::Content => "content",
            Resource::Exam => "exam",
            Resource::File => "file",
            Resource::Notification => "notification",
            Resource::Config => "config",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown resource `{s}`"))
    }
}

/// `"<resource>:<action>"` split into its halves. Resources are kept as raw
/// strings so that permissions on resources outside the seeded catalog still
/// participate in the superset rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionName<'a> {
    pub resource: &'a str,
    pub action: Action,
}

impl<'a> PermissionName<'a> {
    pub fn parse(s: &'a str) -> Option<Self> {
        let (resource, action) = s.split_once(':')?;
        if resource.is_empty() {
            return None;
        }
        Some(Self {
            resource,
            action: action.parse().ok()?,
        })
    }

    pub fn format(resource: Resource, action: Action) -> String {
        format!("{resource}:{action}")
    }
}

/// A role's effective permission set: the names reachable through its
/// associations, before `manage` expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    /// Direct membership, or `resource:manage` held for a non-manage action
    /// on the same resource.
    pub fn satisfies(&self, permission: &str) -> bool {
        if self.contains(permission) {
            return true;
        }
        match PermissionName::parse(permission) {
            Some(p) if p.action != Action::Manage => {
                self.contains(&format!("{}:{}", p.resource, Action::Manage))
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<BTreeSet<String>> for PermissionSet {
    fn from(set: BTreeSet<String>) -> Self {
        Self(set)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    AnyOf,
    AllOf,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::AnyOf => f.write_str("any of"),
            MatchMode::AllOf => f.write_str("all of"),
        }
    }
}

/// What a route demands of the caller's role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "permissions", rename_all = "snake_case")]
pub enum AuthorizationRequirement {
    #[default]
    None,
    AnyOf(Vec<String>),
    AllOf(Vec<String>),
}

impl AuthorizationRequirement {
    pub fn any_of<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(permissions.into_iter().map(Into::into).collect())
    }

    pub fn all_of<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllOf(permissions.into_iter().map(Into::into).collect())
    }

    /// True when there is nothing to check: no list, or an empty one.
    pub fn is_unrestricted(&self) -> bool {
        match self {
            Self::None => true,
            Self::AnyOf(p) | Self::AllOf(p) => p.is_empty(),
        }
    }
}

/// Authorization markers as declared on a handler or on the controller that
/// groups it. Unset fields fall back to the other level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RouteMetadata {
    #[serde(default)]
    pub public: Option<bool>,
    #[serde(default)]
    pub any_of: Option<Vec<String>>,
    #[serde(default)]
    pub all_of: Option<Vec<String>>,
}

impl RouteMetadata {
    pub fn public() -> Self {
        Self {
            public: Some(true),
            ..Default::default()
        }
    }

    pub fn any_of<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            any_of: Some(permissions.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn all_of<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            all_of: Some(permissions.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Merge handler-level markers over class-level ones, field by field.
    pub fn merge(handler: &RouteMetadata, class: &RouteMetadata) -> RouteMetadata {
        RouteMetadata {
            public: handler.public.or(class.public),
            any_of: handler.any_of.clone().or_else(|| class.any_of.clone()),
            all_of: handler.all_of.clone().or_else(|| class.all_of.clone()),
        }
    }

    fn has_any_of(&self) -> bool {
        self.any_of.as_ref().is_some_and(|p| !p.is_empty())
    }

    fn has_all_of(&self) -> bool {
        self.all_of.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn is_dual_declaration(&self) -> bool {
        self.has_any_of() && self.has_all_of()
    }
}

/// A route's resolved authorization, computed once at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteAuthorization {
    pub public: bool,
    pub requirement: AuthorizationRequirement,
}

impl RouteAuthorization {
    pub fn public() -> Self {
        Self {
            public: true,
            requirement: AuthorizationRequirement::None,
        }
    }

    pub fn requiring(requirement: AuthorizationRequirement) -> Self {
        Self {
            public: false,
            requirement,
        }
    }

    /// Resolve merged metadata. A non-empty all-of list takes precedence and
    /// any any-of list next to it is dropped.
    pub fn from_metadata(meta: &RouteMetadata) -> Self {
        let requirement = if meta.has_all_of() {
            AuthorizationRequirement::AllOf(meta.all_of.clone().unwrap_or_default())
        } else if meta.has_any_of() {
            AuthorizationRequirement::AnyOf(meta.any_of.clone().unwrap_or_default())
        } else {
            AuthorizationRequirement::None
        };
        Self {
            public: meta.public.unwrap_or(false),
            requirement,
        }
    }
}
