//! Domain entities and their row encoding.
//!
//! Each entity converts into a [`Row`] with camelCase column names, which is
//! what the standard policies reference. Enums are encoded as their
//! upper-case names.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_abac::Row;

// ============================================================================
// Enumerations
// ============================================================================

/// Billing plan of a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanType {
    Free,
    Pro,
    Enterprise,
}

/// Role within a team or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleType {
    Viewer,
    Editor,
    Admin,
}

/// Who can see a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Private,
    Public,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Free => "FREE",
            PlanType::Pro => "PRO",
            PlanType::Enterprise => "ENTERPRISE",
        }
    }
}

impl RoleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleType::Viewer => "VIEWER",
            RoleType::Editor => "EDITOR",
            RoleType::Admin => "ADMIN",
        }
    }
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "PRIVATE",
            Visibility::Public => "PUBLIC",
        }
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub plan: PlanType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub team_id: String,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub project_id: String,
    pub creator_id: String,
    /// Soft-delete marker; `None` while the document is live.
    pub deleted_at: Option<DateTime<Utc>>,
    pub public_link_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub user_id: String,
    pub team_id: String,
    pub role: RoleType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembership {
    pub user_id: String,
    pub project_id: String,
    pub role: RoleType,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>, plan: PlanType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plan,
        }
    }
}

impl Project {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        team_id: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            team_id: team_id.into(),
            visibility,
        }
    }
}

impl Document {
    /// A live document without a public link.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        project_id: impl Into<String>,
        creator_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            project_id: project_id.into(),
            creator_id: creator_id.into(),
            deleted_at: None,
            public_link_enabled: false,
        }
    }

    #[must_use]
    pub fn deleted_at(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }

    #[must_use]
    pub fn with_public_link(mut self, enabled: bool) -> Self {
        self.public_link_enabled = enabled;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl TeamMembership {
    pub fn new(user_id: impl Into<String>, team_id: impl Into<String>, role: RoleType) -> Self {
        Self {
            user_id: user_id.into(),
            team_id: team_id.into(),
            role,
        }
    }
}

impl ProjectMembership {
    pub fn new(user_id: impl Into<String>, project_id: impl Into<String>, role: RoleType) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
            role,
        }
    }
}

// ============================================================================
// Row Encoding
// ============================================================================

impl From<&User> for Row {
    fn from(user: &User) -> Self {
        Row::new()
            .with("id", user.id.as_str())
            .with("email", user.email.as_str())
            .with("name", user.name.as_str())
    }
}

impl From<&Team> for Row {
    fn from(team: &Team) -> Self {
        Row::new()
            .with("id", team.id.as_str())
            .with("name", team.name.as_str())
            .with("plan", team.plan.as_str())
    }
}

impl From<&Project> for Row {
    fn from(project: &Project) -> Self {
        Row::new()
            .with("id", project.id.as_str())
            .with("name", project.name.as_str())
            .with("teamId", project.team_id.as_str())
            .with("visibility", project.visibility.as_str())
    }
}

impl From<&Document> for Row {
    fn from(document: &Document) -> Self {
        Row::new()
            .with("id", document.id.as_str())
            .with("title", document.title.as_str())
            .with("projectId", document.project_id.as_str())
            .with("creatorId", document.creator_id.as_str())
            .with("deletedAt", document.deleted_at)
            .with("publicLinkEnabled", document.public_link_enabled)
    }
}

impl From<&TeamMembership> for Row {
    fn from(membership: &TeamMembership) -> Self {
        Row::new()
            .with("userId", membership.user_id.as_str())
            .with("teamId", membership.team_id.as_str())
            .with("role", membership.role.as_str())
    }
}

impl From<&ProjectMembership> for Row {
    fn from(membership: &ProjectMembership) -> Self {
        Row::new()
            .with("userId", membership.user_id.as_str())
            .with("projectId", membership.project_id.as_str())
            .with("role", membership.role.as_str())
    }
}
