//! In-memory [`DataLoader`] over the document-sharing entities.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_abac::{DataLoader, LoadError, LoadedData, Row};

use crate::model::{Document, Project, ProjectMembership, Team, TeamMembership, User};

// ============================================================================
// Resource
// ============================================================================

/// The resource an access request targets, by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    Document(String),
    Project(String),
    Team(String),
}

impl ResourceRef {
    pub fn document(id: impl Into<String>) -> Self {
        ResourceRef::Document(id.into())
    }

    pub fn project(id: impl Into<String>) -> Self {
        ResourceRef::Project(id.into())
    }

    pub fn team(id: impl Into<String>) -> Self {
        ResourceRef::Team(id.into())
    }
}

impl Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Document(id) => write!(f, "document:{id}"),
            ResourceRef::Project(id) => write!(f, "project:{id}"),
            ResourceRef::Team(id) => write!(f, "team:{id}"),
        }
    }
}

// ============================================================================
// InMemoryDataLoader
// ============================================================================

/// Entity store answering engine data requests from memory.
///
/// Entities are looked up relative to the resource: a document resolves its
/// project, and a project resolves its team. Lookups that find nothing leave
/// the table out of the result, so guards reading it evaluate to unknown.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataLoader {
    users: BTreeMap<String, User>,
    teams: BTreeMap<String, Team>,
    projects: BTreeMap<String, Project>,
    documents: BTreeMap<String, Document>,
    team_memberships: Vec<TeamMembership>,
    project_memberships: Vec<ProjectMembership>,
}

impl InMemoryDataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, user: User) -> &mut Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn add_team(&mut self, team: Team) -> &mut Self {
        self.teams.insert(team.id.clone(), team);
        self
    }

    pub fn add_project(&mut self, project: Project) -> &mut Self {
        self.projects.insert(project.id.clone(), project);
        self
    }

    pub fn add_document(&mut self, document: Document) -> &mut Self {
        self.documents.insert(document.id.clone(), document);
        self
    }

    pub fn add_team_membership(&mut self, membership: TeamMembership) -> &mut Self {
        self.team_memberships.push(membership);
        self
    }

    pub fn add_project_membership(&mut self, membership: ProjectMembership) -> &mut Self {
        self.project_memberships.push(membership);
        self
    }

    /// Removes every stored entity.
    pub fn clear(&mut self) -> &mut Self {
        self.users.clear();
        self.teams.clear();
        self.projects.clear();
        self.documents.clear();
        self.team_memberships.clear();
        self.project_memberships.clear();
        self
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn team_memberships_for_user(&self, user_id: &str) -> Vec<&TeamMembership> {
        self.team_memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .collect()
    }

    pub fn project_memberships_for_user(&self, user_id: &str) -> Vec<&ProjectMembership> {
        self.project_memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .collect()
    }

    /// Projects owned by `team_id`, ordered by project id.
    pub fn projects_for_team(&self, team_id: &str) -> Vec<&Project> {
        self.projects
            .values()
            .filter(|p| p.team_id == team_id)
            .collect()
    }

    /// Documents in `project_id`, ordered by document id.
    pub fn documents_for_project(&self, project_id: &str) -> Vec<&Document> {
        self.documents
            .values()
            .filter(|d| d.project_id == project_id)
            .collect()
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    fn document(&self, resource: &ResourceRef) -> Option<&Document> {
        match resource {
            ResourceRef::Document(id) => self.documents.get(id),
            ResourceRef::Project(_) | ResourceRef::Team(_) => None,
        }
    }

    fn project_id<'a>(&'a self, resource: &'a ResourceRef) -> Option<&'a str> {
        match resource {
            ResourceRef::Document(_) => self.document(resource).map(|d| d.project_id.as_str()),
            ResourceRef::Project(id) => Some(id.as_str()),
            ResourceRef::Team(_) => None,
        }
    }

    fn project(&self, resource: &ResourceRef) -> Option<&Project> {
        self.project_id(resource)
            .and_then(|id| self.projects.get(id))
    }

    fn team_id<'a>(&'a self, resource: &'a ResourceRef) -> Option<&'a str> {
        match resource {
            ResourceRef::Team(id) => Some(id.as_str()),
            ResourceRef::Document(_) | ResourceRef::Project(_) => {
                self.project(resource).map(|p| p.team_id.as_str())
            }
        }
    }

    /// Team of the resource, else the subject's first team.
    fn team(&self, resource: &ResourceRef, user_id: &str) -> Option<&Team> {
        let team_id = self.team_id(resource).or_else(|| {
            self.team_memberships
                .iter()
                .find(|m| m.user_id == user_id)
                .map(|m| m.team_id.as_str())
        })?;
        self.teams.get(team_id)
    }

    fn team_membership(&self, resource: &ResourceRef, user_id: &str) -> Option<&TeamMembership> {
        let team_id = self.team_id(resource);
        preferred(
            self.team_memberships.iter().filter(|m| m.user_id == user_id),
            |m| team_id == Some(m.team_id.as_str()),
        )
    }

    fn project_membership(
        &self,
        resource: &ResourceRef,
        user_id: &str,
    ) -> Option<&ProjectMembership> {
        let project_id = self.project_id(resource);
        preferred(
            self.project_memberships.iter().filter(|m| m.user_id == user_id),
            |m| project_id == Some(m.project_id.as_str()),
        )
    }

    fn load_table(
        &self,
        table: &str,
        resource: &ResourceRef,
        user_id: &str,
    ) -> Result<Option<Row>, LoadError> {
        let row = match table {
            "user" => self.users.get(user_id).map(Row::from),
            "team" => self.team(resource, user_id).map(Row::from),
            "project" => self.project(resource).map(Row::from),
            "document" => self.document(resource).map(Row::from),
            "teamMembership" => self.team_membership(resource, user_id).map(Row::from),
            "projectMembership" => self.project_membership(resource, user_id).map(Row::from),
            other => return Err(LoadError::unknown_table(other)),
        };
        Ok(row)
    }
}

/// First candidate accepted by `matches`, else the first candidate.
fn preferred<'a, T>(
    candidates: impl Iterator<Item = &'a T>,
    matches: impl Fn(&T) -> bool,
) -> Option<&'a T> {
    let mut first = None;
    for candidate in candidates {
        if matches(candidate) {
            return Some(candidate);
        }
        first.get_or_insert(candidate);
    }
    first
}

impl DataLoader for InMemoryDataLoader {
    type Resource = ResourceRef;
    type Subject = str;

    fn load_data(
        &self,
        resource: &ResourceRef,
        subject: &str,
        required_tables: &BTreeSet<String>,
    ) -> Result<LoadedData, LoadError> {
        let mut data = LoadedData::new();
        for table in required_tables {
            match self.load_table(table, resource, subject)? {
                Some(row) => data.insert_row(table.as_str(), row),
                None => debug!(%resource, user = subject, table = %table, "No row for table"),
            }
        }
        Ok(data)
    }
}

// ============================================================================
// Tests
// ============================================================================
