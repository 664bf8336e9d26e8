//! # warden-documents: Document sharing on top of `warden-abac`
//!
//! A ready-made domain for the engine: users, teams, projects, and documents
//! with team and project memberships. It provides the entity model, the
//! standard sharing policies, and an in-memory loader that serves the tables
//! those policies read.
//!
//! ```text
//!   Team ──owns──> Project ──contains──> Document
//!    ▲                ▲
//!    │ TeamMembership │ ProjectMembership
//!    └───── User ─────┘
//! ```
//!
//! # Example
//!
//! ```
//! use warden_abac::PolicyEngine;
//! use warden_documents::model::{Document, PlanType, Project, Team, User, Visibility};
//! use warden_documents::policies::{standard_policies, CAN_EDIT, CAN_VIEW};
//! use warden_documents::{InMemoryDataLoader, ResourceRef};
//!
//! let mut loader = InMemoryDataLoader::new();
//! loader
//!     .add_user(User::new("u1", "ana@example.com", "Ana"))
//!     .add_team(Team::new("t1", "Core", PlanType::Pro))
//!     .add_project(Project::new("p1", "Roadmap", "t1", Visibility::Public))
//!     .add_document(Document::new("d1", "Q3 plan", "p1", "u1"));
//!
//! let engine = PolicyEngine::new(loader).without_audit();
//! engine.add_policies(standard_policies()).unwrap();
//!
//! let doc = ResourceRef::document("d1");
//! assert!(engine.decide(&doc, "u1", &CAN_EDIT).unwrap());
//! assert!(!engine.decide(&doc, "u2", &CAN_VIEW).unwrap());
//! ```

pub mod loader;
pub mod model;
pub mod policies;

pub use loader::{InMemoryDataLoader, ResourceRef};
