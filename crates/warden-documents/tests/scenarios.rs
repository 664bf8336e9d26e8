//! End-to-end decisions over the standard document-sharing policies.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use chrono::{TimeZone, Utc};
use test_case::test_case;
use warden_abac::{
    DataLoader, DecisionReason, Effect, LoadError, LoadedData, Permission, PolicyEngine, TriValue,
};
use warden_documents::model::{
    Document, PlanType, Project, ProjectMembership, RoleType, Team, TeamMembership, User,
    Visibility,
};
use warden_documents::policies::{CAN_DELETE, CAN_EDIT, CAN_SHARE, CAN_VIEW, standard_policies};
use warden_documents::{InMemoryDataLoader, ResourceRef};

// ============================================================================
// Fixtures
// ============================================================================

/// Two teams, three projects, and one user per relationship of interest.
///
/// | document    | project            | team          | notes          |
/// |-------------|--------------------|---------------|----------------|
/// | `d-live`    | `p-public` PUBLIC  | `t-pro` PRO   |                |
/// | `d-deleted` | `p-public` PUBLIC  | `t-pro` PRO   | soft-deleted   |
/// | `d-linked`  | `p-public` PUBLIC  | `t-pro` PRO   | public link    |
/// | `d-private` | `p-private` PRIVATE| `t-pro` PRO   |                |
/// | `d-free`    | `p-free` PUBLIC    | `t-free` FREE |                |
///
/// `creator` wrote every document.
fn world() -> InMemoryDataLoader {
    let deleted_at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
    let mut loader = InMemoryDataLoader::new();
    loader
        .add_user(User::new("creator", "creator@example.com", "Cora"))
        .add_user(User::new("editor", "editor@example.com", "Eli"))
        .add_user(User::new("stranger", "stranger@example.com", "Sam"))
        .add_user(User::new("team-admin", "admin@example.com", "Tia"))
        .add_user(User::new("team-editor", "teamed@example.com", "Ted"))
        .add_user(User::new("project-admin", "padmin@example.com", "Pia"))
        .add_team(Team::new("t-pro", "Platform", PlanType::Pro))
        .add_team(Team::new("t-free", "Side project", PlanType::Free))
        .add_project(Project::new("p-public", "Handbook", "t-pro", Visibility::Public))
        .add_project(Project::new("p-private", "Payroll", "t-pro", Visibility::Private))
        .add_project(Project::new("p-free", "Blog", "t-free", Visibility::Public))
        .add_document(Document::new("d-live", "Onboarding", "p-public", "creator"))
        .add_document(
            Document::new("d-deleted", "Old FAQ", "p-public", "creator").deleted_at(deleted_at),
        )
        .add_document(
            Document::new("d-linked", "Press kit", "p-public", "creator").with_public_link(true),
        )
        .add_document(Document::new("d-private", "Salaries", "p-private", "creator"))
        .add_document(Document::new("d-free", "Launch post", "p-free", "creator"))
        .add_project_membership(ProjectMembership::new("editor", "p-public", RoleType::Editor))
        .add_project_membership(ProjectMembership::new("project-admin", "p-free", RoleType::Admin))
        .add_team_membership(TeamMembership::new("team-admin", "t-pro", RoleType::Admin))
        .add_team_membership(TeamMembership::new("team-editor", "t-pro", RoleType::Editor));
    loader
}

fn engine() -> PolicyEngine<InMemoryDataLoader> {
    let engine = PolicyEngine::new(world()).without_audit();
    engine.add_policies(standard_policies()).unwrap();
    engine
}

fn decide(document: &str, user: &str, permission: &Permission) -> bool {
    engine()
        .decide(&ResourceRef::document(document), user, permission)
        .unwrap()
}

/// Counts loader invocations.
struct CountingLoader {
    inner: InMemoryDataLoader,
    calls: AtomicUsize,
}

impl DataLoader for CountingLoader {
    type Resource = ResourceRef;
    type Subject = str;

    fn load_data(
        &self,
        resource: &ResourceRef,
        subject: &str,
        required_tables: &BTreeSet<String>,
    ) -> Result<LoadedData, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load_data(resource, subject, required_tables)
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test_case(CAN_VIEW => true; "view")]
#[test_case(CAN_EDIT => false; "edit")]
#[test_case(CAN_DELETE => false; "delete")]
#[test_case(CAN_SHARE => false; "share")]
fn test_deleted_document_is_read_only_for_creator(permission: Permission) -> bool {
    decide("d-deleted", "creator", &permission)
}

#[test]
fn test_deleted_document_deny_beats_creator_allow() {
    let trace = engine()
        .decide_with_trace(&ResourceRef::document("d-deleted"), "creator", &CAN_EDIT)
        .unwrap();

    assert!(!trace.allowed);
    assert_eq!(
        trace.reason,
        DecisionReason::DenyMatched("deleted_document_deny".to_string())
    );
    // The first deny settled it: nothing else was evaluated.
    assert_eq!(trace.policy_results.len(), 1);
    assert_eq!(trace.policy_results[0].result, TriValue::True);
}

#[test]
fn test_ungoverned_permission_never_loads() {
    let loader = CountingLoader {
        inner: world(),
        calls: AtomicUsize::new(0),
    };
    let engine = PolicyEngine::new(loader).without_audit();
    engine.add_policies(standard_policies()).unwrap();

    let archive = Permission::new("CAN_ARCHIVE");
    let trace = engine
        .decide_with_trace(&ResourceRef::document("d-live"), "creator", &archive)
        .unwrap();

    assert!(!trace.allowed);
    assert_eq!(trace.reason, DecisionReason::NoApplicablePolicy);
    assert!(trace.required_tables.is_empty());
    assert_eq!(engine.loader().calls.load(Ordering::SeqCst), 0);

    assert!(engine.decide(&ResourceRef::document("d-live"), "creator", &CAN_VIEW).unwrap());
    assert_eq!(engine.loader().calls.load(Ordering::SeqCst), 1);
}

#[test_case(CAN_VIEW => true; "view")]
#[test_case(CAN_EDIT => true; "edit")]
#[test_case(CAN_DELETE => false; "delete")]
#[test_case(CAN_SHARE => false; "share")]
fn test_project_editor_on_public_project(permission: Permission) -> bool {
    decide("d-live", "editor", &permission)
}

#[test]
fn test_project_editor_allow_is_the_reason() {
    let trace = engine()
        .decide_with_trace(&ResourceRef::document("d-live"), "editor", &CAN_EDIT)
        .unwrap();
    assert!(trace.allowed);
    assert_eq!(trace.reason.matched_policy(), Some("project_editor_allow"));
}

#[test]
fn test_stranger_without_link_is_denied_by_default() {
    let trace = engine()
        .decide_with_trace(&ResourceRef::document("d-live"), "stranger", &CAN_VIEW)
        .unwrap();

    assert!(!trace.allowed);
    assert_eq!(trace.reason, DecisionReason::DefaultDeny);

    let results: Vec<(&str, TriValue)> = trace
        .policy_results
        .iter()
        .map(|r| (r.policy_name.as_str(), r.result))
        .collect();
    assert_eq!(
        results,
        vec![
            ("private_project_deny", TriValue::False),
            ("document_creator_allow", TriValue::False),
            ("project_editor_allow", TriValue::Unknown),
            ("team_admin_allow", TriValue::Unknown),
            ("public_link_allow", TriValue::False),
        ]
    );
}

#[test_case(CAN_VIEW => true; "view")]
#[test_case(CAN_EDIT => false; "edit")]
#[test_case(CAN_DELETE => false; "delete")]
#[test_case(CAN_SHARE => false; "share")]
fn test_public_link_grants_view_only(permission: Permission) -> bool {
    decide("d-linked", "stranger", &permission)
}

#[test_case(CAN_VIEW => true; "view")]
#[test_case(CAN_EDIT => true; "edit")]
#[test_case(CAN_DELETE => true; "delete")]
#[test_case(CAN_SHARE => false; "share")]
fn test_free_plan_blocks_creator_sharing(permission: Permission) -> bool {
    decide("d-free", "creator", &permission)
}

#[test]
fn test_free_plan_deny_is_the_reason() {
    let trace = engine()
        .decide_with_trace(&ResourceRef::document("d-free"), "creator", &CAN_SHARE)
        .unwrap();
    assert_eq!(
        trace.reason,
        DecisionReason::DenyMatched("free_plan_share_deny".to_string())
    );
    assert_eq!(
        trace.required_tables,
        ["document", "project", "projectMembership", "team", "teamMembership", "user"]
            .into_iter()
            .map(String::from)
            .collect::<BTreeSet<_>>()
    );
}

#[test_case(CAN_VIEW => true; "view")]
#[test_case(CAN_EDIT => true; "edit")]
#[test_case(CAN_DELETE => false; "delete")]
#[test_case(CAN_SHARE => false; "share")]
fn test_project_admin_on_free_team(permission: Permission) -> bool {
    decide("d-free", "project-admin", &permission)
}

#[test_case(CAN_VIEW => true; "view")]
#[test_case(CAN_EDIT => true; "edit")]
#[test_case(CAN_DELETE => false; "delete")]
#[test_case(CAN_SHARE => true; "share")]
fn test_team_admin_on_private_project(permission: Permission) -> bool {
    decide("d-private", "team-admin", &permission)
}

#[test_case(CAN_VIEW; "view")]
#[test_case(CAN_EDIT; "edit")]
#[test_case(CAN_DELETE; "delete")]
#[test_case(CAN_SHARE; "share")]
fn test_team_editor_on_private_project_is_denied(permission: Permission) {
    assert!(!decide("d-private", "team-editor", &permission));
}

#[test]
fn test_private_deny_stays_unknown_without_membership_rows() {
    // The team editor has no project membership row, so the private-project
    // exception cannot be ruled out. The deny does not fire; nothing allows
    // either.
    let trace = engine()
        .decide_with_trace(&ResourceRef::document("d-private"), "team-editor", &CAN_VIEW)
        .unwrap();

    assert!(!trace.allowed);
    assert_eq!(trace.reason, DecisionReason::DefaultDeny);
    let private = trace
        .policy_results
        .iter()
        .find(|r| r.policy_name == "private_project_deny")
        .unwrap();
    assert_eq!(private.effect, Effect::Deny);
    assert_eq!(private.result, TriValue::Unknown);
}

// ============================================================================
// Engine behaviour over the domain
// ============================================================================

#[test]
fn test_decisions_are_idempotent() {
    let engine = engine();
    let doc = ResourceRef::document("d-private");
    for permission in [CAN_VIEW, CAN_EDIT, CAN_DELETE, CAN_SHARE] {
        let first = engine.decide_with_trace(&doc, "team-admin", &permission).unwrap();
        let second = engine.decide_with_trace(&doc, "team-admin", &permission).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_concurrent_decisions_agree() {
    let engine = Arc::new(engine());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let doc = ResourceRef::document("d-linked");
                (0..50)
                    .map(|_| engine.decide(&doc, "stranger", &CAN_VIEW).unwrap())
                    .all(|allowed| allowed)
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn test_removing_deny_reopens_access() {
    let engine = engine();
    let doc = ResourceRef::document("d-deleted");
    assert!(!engine.decide(&doc, "creator", &CAN_EDIT).unwrap());

    assert!(engine.remove_policy("deleted_document_deny").unwrap());
    assert!(engine.decide(&doc, "creator", &CAN_EDIT).unwrap());
}

#[test]
fn test_trace_serializes_for_audit() {
    let trace = engine()
        .decide_with_trace(&ResourceRef::document("d-linked"), "stranger", &CAN_VIEW)
        .unwrap();

    let json = serde_json::to_value(&trace).unwrap();
    assert_eq!(json["permission"], "CAN_VIEW");
    assert_eq!(json["allowed"], true);
    assert_eq!(json["reason"]["kind"], "allow_matched");
    assert_eq!(json["reason"]["policy"], "public_link_allow");
    let last = json["policy_results"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["policy_name"], "public_link_allow");
    assert_eq!(last["effect"], "ALLOW");
    assert_eq!(last["result"], "TRUE");
}
