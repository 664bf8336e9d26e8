//! Policy engine: filtering, data loading, and conflict resolution.
//!
//! A decision runs in three phases:
//!
//! 1. Keep the policies that govern the requested permission. None means
//!    default deny without touching the loader.
//! 2. Ask the loader once for the union of their declared tables.
//! 3. Evaluate DENY guards first; the first `True` denies. Then ALLOW guards;
//!    the first `True` allows. Otherwise deny.
//!
//! `Unknown` never triggers a policy. It is kept verbatim in the trace.
//!
//! The policy set is an immutable snapshot behind a lock. Writers publish a
//! new `Arc<Vec<Policy>>`; a decision clones the current `Arc` and runs
//! against it, so it never observes a partially applied update.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::data::LoadedData;
use crate::evaluator::{EvaluationError, Evaluator, TriValue};
use crate::loader::{DataLoader, LoadError};
use crate::policy::{
    Effect, Permission, Policy, PolicyError, RequirementCheck, collect_required_tables,
};

// ============================================================================
// Errors
// ============================================================================

/// Fatal engine error. Distinct from a deny so hosts can alert on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A guard could not be evaluated.
    #[error("policy '{policy}' failed to evaluate: {source}")]
    Evaluation {
        policy: String,
        #[source]
        source: EvaluationError,
    },

    /// The loader failed.
    #[error("data loading failed: {0}")]
    Load(#[from] LoadError),

    /// A policy with this name is already registered.
    #[error("policy '{0}' is already registered")]
    DuplicatePolicy(String),

    /// A policy was refused by validation.
    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("policy set lock poisoned")]
    LockPoisoned,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================================
// Trace
// ============================================================================

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "policy", rename_all = "snake_case")]
pub enum DecisionReason {
    /// No policy governs the permission.
    NoApplicablePolicy,
    /// The named DENY policy's guard was true.
    DenyMatched(String),
    /// The named ALLOW policy's guard was true.
    AllowMatched(String),
    /// Policies applied but none triggered.
    DefaultDeny,
}

impl DecisionReason {
    /// Name of the policy that decided the outcome, if any.
    pub fn matched_policy(&self) -> Option<&str> {
        match self {
            DecisionReason::DenyMatched(name) | DecisionReason::AllowMatched(name) => Some(name),
            DecisionReason::NoApplicablePolicy | DecisionReason::DefaultDeny => None,
        }
    }
}

impl Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::NoApplicablePolicy => f.write_str("No applicable policies found"),
            DecisionReason::DenyMatched(name) => write!(f, "DENY policy matched: {name}"),
            DecisionReason::AllowMatched(name) => write!(f, "ALLOW policy matched: {name}"),
            DecisionReason::DefaultDeny => f.write_str("No policies matched - default deny"),
        }
    }
}

/// Raw outcome of one evaluated guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub policy_name: String,
    pub effect: Effect,
    pub result: TriValue,
}

/// Full record of a decision, for audit and debugging.
///
/// `policy_results` lists every guard actually evaluated, in evaluation
/// order, stopping at the same point the decision did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub permission: Permission,
    pub allowed: bool,
    pub reason: DecisionReason,
    /// Tables requested from the loader (empty when no policy applied).
    pub required_tables: BTreeSet<String>,
    pub policy_results: Vec<PolicyResult>,
}

// ============================================================================
// Options
// ============================================================================

/// Engine behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Log every decision at info (grant) or warn (deny).
    pub audit_enabled: bool,
    /// How under-declared policies are treated when added.
    pub requirement_check: RequirementCheck,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            requirement_check: RequirementCheck::default(),
        }
    }
}

// ============================================================================
// PolicyEngine
// ============================================================================

/// ABAC decision engine.
///
/// Safe to share across threads: decisions take a read snapshot of the
/// policy set and never mutate shared state.
pub struct PolicyEngine<L: DataLoader> {
    loader: L,
    evaluator: Evaluator,
    policies: RwLock<Arc<Vec<Policy>>>,
    options: EngineOptions,
}

/// Outcome of the resolution algorithm, before it is logged or traced.
struct Resolution {
    allowed: bool,
    reason: DecisionReason,
    required_tables: BTreeSet<String>,
}

impl<L: DataLoader> PolicyEngine<L> {
    /// Creates an engine with no policies and default options.
    pub fn new(loader: L) -> Self {
        Self::with_evaluator(loader, Evaluator::new())
    }

    /// Creates an engine from a loader and an evaluator.
    pub fn with_evaluator(loader: L, evaluator: Evaluator) -> Self {
        Self {
            loader,
            evaluator,
            policies: RwLock::new(Arc::new(Vec::new())),
            options: EngineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Disables decision audit logging (for testing).
    #[must_use]
    pub fn without_audit(mut self) -> Self {
        self.options.audit_enabled = false;
        self
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    // ------------------------------------------------------------------------
    // Policy set
    // ------------------------------------------------------------------------

    /// Registers one policy.
    ///
    /// # Errors
    ///
    /// See [`PolicyEngine::add_policies`].
    pub fn add_policy(&self, policy: Policy) -> Result<()> {
        self.add_policies([policy])
    }

    /// Registers several policies atomically: either all are published or
    /// none are.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DuplicatePolicy`] if a name is already registered or
    ///   repeated in the batch.
    /// - [`EngineError::Policy`] if validation fails under
    ///   [`RequirementCheck::Reject`].
    /// - [`EngineError::LockPoisoned`] if a writer panicked.
    pub fn add_policies(&self, policies: impl IntoIterator<Item = Policy>) -> Result<()> {
        let incoming: Vec<Policy> = policies.into_iter().collect();
        for policy in &incoming {
            self.check_requirements(policy)?;
        }

        let mut current = self.policies.write().map_err(|_| EngineError::LockPoisoned)?;
        let mut next: Vec<Policy> = (**current).clone();
        let added = incoming.len();
        for policy in incoming {
            if next.iter().any(|existing| existing.name == policy.name) {
                error!(policy = %policy.name, "Duplicate policy name rejected");
                return Err(EngineError::DuplicatePolicy(policy.name));
            }
            next.push(policy);
        }
        *current = Arc::new(next);

        debug!(added, total = current.len(), "Policy set updated");
        Ok(())
    }

    /// Removes the policy named `name`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LockPoisoned`] if a writer panicked.
    pub fn remove_policy(&self, name: &str) -> Result<bool> {
        let mut current = self.policies.write().map_err(|_| EngineError::LockPoisoned)?;
        if !current.iter().any(|policy| policy.name == name) {
            return Ok(false);
        }
        let next: Vec<Policy> = current
            .iter()
            .filter(|policy| policy.name != name)
            .cloned()
            .collect();
        *current = Arc::new(next);

        debug!(policy = %name, total = current.len(), "Policy removed");
        Ok(true)
    }

    /// Returns a copy of the current policy set, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LockPoisoned`] if a writer panicked.
    pub fn list_policies(&self) -> Result<Vec<Policy>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.as_ref().clone())
    }

    /// Number of registered policies.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LockPoisoned`] if a writer panicked.
    pub fn policy_count(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    fn snapshot(&self) -> Result<Arc<Vec<Policy>>> {
        let current = self.policies.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(Arc::clone(&current))
    }

    fn check_requirements(&self, policy: &Policy) -> Result<()> {
        match self.options.requirement_check {
            RequirementCheck::Off => Ok(()),
            RequirementCheck::Warn => {
                if let Err(e) = policy.validate() {
                    warn!(policy = %policy.name, error = %e, "Policy failed validation");
                }
                Ok(())
            }
            RequirementCheck::Reject => policy.validate().map_err(|e| {
                error!(policy = %policy.name, error = %e, "Policy rejected");
                EngineError::Policy(e)
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------------

    /// Decides whether `subject` holds `permission` on `resource`.
    ///
    /// # Errors
    ///
    /// Returns an error for loader failures and misconfigured guards. A deny
    /// is `Ok(false)`, never an error.
    pub fn decide(
        &self,
        resource: &L::Resource,
        subject: &L::Subject,
        permission: &Permission,
    ) -> Result<bool> {
        let resolution = self.resolve(resource, subject, permission, |_, _| {})?;
        self.audit(permission, &resolution);
        Ok(resolution.allowed)
    }

    /// Same decision as [`PolicyEngine::decide`], with every evaluated guard
    /// recorded.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyEngine::decide`].
    pub fn decide_with_trace(
        &self,
        resource: &L::Resource,
        subject: &L::Subject,
        permission: &Permission,
    ) -> Result<DecisionTrace> {
        let mut policy_results = Vec::new();
        let resolution = self.resolve(resource, subject, permission, |policy, result| {
            policy_results.push(PolicyResult {
                policy_name: policy.name.clone(),
                effect: policy.effect,
                result,
            });
        })?;
        self.audit(permission, &resolution);

        Ok(DecisionTrace {
            permission: permission.clone(),
            allowed: resolution.allowed,
            reason: resolution.reason,
            required_tables: resolution.required_tables,
            policy_results,
        })
    }

    fn resolve(
        &self,
        resource: &L::Resource,
        subject: &L::Subject,
        permission: &Permission,
        mut record: impl FnMut(&Policy, TriValue),
    ) -> Result<Resolution> {
        let snapshot = self.snapshot()?;
        let applicable: Vec<&Policy> = snapshot
            .iter()
            .filter(|policy| policy.governs(permission))
            .collect();

        if applicable.is_empty() {
            return Ok(Resolution {
                allowed: false,
                reason: DecisionReason::NoApplicablePolicy,
                required_tables: BTreeSet::new(),
            });
        }

        let required_tables = collect_required_tables(applicable.iter().copied());
        let data = self.loader.load_data(resource, subject, &required_tables)?;

        for effect in [Effect::Deny, Effect::Allow] {
            for policy in applicable.iter().filter(|policy| policy.effect == effect) {
                let result = self.evaluate_guard(policy, &data)?;
                record(policy, result);
                if result.is_true() {
                    let reason = match effect {
                        Effect::Deny => DecisionReason::DenyMatched(policy.name.clone()),
                        Effect::Allow => DecisionReason::AllowMatched(policy.name.clone()),
                    };
                    return Ok(Resolution {
                        allowed: effect == Effect::Allow,
                        reason,
                        required_tables,
                    });
                }
            }
        }

        Ok(Resolution {
            allowed: false,
            reason: DecisionReason::DefaultDeny,
            required_tables,
        })
    }

    fn evaluate_guard(&self, policy: &Policy, data: &LoadedData) -> Result<TriValue> {
        let result = self
            .evaluator
            .evaluate(&policy.guard, data)
            .map_err(|source| {
                error!(policy = %policy.name, error = %source, "Guard evaluation failed");
                EngineError::Evaluation {
                    policy: policy.name.clone(),
                    source,
                }
            })?;
        debug!(policy = %policy.name, effect = %policy.effect, %result, "Policy evaluated");
        Ok(result)
    }

    fn audit(&self, permission: &Permission, resolution: &Resolution) {
        if !self.options.audit_enabled {
            return;
        }
        if resolution.allowed {
            info!(permission = %permission, reason = %resolution.reason, "Access granted");
        } else {
            warn!(permission = %permission, reason = %resolution.reason, "Access denied");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use crate::expression::{Expression, FieldPath};
    use crate::scalar::Scalar;
    use std::sync::Mutex;

    const CAN_VIEW: Permission = Permission::from_static("CAN_VIEW");
    const CAN_EDIT: Permission = Permission::from_static("CAN_EDIT");
    const CAN_ARCHIVE: Permission = Permission::from_static("CAN_ARCHIVE");

    /// Loader that serves fixed tables (filtered to the request) and records
    /// every request.
    #[derive(Default)]
    struct RecordingLoader {
        data: LoadedData,
        requests: Mutex<Vec<BTreeSet<String>>>,
    }

    impl RecordingLoader {
        fn new(data: LoadedData) -> Self {
            Self {
                data,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<BTreeSet<String>> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl DataLoader for RecordingLoader {
        type Resource = ();
        type Subject = ();

        fn load_data(
            &self,
            _resource: &(),
            _subject: &(),
            required_tables: &BTreeSet<String>,
        ) -> std::result::Result<LoadedData, LoadError> {
            self.requests.lock().unwrap().push(required_tables.clone());
            let mut data = LoadedData::new();
            for table in required_tables {
                if let Some(row) = self.data.row(table) {
                    data.insert_row(table.clone(), row.clone());
                }
            }
            Ok(data)
        }
    }

    fn field(path: &str) -> FieldPath {
        path.parse().unwrap()
    }

    fn deleted_document() -> LoadedData {
        LoadedData::new()
            .with_row("user", Row::new().with("id", "u1"))
            .with_row(
                "document",
                Row::new()
                    .with("id", "d1")
                    .with("creatorId", "u1")
                    .with("deletedAt", "2025-01-08T10:00:00Z")
                    .with("publicLinkEnabled", false),
            )
    }

    fn deleted_deny() -> Policy {
        Policy::deny(
            "deleted_document_deny",
            Expression::ne(field("document.deletedAt"), Scalar::Null),
        )
        .with_permission(CAN_EDIT)
        .with_required_data(["document"])
    }

    fn creator_allow() -> Policy {
        Policy::allow(
            "document_creator_allow",
            Expression::eq(field("user.id"), field("document.creatorId")),
        )
        .with_permissions([CAN_VIEW, CAN_EDIT])
        .with_required_data(["user", "document"])
    }

    fn membership_allow() -> Policy {
        Policy::allow(
            "editor_allow",
            Expression::eq(field("projectMembership.role"), "EDITOR"),
        )
        .with_permissions([CAN_VIEW, CAN_EDIT])
        .with_required_data(["projectMembership"])
    }

    fn engine(data: LoadedData) -> PolicyEngine<RecordingLoader> {
        PolicyEngine::new(RecordingLoader::new(data)).without_audit()
    }

    #[test]
    fn test_default_deny_without_loading() {
        let engine = engine(deleted_document());
        engine.add_policies([deleted_deny(), creator_allow()]).unwrap();

        let trace = engine.decide_with_trace(&(), &(), &CAN_ARCHIVE).unwrap();
        assert!(!trace.allowed);
        assert_eq!(trace.reason, DecisionReason::NoApplicablePolicy);
        assert!(trace.policy_results.is_empty());
        assert!(!engine.decide(&(), &(), &CAN_ARCHIVE).unwrap());
        assert!(engine.loader().requests().is_empty());
    }

    #[test]
    fn test_deny_overrides_allow() {
        let engine = engine(deleted_document());
        // Allow registered first: order must not matter.
        engine.add_policies([creator_allow(), deleted_deny()]).unwrap();

        assert!(!engine.decide(&(), &(), &CAN_EDIT).unwrap());
        let trace = engine.decide_with_trace(&(), &(), &CAN_EDIT).unwrap();
        assert_eq!(
            trace.reason,
            DecisionReason::DenyMatched("deleted_document_deny".to_string())
        );
        // Short-circuit: the allow guard never ran.
        assert_eq!(
            trace.policy_results,
            vec![PolicyResult {
                policy_name: "deleted_document_deny".to_string(),
                effect: Effect::Deny,
                result: TriValue::True,
            }]
        );
    }

    #[test]
    fn test_allow_when_no_deny_applies() {
        let engine = engine(deleted_document());
        engine.add_policies([deleted_deny(), creator_allow()]).unwrap();

        // CAN_VIEW is not governed by the deleted-document deny.
        let trace = engine.decide_with_trace(&(), &(), &CAN_VIEW).unwrap();
        assert!(trace.allowed);
        assert_eq!(trace.reason.to_string(), "ALLOW policy matched: document_creator_allow");
        assert_eq!(trace.reason.matched_policy(), Some("document_creator_allow"));
    }

    #[test]
    fn test_minimal_fetch() {
        let engine = engine(deleted_document());
        engine
            .add_policies([deleted_deny(), creator_allow(), membership_allow()])
            .unwrap();

        engine.decide(&(), &(), &CAN_VIEW).unwrap();
        engine.decide(&(), &(), &CAN_EDIT).unwrap();

        let expected_view: BTreeSet<String> = ["document", "projectMembership", "user"]
            .into_iter()
            .map(String::from)
            .collect();
        let requests = engine.loader().requests();
        assert_eq!(requests.len(), 2, "one loader call per decision");
        assert_eq!(requests[0], expected_view);
        assert_eq!(requests[1], expected_view);
    }

    #[test]
    fn test_unknown_never_triggers() {
        let engine = engine(deleted_document());
        let deny_on_missing = Policy::deny(
            "team_deny",
            Expression::eq(field("teamMembership.role"), "VIEWER"),
        )
        .with_permission(CAN_VIEW)
        .with_required_data(["teamMembership"]);
        engine.add_policies([deny_on_missing, membership_allow()]).unwrap();

        let trace = engine.decide_with_trace(&(), &(), &CAN_VIEW).unwrap();
        assert!(!trace.allowed);
        assert_eq!(trace.reason, DecisionReason::DefaultDeny);
        let results: Vec<TriValue> = trace.policy_results.iter().map(|r| r.result).collect();
        assert_eq!(results, vec![TriValue::Unknown, TriValue::Unknown]);
    }

    #[test]
    fn test_evaluation_error_is_fatal() {
        let engine = engine(deleted_document());
        let broken = Policy::allow(
            "broken",
            Expression::gt(field("document.publicLinkEnabled"), false),
        )
        .with_permission(CAN_VIEW)
        .with_required_data(["document"]);
        engine.add_policy(broken).unwrap();

        let err = engine.decide(&(), &(), &CAN_VIEW).unwrap_err();
        assert!(
            matches!(&err, EngineError::Evaluation { policy, .. } if policy == "broken"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_load_error_is_fatal() {
        struct Failing(LoadError);
        impl DataLoader for Failing {
            type Resource = ();
            type Subject = ();
            fn load_data(
                &self,
                _: &(),
                _: &(),
                _: &BTreeSet<String>,
            ) -> std::result::Result<LoadedData, LoadError> {
                Err(self.0.clone())
            }
        }

        for error in [
            LoadError::unknown_table("invoice"),
            LoadError::failed("connection reset"),
        ] {
            let engine = PolicyEngine::new(Failing(error.clone())).without_audit();
            engine.add_policy(creator_allow()).unwrap();
            assert_eq!(
                engine.decide(&(), &(), &CAN_VIEW),
                Err(EngineError::Load(error))
            );
        }
    }

    #[test]
    fn test_duplicate_batch_is_atomic() {
        let engine = engine(deleted_document());
        engine.add_policy(creator_allow()).unwrap();

        let err = engine
            .add_policies([deleted_deny(), creator_allow()])
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::DuplicatePolicy("document_creator_allow".to_string())
        );
        assert_eq!(engine.policy_count().unwrap(), 1, "batch must not be partially applied");
    }

    #[test]
    fn test_remove_and_list() {
        let engine = engine(deleted_document());
        engine.add_policies([deleted_deny(), creator_allow()]).unwrap();

        let listed = engine.list_policies().unwrap();
        let names: Vec<&str> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["deleted_document_deny", "document_creator_allow"]);

        assert!(engine.remove_policy("deleted_document_deny").unwrap());
        assert!(!engine.remove_policy("deleted_document_deny").unwrap());
        assert!(engine.decide(&(), &(), &CAN_EDIT).unwrap());

        // The earlier snapshot is unaffected by the removal.
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_reject_mode_refuses_undeclared_tables() {
        let engine = engine(LoadedData::new()).with_options(EngineOptions {
            audit_enabled: false,
            requirement_check: RequirementCheck::Reject,
        });
        let sloppy = Policy::allow(
            "sloppy",
            Expression::eq(field("user.id"), field("document.creatorId")),
        )
        .with_permission(CAN_VIEW)
        .with_required_data(["user"]);

        let err = engine.add_policy(sloppy.clone()).unwrap_err();
        assert!(matches!(err, EngineError::Policy(PolicyError::UndeclaredTables { .. })));
        assert_eq!(engine.policy_count().unwrap(), 0);

        // The default (warn) accepts it.
        let lenient = PolicyEngine::new(RecordingLoader::default()).without_audit();
        lenient.add_policy(sloppy).unwrap();
        assert_eq!(lenient.policy_count().unwrap(), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let engine = Arc::new(engine(deleted_document()));
        engine.add_policies([deleted_deny(), creator_allow()]).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.decide(&(), &(), &CAN_VIEW).unwrap())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn test_trace_serializes() {
        let engine = engine(deleted_document());
        engine.add_policies([deleted_deny(), creator_allow()]).unwrap();
        let trace = engine.decide_with_trace(&(), &(), &CAN_EDIT).unwrap();

        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["permission"], "CAN_EDIT");
        assert_eq!(json["allowed"], false);
        assert_eq!(json["reason"]["kind"], "deny_matched");
        assert_eq!(json["reason"]["policy"], "deleted_document_deny");
        assert_eq!(json["policy_results"][0]["result"], "TRUE");
        assert_eq!(json["policy_results"][0]["effect"], "DENY");
    }
}
