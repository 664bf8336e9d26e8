//! # warden-abac: Tri-valued Attribute-Based Access Control
//!
//! Decides ALLOW or DENY for a `(resource, subject, permission)` request by
//! evaluating declarative policies against entity data that is loaded lazily,
//! table by table, only for the policies that govern the permission.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  decide(resource, subject, permission)       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PolicyEngine                                │
//! │  ├─ Filter policies by permission            │
//! │  ├─ Union their declared tables              │
//! │  └─ DataLoader::load_data (once)             │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Evaluator (TRUE / FALSE / UNKNOWN)          │
//! │  ├─ DENY guards first: first TRUE denies     │
//! │  ├─ ALLOW guards next: first TRUE allows     │
//! │  └─ Otherwise default deny                   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  bool, or DecisionTrace                      │
//! │  - Reason (matched policy or default)        │
//! │  - Per-policy TriValue                       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! A guard that touches a table the loader did not return evaluates to
//! UNKNOWN, which never triggers a policy. Misconfigured guards and loader
//! failures surface as [`EngineError`], never as a silent deny.
//!
//! ## Examples
//!
//! ```
//! use std::collections::BTreeSet;
//! use warden_abac::{
//!     DataLoader, Expression, FieldPath, LoadError, LoadedData, Permission, Policy,
//!     PolicyEngine, Row,
//! };
//!
//! struct Fixed(LoadedData);
//!
//! impl DataLoader for Fixed {
//!     type Resource = str;
//!     type Subject = str;
//!
//!     fn load_data(
//!         &self,
//!         _resource: &str,
//!         _subject: &str,
//!         _tables: &BTreeSet<String>,
//!     ) -> Result<LoadedData, LoadError> {
//!         Ok(self.0.clone())
//!     }
//! }
//!
//! const CAN_VIEW: Permission = Permission::from_static("CAN_VIEW");
//!
//! let data = LoadedData::new()
//!     .with_row("document", Row::new().with("publicLinkEnabled", true));
//! let engine = PolicyEngine::new(Fixed(data));
//! engine
//!     .add_policy(
//!         Policy::allow(
//!             "public_link_allow",
//!             Expression::eq(FieldPath::new("document", "publicLinkEnabled"), true),
//!         )
//!         .with_permission(CAN_VIEW)
//!         .with_required_data(["document"]),
//!     )
//!     .unwrap();
//!
//! assert!(engine.decide("d1", "u1", &CAN_VIEW).unwrap());
//! ```

pub mod data;
pub mod engine;
pub mod evaluator;
pub mod expression;
pub mod loader;
pub mod policy;
pub mod scalar;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;


pub use data::{LoadedData, Row};
pub use engine::{
    DecisionReason, DecisionTrace, EngineError, EngineOptions, PolicyEngine, PolicyResult,
};
pub use evaluator::{EvaluationError, Evaluator, TriValue, evaluate};
pub use expression::{Comparison, Expression, ExpressionError, FieldPath, Operand, Operator};
pub use loader::{DataLoader, LoadError};
pub use policy::{
    Effect, Permission, Policy, PolicyError, RequirementCheck, collect_required_tables,
};
pub use scalar::{Scalar, ScalarError, ScalarKind};
