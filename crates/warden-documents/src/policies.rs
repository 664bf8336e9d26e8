//! The standard document-sharing policy set.
//!
//! | Policy                   | Effect | Permissions               |
//! |--------------------------|--------|---------------------------|
//! | `deleted_document_deny`  | DENY   | EDIT, DELETE, SHARE       |
//! | `document_creator_allow` | ALLOW  | VIEW, EDIT, DELETE, SHARE |
//! | `project_editor_allow`   | ALLOW  | VIEW, EDIT                |
//! | `team_admin_allow`       | ALLOW  | VIEW, EDIT, SHARE         |
//! | `private_project_deny`   | DENY   | VIEW, EDIT, DELETE, SHARE |
//! | `free_plan_share_deny`   | DENY   | SHARE                     |
//! | `public_link_allow`      | ALLOW  | VIEW                      |

use warden_abac::{Expression, FieldPath, Permission, Policy, Scalar};

pub const CAN_VIEW: Permission = Permission::from_static("CAN_VIEW");
pub const CAN_EDIT: Permission = Permission::from_static("CAN_EDIT");
pub const CAN_DELETE: Permission = Permission::from_static("CAN_DELETE");
pub const CAN_SHARE: Permission = Permission::from_static("CAN_SHARE");

/// Every document permission, in display order.
pub fn all_permissions() -> [Permission; 4] {
    [CAN_VIEW, CAN_EDIT, CAN_DELETE, CAN_SHARE]
}

fn field(table: &str, column: &str) -> FieldPath {
    FieldPath::new(table, column)
}

/// The subject is a member of the document's project.
fn is_project_member() -> Expression {
    Expression::and([
        Expression::eq(field("projectMembership", "userId"), field("user", "id")),
        Expression::eq(
            field("projectMembership", "projectId"),
            field("document", "projectId"),
        ),
    ])
}

/// The subject administers the team owning the project.
fn is_team_admin() -> Expression {
    Expression::and([
        Expression::eq(field("teamMembership", "userId"), field("user", "id")),
        Expression::eq(field("teamMembership", "teamId"), field("project", "teamId")),
        Expression::eq(field("teamMembership", "role"), "ADMIN"),
    ])
}

/// Deleted documents can only be viewed.
pub fn deleted_document_deny() -> Policy {
    Policy::deny(
        "deleted_document_deny",
        Expression::ne(field("document", "deletedAt"), Scalar::Null),
    )
    .with_description("Deleted documents cannot be edited, deleted or shared")
    .with_permissions([CAN_EDIT, CAN_DELETE, CAN_SHARE])
    .with_required_data(["document"])
}

pub fn document_creator_allow() -> Policy {
    Policy::allow(
        "document_creator_allow",
        Expression::eq(field("user", "id"), field("document", "creatorId")),
    )
    .with_description("Creators have full control of their documents")
    .with_permissions(all_permissions())
    .with_required_data(["user", "document"])
}

pub fn project_editor_allow() -> Policy {
    let editor_or_admin = Expression::or([
        Expression::eq(field("projectMembership", "role"), "EDITOR"),
        Expression::eq(field("projectMembership", "role"), "ADMIN"),
    ]);
    Policy::allow(
        "project_editor_allow",
        Expression::and([
            Expression::eq(field("projectMembership", "userId"), field("user", "id")),
            Expression::eq(
                field("projectMembership", "projectId"),
                field("document", "projectId"),
            ),
            editor_or_admin,
        ]),
    )
    .with_description("Project editors and admins can view and edit")
    .with_permissions([CAN_VIEW, CAN_EDIT])
    .with_required_data(["user", "document", "projectMembership"])
}

pub fn team_admin_allow() -> Policy {
    Policy::allow(
        "team_admin_allow",
        Expression::and([
            Expression::eq(field("teamMembership", "userId"), field("user", "id")),
            Expression::eq(field("teamMembership", "teamId"), field("project", "teamId")),
            Expression::eq(field("project", "id"), field("document", "projectId")),
            Expression::eq(field("teamMembership", "role"), "ADMIN"),
        ]),
    )
    .with_description("Team admins can view, edit and share team documents")
    .with_permissions([CAN_VIEW, CAN_EDIT, CAN_SHARE])
    .with_required_data(["user", "document", "project", "teamMembership"])
}

/// Private projects are closed to anyone who is neither a project member nor
/// a team admin.
pub fn private_project_deny() -> Policy {
    Policy::deny(
        "private_project_deny",
        Expression::and([
            Expression::eq(field("project", "visibility"), "PRIVATE"),
            Expression::eq(field("project", "id"), field("document", "projectId")),
            Expression::negate(Expression::or([is_project_member(), is_team_admin()])),
        ]),
    )
    .with_description("Outsiders have no access to private projects")
    .with_permissions(all_permissions())
    .with_required_data([
        "user",
        "document",
        "project",
        "teamMembership",
        "projectMembership",
    ])
}

pub fn free_plan_share_deny() -> Policy {
    Policy::deny(
        "free_plan_share_deny",
        Expression::and([
            Expression::eq(field("project", "id"), field("document", "projectId")),
            Expression::eq(field("team", "id"), field("project", "teamId")),
            Expression::eq(field("team", "plan"), "FREE"),
        ]),
    )
    .with_description("Teams on the free plan cannot share documents")
    .with_permission(CAN_SHARE)
    .with_required_data(["document", "project", "team"])
}

pub fn public_link_allow() -> Policy {
    Policy::allow(
        "public_link_allow",
        Expression::eq(field("document", "publicLinkEnabled"), true),
    )
    .with_description("Anyone holding a public link can view")
    .with_permission(CAN_VIEW)
    .with_required_data(["document"])
}

/// All seven standard policies, deny rules first.
pub fn standard_policies() -> Vec<Policy> {
    vec![
        deleted_document_deny(),
        private_project_deny(),
        free_plan_share_deny(),
        document_creator_allow(),
        project_editor_allow(),
        team_admin_allow(),
        public_link_allow(),
    ]
}
