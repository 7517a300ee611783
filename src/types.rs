//! Core domain types read by the permission resolver
//!
//! All of these entities are owned by the relational store; the engine only
//! reads them. Grant holders are modeled as tagged unions rather than the
//! three-nullable-columns row shape, so a grant with a mismatched holder
//! type / reference combination cannot be represented at all.

use serde::{Deserialize, Serialize};

/// Unique permission scheme identifier
pub type SchemeId = String;

/// Unique organization (tenant) identifier
pub type OrgId = String;

/// Permission key (e.g. "BROWSE_PROJECTS", "DELETE_ISSUES")
pub type PermissionKey = String;

/// Well-known permission keys
///
/// The tracker defines a fixed vocabulary of actions; grants reference these
/// by string key so new keys can ship without a store migration.
pub mod keys {
    /// Global: full organization administration, overrides project ACLs
    pub const ADMINISTER: &str = "ADMINISTER";
    /// Global: create new projects
    pub const CREATE_PROJECTS: &str = "CREATE_PROJECTS";
    /// Global: manage groups and group membership
    pub const MANAGE_GROUPS: &str = "MANAGE_GROUPS";

    /// Project: view the project and its issues
    pub const BROWSE_PROJECTS: &str = "BROWSE_PROJECTS";
    /// Project: administer project settings
    pub const ADMINISTER_PROJECTS: &str = "ADMINISTER_PROJECTS";
    /// Project: create issues
    pub const CREATE_ISSUES: &str = "CREATE_ISSUES";
    /// Project: edit any issue
    pub const EDIT_ISSUES: &str = "EDIT_ISSUES";
    /// Project: delete issues
    pub const DELETE_ISSUES: &str = "DELETE_ISSUES";
    /// Project: assign issues to users
    pub const ASSIGN_ISSUES: &str = "ASSIGN_ISSUES";
    /// Project: transition issues through the workflow
    pub const TRANSITION_ISSUES: &str = "TRANSITION_ISSUES";
    /// Project: manage sprints and boards
    pub const MANAGE_SPRINTS: &str = "MANAGE_SPRINTS";
    /// Project: log work on issues
    pub const WORK_ON_ISSUES: &str = "WORK_ON_ISSUES";
}

/// A named, inheritable bundle of permission grants assignable to projects
///
/// `parent_id` forms a scheme-inheritance chain. The store does not prevent
/// cycles or unbounded depth; the resolver's chain walk is responsible for
/// staying bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionScheme {
    pub id: SchemeId,
    pub organization_id: OrgId,
    /// Applies to projects with no scheme assigned
    #[serde(default)]
    pub is_default: bool,
    /// Parent scheme whose grants are inherited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SchemeId>,
}

/// Principal category a project-scheme grant applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "holderType", rename_all = "camelCase")]
pub enum GrantHolder {
    /// Every user, including users with no role or group in the project
    Anyone,
    /// Users holding the given role in the project being checked
    #[serde(rename_all = "camelCase")]
    ProjectRole { project_role_id: String },
    /// Members of the given group
    #[serde(rename_all = "camelCase")]
    Group { group_id: String },
    /// A single user
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
}

impl GrantHolder {
    /// Check whether this holder matches the caller's attributes
    ///
    /// `project_role_id` is the caller's role in the project under check (if
    /// any) and `group_ids` their group memberships in the organization.
    pub fn matches(
        &self,
        user_id: &str,
        project_role_id: Option<&str>,
        group_ids: &[String],
    ) -> bool {
        match self {
            GrantHolder::Anyone => true,
            GrantHolder::ProjectRole { project_role_id: granted } => {
                project_role_id == Some(granted.as_str())
            }
            GrantHolder::Group { group_id } => group_ids.iter().any(|g| g == group_id),
            GrantHolder::User { user_id: granted } => granted == user_id,
        }
    }
}

/// A single (permission key, holder) tuple attached to a scheme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub id: String,
    pub permission_scheme_id: SchemeId,
    pub permission_key: PermissionKey,
    #[serde(flatten)]
    pub holder: GrantHolder,
}

/// Principal category an organization-level grant applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "holderType", rename_all = "camelCase")]
pub enum GlobalHolder {
    #[serde(rename_all = "camelCase")]
    Group { group_id: String },
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
}

impl GlobalHolder {
    /// Check whether this holder matches the caller's attributes
    pub fn matches(&self, user_id: &str, group_ids: &[String]) -> bool {
        match self {
            GlobalHolder::Group { group_id } => group_ids.iter().any(|g| g == group_id),
            GlobalHolder::User { user_id: granted } => granted == user_id,
        }
    }
}

/// Organization-scoped grant of a global permission key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPermission {
    pub id: String,
    pub organization_id: OrgId,
    pub permission_key: PermissionKey,
    #[serde(flatten)]
    pub holder: GlobalHolder,
}

/// Project record, reduced to the fields the resolver reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub organization_id: OrgId,
    /// When absent, the organization's default scheme applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_scheme_id: Option<SchemeId>,
}

/// A user's role within one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    pub project_id: String,
    pub user_id: String,
    pub project_role_id: String,
}

/// Issue record, reduced to the fields the visibility check reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub project_id: String,
    pub organization_id: OrgId,
    /// When absent, the issue carries no visibility restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

/// Principal category a security-level member row applies to
///
/// Reporter and Assignee are resolved against the issue under check, not
/// against stored references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "holderType", rename_all = "camelCase")]
pub enum SecurityHolder {
    #[serde(rename_all = "camelCase")]
    ProjectRole { project_role_id: String },
    #[serde(rename_all = "camelCase")]
    Group { group_id: String },
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
    Reporter,
    Assignee,
}

/// Membership row of an issue security level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSecurityLevelMember {
    pub issue_security_level_id: String,
    #[serde(flatten)]
    pub holder: SecurityHolder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_holder_anyone_always_matches() {
        let holder = GrantHolder::Anyone;
        assert!(holder.matches("user-1", None, &[]));
        assert!(holder.matches("user-2", Some("role-1"), &["group-1".to_string()]));
    }

    #[test]
    fn test_grant_holder_role_matching() {
        let holder = GrantHolder::ProjectRole {
            project_role_id: "role-dev".to_string(),
        };
        assert!(holder.matches("user-1", Some("role-dev"), &[]));
        assert!(!holder.matches("user-1", Some("role-qa"), &[]));
        assert!(!holder.matches("user-1", None, &[]));
    }

    #[test]
    fn test_grant_holder_group_matching() {
        let holder = GrantHolder::Group {
            group_id: "group-eng".to_string(),
        };
        let groups = vec!["group-ops".to_string(), "group-eng".to_string()];
        assert!(holder.matches("user-1", None, &groups));
        assert!(!holder.matches("user-1", None, &["group-ops".to_string()]));
        assert!(!holder.matches("user-1", None, &[]));
    }

    #[test]
    fn test_grant_holder_user_matching() {
        let holder = GrantHolder::User {
            user_id: "user-1".to_string(),
        };
        assert!(holder.matches("user-1", Some("role-dev"), &[]));
        assert!(!holder.matches("user-2", Some("role-dev"), &[]));
    }

    #[test]
    fn test_global_holder_matching() {
        let group = GlobalHolder::Group {
            group_id: "group-admins".to_string(),
        };
        assert!(group.matches("user-1", &["group-admins".to_string()]));
        assert!(!group.matches("user-1", &[]));

        let user = GlobalHolder::User {
            user_id: "user-1".to_string(),
        };
        assert!(user.matches("user-1", &[]));
        assert!(!user.matches("user-2", &[]));
    }

    #[test]
    fn test_grant_serde_tagged_holder() {
        let grant = PermissionGrant {
            id: "grant-1".to_string(),
            permission_scheme_id: "scheme-1".to_string(),
            permission_key: keys::BROWSE_PROJECTS.to_string(),
            holder: GrantHolder::Group {
                group_id: "group-eng".to_string(),
            },
        };

        let value = serde_json::to_value(&grant).unwrap();
        assert_eq!(value["holderType"], "group");
        assert_eq!(value["groupId"], "group-eng");

        let back: PermissionGrant = serde_json::from_value(value).unwrap();
        assert_eq!(back, grant);
    }

    #[test]
    fn test_security_holder_serde_unit_variants() {
        let member = IssueSecurityLevelMember {
            issue_security_level_id: "level-1".to_string(),
            holder: SecurityHolder::Reporter,
        };

        let value = serde_json::to_value(&member).unwrap();
        assert_eq!(value["holderType"], "reporter");

        let back: IssueSecurityLevelMember = serde_json::from_value(value).unwrap();
        assert_eq!(back.holder, SecurityHolder::Reporter);
    }
}
