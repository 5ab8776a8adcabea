use std::collections::HashSet;

use uuid::Uuid;

use super::SUPER_ADMIN_SLUG;

/// One assigned role with its permission slugs, as loaded for a request.
#[derive(Debug, Clone)]
pub struct RoleGrant {
    pub slug: String,
    pub permissions: Vec<String>,
}

/// Everything the resolver needs about one user, captured at request time.
/// `registry` is the full permission universe so a super-admin's effective
/// set includes slugs created after their roles were assigned.
#[derive(Debug, Clone)]
pub struct AccessSnapshot {
    pub user_id: Uuid,
    pub is_admin_flag: bool,
    pub roles: Vec<RoleGrant>,
    pub registry: Vec<String>,
}

/// Resolved effective permissions for one request. Pure data; checks never
/// error. The guard layer translates boolean outcomes into 401/403.
#[derive(Debug, Clone)]
pub struct AccessProfile {
    pub user_id: Option<Uuid>,
    pub is_super_admin: bool,
    pub is_admin: bool,
    role_slugs: HashSet<String>,
    permissions: HashSet<String>,
}

impl AccessProfile {
    /// Resolve the effective permission set for an (optionally absent) user.
    ///
    /// The explicit `is_admin` flag and membership in the super-admin role
    /// are OR-ed; either alone confers the bypass.
    pub fn resolve(snapshot: Option<&AccessSnapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self {
                user_id: None,
                is_super_admin: false,
                is_admin: false,
                role_slugs: HashSet::new(),
                permissions: HashSet::new(),
            };
        };

        let role_slugs: HashSet<String> =
            snapshot.roles.iter().map(|role| role.slug.clone()).collect();

        let is_super_admin = snapshot.is_admin_flag || role_slugs.contains(SUPER_ADMIN_SLUG);

        let permissions: HashSet<String> = if is_super_admin {
            snapshot.registry.iter().cloned().collect()
        } else {
            snapshot
                .roles
                .iter()
                .flat_map(|role| role.permissions.iter().cloned())
                .collect()
        };

        Self {
            user_id: Some(snapshot.user_id),
            is_super_admin,
            is_admin: is_super_admin,
            role_slugs,
            permissions,
        }
    }

    pub fn anonymous() -> Self {
        Self::resolve(None)
    }

    pub fn has_permission(&self, slug: &str) -> bool {
        self.is_super_admin || self.permissions.contains(slug)
    }

    /// True iff super-admin or at least one slug matches. Empty input is
    /// vacuously false.
    pub fn has_any_permission<S: AsRef<str>>(&self, slugs: &[S]) -> bool {
        if slugs.is_empty() {
            return false;
        }
        self.is_super_admin || slugs.iter().any(|slug| self.permissions.contains(slug.as_ref()))
    }

    /// True iff super-admin or every slug matches. Empty input is vacuously
    /// true.
    pub fn has_all_permissions<S: AsRef<str>>(&self, slugs: &[S]) -> bool {
        self.is_super_admin || slugs.iter().all(|slug| self.permissions.contains(slug.as_ref()))
    }

    pub fn has_role<S: AsRef<str>>(&self, slugs: &[S]) -> bool {
        slugs.iter().any(|slug| self.role_slugs.contains(slug.as_ref()))
    }

    pub fn role_slug_list(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.role_slugs.iter().cloned().collect();
        slugs.sort();
        slugs
    }

    pub fn permission_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.permissions.iter().cloned().collect();
        slugs.sort();
        slugs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<String> {
        ["view-leads", "edit-leads", "delete-leads", "manage-roles"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn editor_snapshot() -> AccessSnapshot {
        AccessSnapshot {
            user_id: Uuid::new_v4(),
            is_admin_flag: false,
            roles: vec![RoleGrant {
                slug: "editor".to_string(),
                permissions: vec!["view-leads".to_string(), "edit-leads".to_string()],
            }],
            registry: registry(),
        }
    }

    #[test]
    fn absent_user_resolves_to_empty() {
        let profile = AccessProfile::anonymous();
        assert!(!profile.is_super_admin);
        assert!(!profile.is_admin);
        assert!(!profile.has_permission("view-leads"));
    }

    #[test]
    fn editor_union_of_role_permissions() {
        let profile = AccessProfile::resolve(Some(&editor_snapshot()));
        assert!(profile.has_permission("view-leads"));
        assert!(!profile.has_permission("delete-leads"));
        assert!(profile.has_role(&["editor"]));
        assert!(!profile.has_role(&["manager"]));
    }

    #[test]
    fn super_admin_role_grants_entire_registry() {
        let snapshot = AccessSnapshot {
            user_id: Uuid::new_v4(),
            is_admin_flag: false,
            roles: vec![RoleGrant {
                slug: "super-admin".to_string(),
                // Stored permission set is empty; the slug alone is enough.
                permissions: vec![],
            }],
            registry: registry(),
        };

        let profile = AccessProfile::resolve(Some(&snapshot));
        assert!(profile.is_super_admin);
        for slug in registry() {
            assert!(profile.has_permission(&slug));
        }
    }

    #[test]
    fn admin_flag_alone_grants_bypass() {
        let snapshot = AccessSnapshot {
            user_id: Uuid::new_v4(),
            is_admin_flag: true,
            roles: vec![],
            registry: registry(),
        };

        let profile = AccessProfile::resolve(Some(&snapshot));
        assert!(profile.is_super_admin);
        assert!(profile.has_permission("manage-roles"));
    }

    #[test]
    fn vacuous_truth_rules() {
        let profile = AccessProfile::resolve(Some(&editor_snapshot()));
        let none: [&str; 0] = [];
        assert!(profile.has_all_permissions(&none));
        assert!(!profile.has_any_permission(&none));

        // Same holds for anonymous users.
        let anon = AccessProfile::anonymous();
        assert!(anon.has_all_permissions(&none));
        assert!(!anon.has_any_permission(&none));
    }

    #[test]
    fn any_and_all_checks() {
        let profile = AccessProfile::resolve(Some(&editor_snapshot()));
        assert!(profile.has_any_permission(&["delete-leads", "view-leads"]));
        assert!(!profile.has_any_permission(&["delete-leads", "manage-roles"]));
        assert!(profile.has_all_permissions(&["view-leads", "edit-leads"]));
        assert!(!profile.has_all_permissions(&["view-leads", "delete-leads"]));
    }
}
