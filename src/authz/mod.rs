//! Authorization module.
//!
//! Role-based access control with a reserved super-admin role. Every
//! permission decision in the service flows through [`resolver::AccessProfile`]
//! so UI-level and server-level enforcement cannot drift; the request guard in
//! [`guard`] is the only place boolean results become HTTP statuses.

mod guard;
mod resolver;

pub use guard::{client_ip, ip_blocklist, load_snapshot, Access};
pub use resolver::{AccessProfile, AccessSnapshot, RoleGrant};

/// Reserved role slug that resolves to the full permission universe
/// regardless of its stored permission set.
pub const SUPER_ADMIN_SLUG: &str = "super-admin";

/// Well-known permission slugs, matching the seeded registry.
pub mod permissions {
    // Leads
    pub const VIEW_LEADS: &str = "view-leads";
    pub const EDIT_LEADS: &str = "edit-leads";
    pub const DELETE_LEADS: &str = "delete-leads";

    // Users
    pub const VIEW_USERS: &str = "view-users";
    pub const MANAGE_USERS: &str = "manage-users";

    // Access control
    pub const VIEW_ROLES: &str = "view-roles";
    pub const MANAGE_ROLES: &str = "manage-roles";
    pub const VIEW_PERMISSIONS: &str = "view-permissions";
    pub const MANAGE_PERMISSIONS: &str = "manage-permissions";

    // Content
    pub const VIEW_CONTENT: &str = "view-content";
    pub const MANAGE_CONTENT: &str = "manage-content";

    // Settings
    pub const MANAGE_SETTINGS: &str = "manage-settings";

    // Analytics
    pub const VIEW_ANALYTICS: &str = "view-analytics";
    pub const VIEW_ACTIVITY: &str = "view-activity";
}
