// src/middleware/permissions.rs
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::user::Role;

/// Fixed capability set for a role. Checked server-side in handlers; any
/// client-side use of the same table is advisory only.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
pub struct RolePermissions {
    pub can_approve_users: bool,
    pub can_approve_admins: bool,
    pub can_approve_third_party: bool,
    pub can_approve_guest_rooms: bool,
    pub can_final_approve_guest_rooms: bool,
    pub can_approve_facilities: bool,
    pub can_final_approve_facilities: bool,
    pub can_update_menu: bool,
    pub can_manage_accommodations: bool,
    pub can_manage_facilities: bool,
    pub can_download_reports: bool,
    pub can_manage_room_availability: bool,
    pub has_unlimited_access: bool,
    /// Informal seniority ranking (0-3), displayed in admin views. Not a
    /// gate by itself.
    pub approval_level: u8,
}

impl RolePermissions {
    /// No elevated capabilities. The safe default for unrecognized or
    /// legacy role values.
    pub const NONE: RolePermissions = RolePermissions {
        can_approve_users: false,
        can_approve_admins: false,
        can_approve_third_party: false,
        can_approve_guest_rooms: false,
        can_final_approve_guest_rooms: false,
        can_approve_facilities: false,
        can_final_approve_facilities: false,
        can_update_menu: false,
        can_manage_accommodations: false,
        can_manage_facilities: false,
        can_download_reports: false,
        can_manage_room_availability: false,
        has_unlimited_access: false,
        approval_level: 0,
    };

    /// Capability union of two permission sets; approval_level takes the max.
    pub fn union(self, other: RolePermissions) -> RolePermissions {
        RolePermissions {
            can_approve_users: self.can_approve_users || other.can_approve_users,
            can_approve_admins: self.can_approve_admins || other.can_approve_admins,
            can_approve_third_party: self.can_approve_third_party || other.can_approve_third_party,
            can_approve_guest_rooms: self.can_approve_guest_rooms || other.can_approve_guest_rooms,
            can_final_approve_guest_rooms: self.can_final_approve_guest_rooms
                || other.can_final_approve_guest_rooms,
            can_approve_facilities: self.can_approve_facilities || other.can_approve_facilities,
            can_final_approve_facilities: self.can_final_approve_facilities
                || other.can_final_approve_facilities,
            can_update_menu: self.can_update_menu || other.can_update_menu,
            can_manage_accommodations: self.can_manage_accommodations
                || other.can_manage_accommodations,
            can_manage_facilities: self.can_manage_facilities || other.can_manage_facilities,
            can_download_reports: self.can_download_reports || other.can_download_reports,
            can_manage_room_availability: self.can_manage_room_availability
                || other.can_manage_room_availability,
            has_unlimited_access: self.has_unlimited_access || other.has_unlimited_access,
            approval_level: self.approval_level.max(other.approval_level),
        }
    }
}

/// Static role → capability table. Total over the `Role` enum.
pub fn role_permissions(role: Role) -> RolePermissions {
    match role {
        Role::Superadmin => RolePermissions {
            can_approve_users: true,
            can_approve_admins: true,
            can_approve_third_party: true,
            ..RolePermissions::NONE
        },
        Role::ManagingDirector => RolePermissions {
            can_approve_guest_rooms: true,
            can_final_approve_guest_rooms: true,
            can_approve_facilities: true,
            can_final_approve_facilities: true,
            can_download_reports: true,
            has_unlimited_access: true,
            approval_level: 3,
            ..RolePermissions::NONE
        },
        Role::HrOffice => RolePermissions {
            can_approve_users: true,
            can_approve_guest_rooms: true,
            can_manage_accommodations: true,
            can_download_reports: true,
            approval_level: 1,
            ..RolePermissions::NONE
        },
        Role::ClubHouseManager => RolePermissions {
            can_approve_users: true,
            can_approve_guest_rooms: true,
            can_update_menu: true,
            can_manage_accommodations: true,
            can_manage_facilities: true,
            can_manage_room_availability: true,
            approval_level: 2,
            ..RolePermissions::NONE
        },
        Role::Employee | Role::ThirdParty => RolePermissions::NONE,
    }
}

/// Resolve a raw role string from storage. Legacy or unknown values are
/// logged and resolve to no elevated capabilities.
pub fn permissions_for_str(raw: &str) -> RolePermissions {
    match Role::from_str(raw) {
        Ok(role) => role_permissions(role),
        Err(()) => {
            warn!(role = raw, "unrecognized role value, granting no capabilities");
            RolePermissions::NONE
        }
    }
}

/// The authenticated user's resolved permission set, attached to requests
/// by the RBAC middleware. Capabilities are the union over every role the
/// user holds, never just the first-assigned one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserPermissions {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
    pub capabilities: RolePermissions,
}

impl UserPermissions {
    /// Resolve from raw role strings as stored. Legacy or unknown values
    /// contribute no capabilities and are dropped from the role list.
    pub fn from_raw_roles(user_id: Uuid, raw: Vec<String>) -> Self {
        let capabilities = raw
            .iter()
            .fold(RolePermissions::NONE, |acc, r| acc.union(permissions_for_str(r)));
        let roles = raw.iter().filter_map(|r| Role::from_str(r).ok()).collect();
        Self {
            user_id,
            roles,
            capabilities,
        }
    }

    pub fn has_unlimited_access(&self) -> bool {
        self.capabilities.has_unlimited_access
    }

    pub fn can_approve_users(&self) -> bool {
        self.capabilities.can_approve_users || self.has_unlimited_access()
    }

    pub fn can_approve_admins(&self) -> bool {
        self.capabilities.can_approve_admins || self.has_unlimited_access()
    }

    pub fn can_approve_third_party(&self) -> bool {
        self.capabilities.can_approve_third_party || self.has_unlimited_access()
    }

    pub fn can_approve_guest_rooms(&self) -> bool {
        self.capabilities.can_approve_guest_rooms || self.has_unlimited_access()
    }

    pub fn can_approve_facilities(&self) -> bool {
        self.capabilities.can_approve_facilities || self.has_unlimited_access()
    }

    pub fn can_update_menu(&self) -> bool {
        self.capabilities.can_update_menu || self.has_unlimited_access()
    }

    pub fn can_manage_accommodations(&self) -> bool {
        self.capabilities.can_manage_accommodations || self.has_unlimited_access()
    }

    pub fn can_manage_facilities(&self) -> bool {
        self.capabilities.can_manage_facilities || self.has_unlimited_access()
    }

    pub fn can_manage_room_availability(&self) -> bool {
        self.capabilities.can_manage_room_availability || self.has_unlimited_access()
    }

    /// Whether the user may assign the given role to someone else.
    pub fn can_assign_role(&self, role: Role) -> bool {
        if self.has_unlimited_access() {
            return true;
        }
        match role {
            r if r.is_admin_tier() => self.capabilities.can_approve_admins,
            Role::ThirdParty => self.capabilities.can_approve_third_party,
            _ => self.capabilities.can_approve_users,
        }
    }

    /// Whether the user can see the admin navigation at all. Advisory; the
    /// per-endpoint checks remain authoritative.
    pub fn can_access_admin_panel(&self) -> bool {
        self.roles.iter().any(|r| r.is_admin_tier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::user::ALL_ROLES;

    fn perms_for(roles: &[Role]) -> UserPermissions {
        let raw = roles.iter().map(|r| r.as_str().to_string()).collect();
        UserPermissions::from_raw_roles(Uuid::new_v4(), raw)
    }

    #[test]
    fn table_is_total_and_deterministic() {
        for role in ALL_ROLES {
            let a = role_permissions(role);
            let b = role_permissions(role);
            assert_eq!(a, b, "lookup for {role} must be deterministic");
            assert!(a.approval_level <= 3);
        }
    }

    #[test]
    fn unknown_and_legacy_roles_get_no_capabilities() {
        for raw in ["admin", "hr_head", "department_head", "intern", ""] {
            assert_eq!(permissions_for_str(raw), RolePermissions::NONE);
        }
    }

    #[test]
    fn employee_and_third_party_have_no_elevated_capabilities() {
        assert_eq!(role_permissions(Role::Employee), RolePermissions::NONE);
        assert_eq!(role_permissions(Role::ThirdParty), RolePermissions::NONE);
    }

    #[test]
    fn managing_director_passes_every_gate_via_unlimited_access() {
        let perms = perms_for(&[Role::ManagingDirector]);
        assert!(perms.can_approve_guest_rooms());
        assert!(perms.can_approve_facilities());
        assert!(perms.can_update_menu());
        assert!(perms.can_approve_users());
        assert!(perms.can_assign_role(Role::Superadmin));
    }

    #[test]
    fn capabilities_are_a_union_over_all_held_roles() {
        let perms = perms_for(&[Role::HrOffice, Role::ClubHouseManager]);
        // From hr_office
        assert!(perms.capabilities.can_download_reports);
        // From club_house_manager
        assert!(perms.capabilities.can_update_menu);
        assert!(perms.capabilities.can_manage_facilities);
        // Level takes the max of the two
        assert_eq!(perms.capabilities.approval_level, 2);
        // Neither role grants final approval
        assert!(!perms.capabilities.can_final_approve_guest_rooms);
    }

    #[test]
    fn raw_role_resolution_skips_legacy_values() {
        let perms = UserPermissions::from_raw_roles(
            Uuid::new_v4(),
            vec!["hr_office".into(), "department_head".into()],
        );
        assert_eq!(perms.roles, vec![Role::HrOffice]);
        assert!(perms.capabilities.can_approve_users);
        assert!(!perms.capabilities.can_update_menu);
    }

    #[test]
    fn empty_role_set_grants_nothing() {
        let perms = perms_for(&[]);
        assert_eq!(perms.capabilities, RolePermissions::NONE);
        assert!(!perms.can_approve_users());
        assert!(!perms.can_access_admin_panel());
    }

    #[test]
    fn role_assignment_gates_by_target_tier() {
        let hr = perms_for(&[Role::HrOffice]);
        assert!(hr.can_assign_role(Role::Employee));
        assert!(!hr.can_assign_role(Role::ClubHouseManager));
        assert!(!hr.can_assign_role(Role::ThirdParty));

        let superadmin = perms_for(&[Role::Superadmin]);
        assert!(superadmin.can_assign_role(Role::ManagingDirector));
        assert!(superadmin.can_assign_role(Role::ThirdParty));
        assert!(superadmin.can_assign_role(Role::Employee));
    }

    #[test]
    fn admin_panel_access_matches_admin_tier_roles() {
        for role in ALL_ROLES {
            let perms = perms_for(&[role]);
            assert_eq!(perms.can_access_admin_panel(), role.is_admin_tier());
        }
    }
}
