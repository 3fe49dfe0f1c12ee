// src/db/models/user.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Application roles. Legacy values (`admin`, `hr_head`, `department_head`)
/// still exist in old rows; they do not parse and resolve to no elevated
/// capabilities.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "app_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    ManagingDirector,
    HrOffice,
    ClubHouseManager,
    Employee,
    ThirdParty,
}

/// All roles, in seniority-display order. Kept in sync with the `app_role`
/// Postgres enum.
pub const ALL_ROLES: [Role; 6] = [
    Role::Superadmin,
    Role::ManagingDirector,
    Role::HrOffice,
    Role::ClubHouseManager,
    Role::Employee,
    Role::ThirdParty,
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::ManagingDirector => "managing_director",
            Role::HrOffice => "hr_office",
            Role::ClubHouseManager => "club_house_manager",
            Role::Employee => "employee",
            Role::ThirdParty => "third_party",
        }
    }

    /// Roles that carry administrative capabilities. Assigning one of these
    /// requires the approve-admins capability.
    pub fn is_admin_tier(&self) -> bool {
        matches!(
            self,
            Role::Superadmin | Role::ManagingDirector | Role::HrOffice | Role::ClubHouseManager
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superadmin" => Ok(Role::Superadmin),
            "managing_director" => Ok(Role::ManagingDirector),
            "hr_office" => Ok(Role::HrOffice),
            "club_house_manager" => Ok(Role::ClubHouseManager),
            "employee" => Ok(Role::Employee),
            "third_party" => Ok(Role::ThirdParty),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub account_locked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub employee_id: Option<String>,
    pub is_third_party: bool,
    pub account_approved: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Profile joined with the user's current role set.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileWithRoles {
    #[serde(flatten)]
    pub profile: Profile,
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfile {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub role: Role,
}
