use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::schema::users;

/// Account kind discriminator. An admin is an admin-flagged employee, so
/// `Employee` and `Admin` share the employee payload columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Employee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }

    /// Employees and admins share the staff-only endpoints.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Employee | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "employee" => Ok(Role::Employee),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Single-table user row. Role-specific columns are nullable; which ones are
/// populated depends on `role` (clients carry points and the open-order
/// pointer, staff carry start date, salary and manager).
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub points: Option<i32>,
    pub current_order_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub salary: Option<BigDecimal>,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn parsed_role(&self) -> Result<Role, String> {
        self.role.parse()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub points: Option<i32>,
    pub start_date: Option<NaiveDate>,
}

impl NewUserRow {
    pub fn client(email: String, display_name: String, phone: Option<String>, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            phone,
            password_hash,
            role: Role::Client.as_str().to_string(),
            points: Some(0),
            start_date: None,
        }
    }

    pub fn staff(
        role: Role,
        email: String,
        display_name: String,
        phone: Option<String>,
        password_hash: String,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            phone,
            password_hash,
            role: role.as_str().to_string(),
            points: None,
            start_date: Some(start_date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Client, Role::Employee, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("manager".parse::<Role>().is_err());
    }

    #[test]
    fn staff_covers_employee_and_admin() {
        assert!(!Role::Client.is_staff());
        assert!(Role::Employee.is_staff());
        assert!(Role::Admin.is_staff());
    }

    #[test]
    fn new_client_starts_with_zero_points() {
        let row = NewUserRow::client(
            "a@b.com".into(),
            "A".into(),
            None,
            "hash".into(),
        );
        assert_eq!(row.points, Some(0));
        assert_eq!(row.role, "client");
        assert!(row.start_date.is_none());
    }
}
