use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, RosterError, RosterResult};

/// Identifier of a staff record. Assigned once at creation as a time-ordered UUID.
pub type StaffId = Uuid;

/// A persisted staff record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct StaffRecord {
    #[cfg_attr(feature = "utoipa", schema(value_type = Uuid))]
    pub id: StaffId,
    pub name: String,
    pub age: i32,
    pub position: String,
    pub salary: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StaffRecord {
    /// Overwrites the fields present in `fields`, leaving the others untouched.
    pub fn apply_patch(&mut self, fields: StaffFields, now: DateTime<Utc>) {
        if let Some(name) = fields.name {
            self.name = name;
        }
        if let Some(age) = fields.age {
            self.age = age;
        }
        if let Some(position) = fields.position {
            self.position = position;
        }
        if let Some(salary) = fields.salary {
            self.salary = salary;
        }
        self.updated_at = now;
    }
}

/// Partial staff payload carried by insert and update commands.
///
/// Every field is optional. Inserts need all of them, see [`NewStaff`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct StaffFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
}

impl StaffFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.position.is_none() && self.salary.is_none()
    }
}

/// A complete set of fields for creating a staff record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStaff {
    pub name: String,
    pub age: i32,
    pub position: String,
    pub salary: f64,
}

impl TryFrom<StaffFields> for NewStaff {
    type Error = RosterError;

    fn try_from(fields: StaffFields) -> RosterResult<Self> {
        let mut missing = Vec::new();
        if fields.name.is_none() {
            missing.push("name");
        }
        if fields.age.is_none() {
            missing.push("age");
        }
        if fields.position.is_none() {
            missing.push("position");
        }
        if !fields.salary.is_some_and(f64::is_finite) {
            missing.push("salary");
        }

        match fields {
            StaffFields {
                name: Some(name),
                age: Some(age),
                position: Some(position),
                salary: Some(salary),
            } if missing.is_empty() => Ok(NewStaff {
                name,
                age,
                position,
                salary,
            }),
            _ => bail!(
                ErrorKind::InvalidData,
                "Staff record is missing required fields",
                missing.join(", ")
            ),
        }
    }
}

/// Column a staff listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum StaffSortField {
    Name,
    Age,
    Position,
    Salary,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl StaffSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffSortField::Name => "name",
            StaffSortField::Age => "age",
            StaffSortField::Position => "position",
            StaffSortField::Salary => "salary",
            StaffSortField::CreatedAt => "created_at",
            StaffSortField::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for StaffSortField {
    type Err = RosterError;

    fn from_str(value: &str) -> RosterResult<Self> {
        match value {
            "name" => Ok(StaffSortField::Name),
            "age" => Ok(StaffSortField::Age),
            "position" => Ok(StaffSortField::Position),
            "salary" => Ok(StaffSortField::Salary),
            "created_at" => Ok(StaffSortField::CreatedAt),
            "updated_at" => Ok(StaffSortField::UpdatedAt),
            other => bail!(ErrorKind::InvalidData, "Unknown sort field", other),
        }
    }
}

impl fmt::Display for StaffSortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = RosterError;

    fn from_str(value: &str) -> RosterResult<Self> {
        match value {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => bail!(ErrorKind::InvalidData, "Unknown sort order", other),
        }
    }
}

/// Records matched by a listing or count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffFilter {
    /// Case-insensitive substring of the name or the position.
    pub search: Option<String>,
}

impl StaffFilter {
    pub fn matches(&self, record: &StaffRecord) -> bool {
        let Some(search) = self.search.as_deref() else {
            return true;
        };

        let search = search.to_lowercase();
        record.name.to_lowercase().contains(&search)
            || record.position.to_lowercase().contains(&search)
    }
}

/// A page of a filtered, sorted staff listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffQuery {
    pub filter: StaffFilter,
    pub skip: u64,
    pub limit: u64,
    pub sort: StaffSortField,
    pub order: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StaffRecord {
        let now = Utc::now();
        StaffRecord {
            id: Uuid::now_v7(),
            name: "Ada".to_string(),
            age: 36,
            position: "Engineer".to_string(),
            salary: 4_000_000.0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut staff = record();
        let before = staff.clone();

        staff.apply_patch(
            StaffFields {
                salary: Some(5_000_000.0),
                ..StaffFields::default()
            },
            Utc::now(),
        );

        assert_eq!(staff.salary, 5_000_000.0);
        assert_eq!(staff.name, before.name);
        assert_eq!(staff.age, before.age);
        assert_eq!(staff.position, before.position);
        assert_eq!(staff.created_at, before.created_at);
    }

    #[test]
    fn incomplete_fields_name_what_is_missing() {
        let fields = StaffFields {
            name: Some("Ada".to_string()),
            salary: Some(f64::NAN),
            ..StaffFields::default()
        };

        let err = NewStaff::try_from(fields).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.detail(), Some("age, position, salary"));
    }

    #[test]
    fn search_is_case_insensitive_on_name_and_position() {
        let staff = record();

        let by_position = StaffFilter {
            search: Some("engin".to_string()),
        };
        let by_name = StaffFilter {
            search: Some("ADA".to_string()),
        };
        let miss = StaffFilter {
            search: Some("manager".to_string()),
        };

        assert!(by_position.matches(&staff));
        assert!(by_name.matches(&staff));
        assert!(!miss.matches(&staff));
    }
}
