use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

const STAFF_COLUMNS: &str = "id, name, age, position, salary, created_at, updated_at";

/// A row of `roster.staff`.
#[derive(Debug, Clone)]
pub struct StaffRow {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub position: String,
    pub salary: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PgRow> for StaffRow {
    type Error = sqlx::Error;

    fn try_from(row: PgRow) -> Result<Self, Self::Error> {
        Ok(StaffRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            age: row.try_get("age")?,
            position: row.try_get("position")?,
            salary: row.try_get("salary")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Column values for a new staff row.
#[derive(Debug, Clone, Copy)]
pub struct NewStaff<'a> {
    pub name: &'a str,
    pub age: i32,
    pub position: &'a str,
    pub salary: f64,
}

/// Columns to overwrite on an existing row. `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaffPatch<'a> {
    pub name: Option<&'a str>,
    pub age: Option<i32>,
    pub position: Option<&'a str>,
    pub salary: Option<f64>,
}

/// Sortable columns of `roster.staff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    Age,
    Position,
    Salary,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::Age => "age",
            SortColumn::Position => "position",
            SortColumn::Salary => "salary",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
        }
    }
}

/// Filtering, ordering and paging of a staff listing.
#[derive(Debug, Clone, Copy)]
pub struct StaffListing<'a> {
    /// Case-insensitive substring matched against name and position.
    pub search: Option<&'a str>,
    pub sort: SortColumn,
    pub descending: bool,
    pub offset: i64,
    pub limit: i64,
}

pub async fn insert_staff<'c, E>(
    executor: E,
    id: Uuid,
    staff: NewStaff<'_>,
) -> Result<StaffRow, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(&format!(
        r#"
        insert into roster.staff (id, name, age, position, salary)
        values ($1, $2, $3, $4, $5)
        returning {STAFF_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(staff.name)
    .bind(staff.age)
    .bind(staff.position)
    .bind(staff.salary)
    .fetch_one(executor)
    .await?;

    StaffRow::try_from(row)
}

/// Overwrites the columns present in `patch` and bumps `updated_at`.
///
/// Returns `None` when no row has the given id.
pub async fn update_staff<'c, E>(
    executor: E,
    id: Uuid,
    patch: StaffPatch<'_>,
) -> Result<Option<StaffRow>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(&format!(
        r#"
        update roster.staff
        set name = coalesce($2, name),
            age = coalesce($3, age),
            position = coalesce($4, position),
            salary = coalesce($5, salary),
            updated_at = now()
        where id = $1
        returning {STAFF_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(patch.name)
    .bind(patch.age)
    .bind(patch.position)
    .bind(patch.salary)
    .fetch_optional(executor)
    .await?;

    row.map(StaffRow::try_from).transpose()
}

/// Deletes a row, returning whether it existed.
pub async fn delete_staff<'c, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let result = sqlx::query("delete from roster.staff where id = $1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn find_staff<'c, E>(
    executor: E,
    listing: StaffListing<'_>,
) -> Result<Vec<StaffRow>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let direction = if listing.descending { "desc" } else { "asc" };
    let rows = sqlx::query(&format!(
        r#"
        select {STAFF_COLUMNS}
        from roster.staff
        where $1::text is null or name ilike $1 or position ilike $1
        order by {column} {direction}, id {direction}
        offset $2
        limit $3
        "#,
        column = listing.sort.as_sql(),
    ))
    .bind(listing.search.map(like_pattern))
    .bind(listing.offset)
    .bind(listing.limit)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(StaffRow::try_from).collect()
}

pub async fn count_staff<'c, E>(executor: E, search: Option<&str>) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let row = sqlx::query(
        r#"
        select count(*) as total
        from roster.staff
        where $1::text is null or name ilike $1 or position ilike $1
        "#,
    )
    .bind(search.map(like_pattern))
    .fetch_one(executor)
    .await?;

    row.try_get("total")
}

/// Wraps a search term for `ilike`, escaping its wildcard characters.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("eng"), "%eng%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
