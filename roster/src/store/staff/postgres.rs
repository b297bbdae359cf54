use async_trait::async_trait;
use roster_postgres::staff::{self as queries, SortColumn, StaffListing, StaffPatch, StaffRow};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ErrorKind, RosterResult};
use crate::roster_error;
use crate::store::staff::StaffStore;
use crate::types::{
    NewStaff, SortOrder, StaffFields, StaffFilter, StaffId, StaffQuery, StaffRecord,
    StaffSortField,
};

impl From<StaffRow> for StaffRecord {
    fn from(row: StaffRow) -> Self {
        StaffRecord {
            id: row.id,
            name: row.name,
            age: row.age,
            position: row.position,
            salary: row.salary,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<StaffSortField> for SortColumn {
    fn from(field: StaffSortField) -> Self {
        match field {
            StaffSortField::Name => SortColumn::Name,
            StaffSortField::Age => SortColumn::Age,
            StaffSortField::Position => SortColumn::Position,
            StaffSortField::Salary => SortColumn::Salary,
            StaffSortField::CreatedAt => SortColumn::CreatedAt,
            StaffSortField::UpdatedAt => SortColumn::UpdatedAt,
        }
    }
}

/// Staff store backed by the `roster.staff` table.
#[derive(Debug, Clone)]
pub struct PostgresStaffStore {
    pool: PgPool,
}

impl PostgresStaffStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StaffStore for PostgresStaffStore {
    async fn create(&self, staff: NewStaff) -> RosterResult<StaffRecord> {
        let row = queries::insert_staff(
            &self.pool,
            Uuid::now_v7(),
            queries::NewStaff {
                name: &staff.name,
                age: staff.age,
                position: &staff.position,
                salary: staff.salary,
            },
        )
        .await?;

        Ok(row.into())
    }

    async fn update_by_id(
        &self,
        id: StaffId,
        fields: StaffFields,
    ) -> RosterResult<Option<StaffRecord>> {
        let patch = StaffPatch {
            name: fields.name.as_deref(),
            age: fields.age,
            position: fields.position.as_deref(),
            salary: fields.salary,
        };
        let row = queries::update_staff(&self.pool, id, patch).await?;

        Ok(row.map(StaffRecord::from))
    }

    async fn delete_by_id(&self, id: StaffId) -> RosterResult<bool> {
        Ok(queries::delete_staff(&self.pool, id).await?)
    }

    async fn find(&self, query: &StaffQuery) -> RosterResult<Vec<StaffRecord>> {
        let listing = StaffListing {
            search: query.filter.search.as_deref(),
            sort: query.sort.into(),
            descending: query.order == SortOrder::Desc,
            offset: to_i64(query.skip, "skip")?,
            limit: to_i64(query.limit, "limit")?,
        };
        let rows = queries::find_staff(&self.pool, listing).await?;

        Ok(rows.into_iter().map(StaffRecord::from).collect())
    }

    async fn count(&self, filter: &StaffFilter) -> RosterResult<u64> {
        let total = queries::count_staff(&self.pool, filter.search.as_deref()).await?;

        u64::try_from(total).map_err(|err| {
            roster_error!(
                ErrorKind::ConversionError,
                "Negative staff count",
                total,
                source: err
            )
        })
    }
}

fn to_i64(value: u64, name: &'static str) -> RosterResult<i64> {
    i64::try_from(value).map_err(|err| {
        roster_error!(
            ErrorKind::ConversionError,
            "Paging parameter out of range",
            name,
            source: err
        )
    })
}
