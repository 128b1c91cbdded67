use async_trait::async_trait;
use sqlx::PgPool;

use crate::classes::repo_types::{Class, ClassFilter, Enrollment, NewClass, NewEnrollment};
use crate::db::StoreError;

/// Class catalog: class records and the enrollments they own.
///
/// Soft-deleted classes are invisible to every lookup.
#[async_trait]
pub trait ClassCatalog: Send + Sync {
    async fn list(&self, filter: &ClassFilter) -> Result<Vec<Class>, StoreError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<Class>, StoreError>;
    async fn create(&self, class: &NewClass) -> Result<Class, StoreError>;
    /// Overwrites the mutable columns of an existing class; `None` if it is gone.
    async fn save(&self, class: &Class) -> Result<Option<Class>, StoreError>;
    /// Marks the class deleted; `false` if there was nothing to delete.
    async fn soft_delete(&self, id: i32) -> Result<bool, StoreError>;

    async fn enrollments_for(&self, class_ids: &[i32]) -> Result<Vec<Enrollment>, StoreError>;
    /// Enrollments that still hold a seat (anything but CANCELLED).
    async fn count_active_enrollments(&self, class_id: i32) -> Result<i64, StoreError>;
    async fn find_enrollment(
        &self,
        class_id: i32,
        user_id: i32,
    ) -> Result<Option<Enrollment>, StoreError>;
    async fn save_enrollment(&self, enrollment: &NewEnrollment) -> Result<Enrollment, StoreError>;
}

#[derive(Clone)]
pub struct PgClassCatalog {
    db: PgPool,
}

impl PgClassCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const CLASS_COLUMNS: &str = "id, name, sport_type, description, max_participants, start_time, \
                             end_time, week_days, class_type, created_at, updated_at, deleted_at";

const ENROLLMENT_COLUMNS: &str = "id, class_id, user_id, status, created_at";

#[async_trait]
impl ClassCatalog for PgClassCatalog {
    async fn list(&self, filter: &ClassFilter) -> Result<Vec<Class>, StoreError> {
        let sports: Vec<String> = filter.sports.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, Class>(&format!(
            r#"
            SELECT {CLASS_COLUMNS}
            FROM classes
            WHERE deleted_at IS NULL
              AND (cardinality($1::text[]) = 0 OR sport_type::text = ANY($1))
              AND ($2::text IS NULL OR $2 = ANY(week_days))
              AND ($3::class_type IS NULL OR class_type = $3)
            ORDER BY id
            "#
        ))
        .bind(&sports)
        .bind(filter.day.as_deref())
        .bind(filter.class_type)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Class>, StoreError> {
        let class = sqlx::query_as::<_, Class>(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(class)
    }

    async fn create(&self, class: &NewClass) -> Result<Class, StoreError> {
        let class = sqlx::query_as::<_, Class>(&format!(
            r#"
            INSERT INTO classes
                (name, sport_type, description, max_participants, start_time, end_time,
                 week_days, class_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CLASS_COLUMNS}
            "#
        ))
        .bind(&class.name)
        .bind(class.sport_type)
        .bind(&class.description)
        .bind(class.max_participants)
        .bind(class.start_time)
        .bind(class.end_time)
        .bind(&class.week_days)
        .bind(class.class_type)
        .fetch_one(&self.db)
        .await?;
        Ok(class)
    }

    async fn save(&self, class: &Class) -> Result<Option<Class>, StoreError> {
        let class = sqlx::query_as::<_, Class>(&format!(
            r#"
            UPDATE classes
               SET name = $2, sport_type = $3, description = $4, max_participants = $5,
                   start_time = $6, end_time = $7, week_days = $8, class_type = $9,
                   updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            RETURNING {CLASS_COLUMNS}
            "#
        ))
        .bind(class.id)
        .bind(&class.name)
        .bind(class.sport_type)
        .bind(&class.description)
        .bind(class.max_participants)
        .bind(class.start_time)
        .bind(class.end_time)
        .bind(&class.week_days)
        .bind(class.class_type)
        .fetch_optional(&self.db)
        .await?;
        Ok(class)
    }

    async fn soft_delete(&self, id: i32) -> Result<bool, StoreError> {
        let res = sqlx::query(
            "UPDATE classes SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn enrollments_for(&self, class_ids: &[i32]) -> Result<Vec<Enrollment>, StoreError> {
        let rows = sqlx::query_as::<_, Enrollment>(&format!(
            r#"
            SELECT {ENROLLMENT_COLUMNS}
            FROM enrollments
            WHERE class_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(class_ids)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count_active_enrollments(&self, class_id: i32) -> Result<i64, StoreError> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM enrollments WHERE class_id = $1 AND status <> 'CANCELLED'",
        )
        .bind(class_id)
        .fetch_one(&self.db)
        .await?;
        Ok(n)
    }

    async fn find_enrollment(
        &self,
        class_id: i32,
        user_id: i32,
    ) -> Result<Option<Enrollment>, StoreError> {
        let row = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE class_id = $1 AND user_id = $2"
        ))
        .bind(class_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn save_enrollment(&self, enrollment: &NewEnrollment) -> Result<Enrollment, StoreError> {
        let row = sqlx::query_as::<_, Enrollment>(&format!(
            r#"
            INSERT INTO enrollments (class_id, user_id, status)
            VALUES ($1, $2, $3)
            RETURNING {ENROLLMENT_COLUMNS}
            "#
        ))
        .bind(enrollment.class_id)
        .bind(enrollment.user_id)
        .bind(enrollment.status)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }
}
