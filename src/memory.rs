//! In-process stand-in for the Postgres stores.
//!
//! Enforces the same constraints the schema does (unique email, unique
//! class/user pair, foreign keys) so service rules behave identically in tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, User};
use crate::classes::repo::ClassCatalog;
use crate::classes::repo_types::{Class, ClassFilter, Enrollment, NewClass, NewEnrollment};
use crate::db::StoreError;

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    classes: BTreeMap<i32, Class>,
    enrollments: BTreeMap<i32, Enrollment>,
    next_user_id: i32,
    next_class_id: i32,
    next_enrollment_id: i32,
}

fn next_id(counter: &mut i32, taken: impl Fn(i32) -> bool) -> i32 {
    loop {
        *counter += 1;
        if !taken(*counter) {
            return *counter;
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Inserts a fully formed user, keeping its id.
    pub fn put_user(&self, user: User) {
        self.tables().users.insert(user.id, user);
    }

    /// Inserts a fully formed class, keeping its id.
    pub fn put_class(&self, class: Class) {
        self.tables().classes.insert(class.id, class);
    }

    pub fn put_enrollment(&self, enrollment: Enrollment) {
        self.tables().enrollments.insert(enrollment.id, enrollment);
    }

    pub fn enrollment_count(&self) -> usize {
        self.tables().enrollments.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self
            .tables()
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn create(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut t = self.tables();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".into()));
        }
        let Tables {
            users,
            next_user_id,
            ..
        } = &mut *t;
        let id = next_id(next_user_id, |id| users.contains_key(&id));
        let now = OffsetDateTime::now_utc();
        let created = User {
            id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_active: true,
            role: user.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.insert(id, created.clone());
        Ok(created)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self
            .tables()
            .users
            .values()
            .filter(|u| u.deleted_at.is_none())
            .count() as i64)
    }
}

#[async_trait]
impl ClassCatalog for MemoryStore {
    async fn list(&self, filter: &ClassFilter) -> Result<Vec<Class>, StoreError> {
        Ok(self
            .tables()
            .classes
            .values()
            .filter(|c| c.deleted_at.is_none() && filter.matches(c))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Class>, StoreError> {
        Ok(self
            .tables()
            .classes
            .get(&id)
            .filter(|c| c.deleted_at.is_none())
            .cloned())
    }

    async fn create(&self, class: &NewClass) -> Result<Class, StoreError> {
        let mut t = self.tables();
        let Tables {
            classes,
            next_class_id,
            ..
        } = &mut *t;
        let id = next_id(next_class_id, |id| classes.contains_key(&id));
        let now = OffsetDateTime::now_utc();
        let created = Class {
            id,
            name: class.name.clone(),
            sport_type: class.sport_type,
            description: class.description.clone(),
            max_participants: class.max_participants,
            start_time: class.start_time,
            end_time: class.end_time,
            week_days: class.week_days.clone(),
            class_type: class.class_type,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        classes.insert(id, created.clone());
        Ok(created)
    }

    async fn save(&self, class: &Class) -> Result<Option<Class>, StoreError> {
        let mut t = self.tables();
        let Some(stored) = t.classes.get_mut(&class.id).filter(|c| c.deleted_at.is_none()) else {
            return Ok(None);
        };
        let created_at = stored.created_at;
        *stored = Class {
            created_at,
            updated_at: OffsetDateTime::now_utc(),
            deleted_at: None,
            ..class.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn soft_delete(&self, id: i32) -> Result<bool, StoreError> {
        let mut t = self.tables();
        match t.classes.get_mut(&id).filter(|c| c.deleted_at.is_none()) {
            Some(class) => {
                class.deleted_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn enrollments_for(&self, class_ids: &[i32]) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self
            .tables()
            .enrollments
            .values()
            .filter(|e| class_ids.contains(&e.class_id))
            .cloned()
            .collect())
    }

    async fn count_active_enrollments(&self, class_id: i32) -> Result<i64, StoreError> {
        Ok(self
            .tables()
            .enrollments
            .values()
            .filter(|e| e.class_id == class_id && e.status.is_active())
            .count() as i64)
    }

    async fn find_enrollment(
        &self,
        class_id: i32,
        user_id: i32,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .tables()
            .enrollments
            .values()
            .find(|e| e.class_id == class_id && e.user_id == user_id)
            .cloned())
    }

    async fn save_enrollment(&self, enrollment: &NewEnrollment) -> Result<Enrollment, StoreError> {
        let mut t = self.tables();
        if !t.classes.contains_key(&enrollment.class_id) {
            return Err(StoreError::ForeignKeyViolation("enrollments_class_id_fkey".into()));
        }
        if !t.users.contains_key(&enrollment.user_id) {
            return Err(StoreError::ForeignKeyViolation("enrollments_user_id_fkey".into()));
        }
        if t.enrollments
            .values()
            .any(|e| e.class_id == enrollment.class_id && e.user_id == enrollment.user_id)
        {
            return Err(StoreError::UniqueViolation(
                "enrollments_class_user_key".into(),
            ));
        }
        let Tables {
            enrollments,
            next_enrollment_id,
            ..
        } = &mut *t;
        let id = next_id(next_enrollment_id, |id| enrollments.contains_key(&id));
        let created = Enrollment {
            id,
            class_id: enrollment.class_id,
            user_id: enrollment.user_id,
            status: enrollment.status,
            created_at: OffsetDateTime::now_utc(),
        };
        enrollments.insert(id, created.clone());
        Ok(created)
    }
}
