use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::{
    auth::claims::Identity,
    classes::{
        dto::{ClassDetails, CreateClassRequest, UpdateClassRequest},
        repo::ClassCatalog,
        repo_types::{
            normalize_week_day, Class, ClassFilter, Enrollment, EnrollmentStatus, NewClass,
            NewEnrollment,
        },
    },
    db::StoreError,
    error::AppError,
};

pub const MIN_PARTICIPANTS: i32 = 1;
pub const MAX_PARTICIPANTS: i32 = 30;

fn class_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Class with ID {id} not found"))
}

// ---- catalog ----

pub async fn list_classes(
    catalog: &dyn ClassCatalog,
    filter: &ClassFilter,
) -> Result<Vec<ClassDetails>, AppError> {
    let classes = catalog.list(filter).await?;
    let ids: Vec<i32> = classes.iter().map(|c| c.id).collect();
    let mut by_class: HashMap<i32, Vec<Enrollment>> = HashMap::new();
    if !ids.is_empty() {
        for e in catalog.enrollments_for(&ids).await? {
            by_class.entry(e.class_id).or_default().push(e);
        }
    }
    Ok(classes
        .into_iter()
        .map(|c| {
            let enrollments = by_class.remove(&c.id).unwrap_or_default();
            ClassDetails::new(c, enrollments)
        })
        .collect())
}

pub async fn get_class(catalog: &dyn ClassCatalog, id: i32) -> Result<ClassDetails, AppError> {
    let class = catalog.find_by_id(id).await?.ok_or_else(|| class_not_found(id))?;
    let enrollments = catalog.enrollments_for(&[id]).await?;
    Ok(ClassDetails::new(class, enrollments))
}

pub async fn create_class(
    catalog: &dyn ClassCatalog,
    req: CreateClassRequest,
) -> Result<Class, AppError> {
    let new_class = NewClass {
        name: req.name.trim().to_string(),
        sport_type: req.sport_type,
        description: req.description.trim().to_string(),
        max_participants: req.max_participants,
        start_time: req.start_time,
        end_time: req.end_time,
        week_days: normalize_week_days(&req.week_days)?,
        class_type: req.class_type,
    };
    validate_schedule(
        &new_class.name,
        &new_class.description,
        new_class.max_participants,
        new_class.start_time,
        new_class.end_time,
    )?;

    let class = catalog.create(&new_class).await?;
    info!(class_id = class.id, "class created");
    Ok(class)
}

pub async fn update_class(
    catalog: &dyn ClassCatalog,
    id: i32,
    req: UpdateClassRequest,
) -> Result<Class, AppError> {
    let mut class = catalog.find_by_id(id).await?.ok_or_else(|| class_not_found(id))?;

    if let Some(name) = req.name {
        class.name = name.trim().to_string();
    }
    if let Some(sport_type) = req.sport_type {
        class.sport_type = sport_type;
    }
    if let Some(description) = req.description {
        class.description = description.trim().to_string();
    }
    if let Some(max) = req.max_participants {
        class.max_participants = max;
    }
    if let Some(start) = req.start_time {
        class.start_time = start;
    }
    if let Some(end) = req.end_time {
        class.end_time = end;
    }
    if let Some(days) = req.week_days {
        class.week_days = normalize_week_days(&days)?;
    }
    if let Some(class_type) = req.class_type {
        class.class_type = class_type;
    }
    validate_schedule(
        &class.name,
        &class.description,
        class.max_participants,
        class.start_time,
        class.end_time,
    )?;

    let saved = catalog.save(&class).await?.ok_or_else(|| class_not_found(id))?;
    info!(class_id = id, "class updated");
    Ok(saved)
}

pub async fn delete_class(catalog: &dyn ClassCatalog, id: i32) -> Result<(), AppError> {
    if !catalog.soft_delete(id).await? {
        return Err(class_not_found(id));
    }
    info!(class_id = id, "class deleted");
    Ok(())
}

fn validate_schedule(
    name: &str,
    description: &str,
    max_participants: i32,
    start: time::Time,
    end: time::Time,
) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if description.is_empty() {
        return Err(AppError::BadRequest("description must not be empty".into()));
    }
    if !(MIN_PARTICIPANTS..=MAX_PARTICIPANTS).contains(&max_participants) {
        return Err(AppError::BadRequest(format!(
            "maxParticipants must be between {MIN_PARTICIPANTS} and {MAX_PARTICIPANTS}"
        )));
    }
    if start >= end {
        return Err(AppError::BadRequest("startTime must be before endTime".into()));
    }
    Ok(())
}

fn normalize_week_days(days: &[String]) -> Result<Vec<String>, AppError> {
    if days.is_empty() {
        return Err(AppError::BadRequest("weekDays must not be empty".into()));
    }
    let mut out: Vec<String> = Vec::with_capacity(days.len());
    for day in days {
        let canonical = normalize_week_day(day)
            .ok_or_else(|| AppError::BadRequest(format!("unknown week day '{day}'")))?;
        if !out.iter().any(|d| d == canonical) {
            out.push(canonical.to_string());
        }
    }
    Ok(out)
}

// ---- enrollment admission ----

/// Who is being enrolled: the explicit target if given, else the caller.
///
/// No privilege check is made when the target differs from the caller.
pub fn resolve_candidate(explicit_user_id: Option<i32>, caller: &Identity) -> i32 {
    match explicit_user_id {
        Some(id) if id != caller.user_id => {
            debug!(caller = caller.user_id, target = id, "enrolling on behalf of another user");
            id
        }
        Some(id) => id,
        None => caller.user_id,
    }
}

/// Admits `user_id` into class `class_id`.
///
/// Checks run against current state with no lock held between them, so two
/// concurrent requests for the last seat can both pass the capacity check.
/// Any prior enrollment for the pair blocks, whatever its status.
pub async fn enroll(
    catalog: &dyn ClassCatalog,
    class_id: i32,
    user_id: i32,
    status: Option<EnrollmentStatus>,
) -> Result<Enrollment, AppError> {
    let class = catalog
        .find_by_id(class_id)
        .await?
        .ok_or_else(|| class_not_found(class_id))?;

    let taken = catalog.count_active_enrollments(class_id).await?;
    if taken >= i64::from(class.max_participants) {
        warn!(class_id, taken, max = class.max_participants, "class is full");
        return Err(AppError::CapacityExceeded);
    }

    if catalog.find_enrollment(class_id, user_id).await?.is_some() {
        warn!(class_id, user_id, "already enrolled");
        return Err(AppError::DuplicateEnrollment);
    }

    let new_enrollment = NewEnrollment {
        class_id,
        user_id,
        status: status.unwrap_or(EnrollmentStatus::Pending),
    };
    match catalog.save_enrollment(&new_enrollment).await {
        Ok(enrollment) => {
            info!(enrollment_id = enrollment.id, class_id, user_id, "enrollment created");
            Ok(enrollment)
        }
        Err(StoreError::ForeignKeyViolation(constraint)) => {
            warn!(class_id, user_id, %constraint, "enrollment references a missing row");
            Err(AppError::InvalidReference(format!(
                "User with ID {user_id} or class with ID {class_id} does not exist"
            )))
        }
        Err(StoreError::UniqueViolation(_)) => Err(AppError::DuplicateEnrollment),
        Err(e) => Err(e.into()),
    }
}
