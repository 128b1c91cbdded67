use serde::{Deserialize, Serialize};
use time::Time;

use crate::classes::repo_types::{
    clock_time, Class, ClassFilter, ClassType, Enrollment, EnrollmentStatus, SportType,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    pub name: String,
    pub sport_type: SportType,
    pub description: String,
    pub max_participants: i32,
    #[serde(with = "clock_time")]
    pub start_time: Time,
    #[serde(with = "clock_time")]
    pub end_time: Time,
    pub week_days: Vec<String>,
    #[serde(rename = "type", alias = "classType", default = "default_class_type")]
    pub class_type: ClassType,
}

fn default_class_type() -> ClassType {
    ClassType::Group
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sport_type: Option<SportType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_participants: Option<i32>,
    #[serde(default, with = "clock_time::option")]
    pub start_time: Option<Time>,
    #[serde(default, with = "clock_time::option")]
    pub end_time: Option<Time>,
    #[serde(default)]
    pub week_days: Option<Vec<String>>,
    #[serde(default, rename = "type", alias = "classType")]
    pub class_type: Option<ClassType>,
}

/// Body of `POST /classes/:id/enroll`. Both fields optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    #[serde(default)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub status: Option<EnrollmentStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassQuery {
    pub sports: Option<String>,
    pub day: Option<String>,
    #[serde(rename = "type")]
    pub class_type: Option<ClassType>,
}

impl ClassQuery {
    /// Unknown sport names are dropped; an all-unknown list means no sport filter.
    pub fn into_filter(self) -> ClassFilter {
        let sports = self
            .sports
            .as_deref()
            .map(|s| s.split(',').filter_map(SportType::parse).collect())
            .unwrap_or_default();
        let day = self
            .day
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| {
                crate::classes::repo_types::normalize_week_day(d)
                    .map(str::to_string)
                    .unwrap_or_else(|| d.to_string())
            });
        ClassFilter {
            sports,
            day,
            class_type: self.class_type,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDetails {
    #[serde(flatten)]
    pub class: Class,
    pub enrolled_count: usize,
    pub enrollments: Vec<Enrollment>,
}

impl ClassDetails {
    pub fn new(class: Class, enrollments: Vec<Enrollment>) -> Self {
        let enrolled_count = enrollments.iter().filter(|e| e.status.is_active()).count();
        Self {
            class,
            enrolled_count,
            enrollments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builds_filter() {
        let q = ClassQuery {
            sports: Some("Basketball,curling, football".into()),
            day: Some("monday".into()),
            class_type: Some(ClassType::Private),
        };
        let f = q.into_filter();
        assert_eq!(f.sports, vec![SportType::Basketball, SportType::Football]);
        assert_eq!(f.day.as_deref(), Some("Monday"));
        assert_eq!(f.class_type, Some(ClassType::Private));
    }

    #[test]
    fn unknown_sports_disable_sport_filter() {
        let f = ClassQuery {
            sports: Some("curling,polo".into()),
            ..Default::default()
        }
        .into_filter();
        assert!(f.sports.is_empty());
    }

    #[test]
    fn create_request_parses_wire_format() {
        let body = serde_json::json!({
            "name": "Basketball Basics",
            "sportType": "basketball",
            "description": "Learn the basics",
            "maxParticipants": 20,
            "startTime": "09:00",
            "endTime": "10:30",
            "weekDays": ["Monday", "Wednesday"],
            "type": "semi-private"
        });
        let req: CreateClassRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.start_time, Time::from_hms(9, 0, 0).unwrap());
        assert_eq!(req.end_time, Time::from_hms(10, 30, 0).unwrap());
        assert_eq!(req.class_type, ClassType::SemiPrivate);
    }

    #[test]
    fn create_request_rejects_bad_clock_time() {
        let body = serde_json::json!({
            "name": "x", "sportType": "tennis", "description": "y",
            "maxParticipants": 2, "startTime": "9am", "endTime": "10:00",
            "weekDays": ["Friday"]
        });
        assert!(serde_json::from_value::<CreateClassRequest>(body).is_err());
    }

    #[test]
    fn enroll_request_fields_are_optional() {
        let req: EnrollRequest = serde_json::from_str("{}").unwrap();
        assert!(req.user_id.is_none());
        assert!(req.status.is_none());
        let req: EnrollRequest =
            serde_json::from_str(r#"{"userId": 5, "status": "CONFIRMED"}"#).unwrap();
        assert_eq!(req.user_id, Some(5));
        assert_eq!(req.status, Some(EnrollmentStatus::Confirmed));
    }
}
