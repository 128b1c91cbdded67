use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{OffsetDateTime, Time};

/// `HH:MM` (24h) serde format for time-of-day fields.
pub mod clock_time {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{macros::format_description, Time};

    pub fn serialize<S: Serializer>(value: &Time, serializer: S) -> Result<S::Ok, S::Error> {
        let text = value
            .format(format_description!("[hour]:[minute]"))
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Time, D::Error> {
        let text = String::deserialize(deserializer)?;
        Time::parse(text.trim(), format_description!("[hour]:[minute]"))
            .map_err(|_| serde::de::Error::custom("time must be in HH:MM format (24-hour)"))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Time;

        pub fn serialize<S: Serializer>(
            value: &Option<Time>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Time>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] Time);

            let wrapped = Option::<Wrapper>::deserialize(deserializer)?;
            Ok(wrapped.map(|Wrapper(t)| t))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "sport_type", rename_all = "lowercase")]
pub enum SportType {
    Baseball,
    Basketball,
    Football,
    Tennis,
    Swimming,
}

impl SportType {
    pub const ALL: [SportType; 5] = [
        SportType::Baseball,
        SportType::Basketball,
        SportType::Football,
        SportType::Tennis,
        SportType::Swimming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SportType::Baseball => "baseball",
            SportType::Basketball => "basketball",
            SportType::Football => "football",
            SportType::Tennis => "tennis",
            SportType::Swimming => "swimming",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "class_type", rename_all = "kebab-case")]
pub enum ClassType {
    Group,
    Private,
    SemiPrivate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "enrollment_status", rename_all = "UPPERCASE")]
pub enum EnrollmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl EnrollmentStatus {
    /// Cancelled enrollments no longer take a seat.
    pub fn is_active(&self) -> bool {
        !matches!(self, EnrollmentStatus::Cancelled)
    }
}

pub const WEEK_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Canonical capitalized weekday name, if `day` names one.
pub fn normalize_week_day(day: &str) -> Option<&'static str> {
    let day = day.trim();
    WEEK_DAYS
        .into_iter()
        .find(|d| d.eq_ignore_ascii_case(day))
}

/// Class record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: i32,
    pub name: String,
    pub sport_type: SportType,
    pub description: String,
    pub max_participants: i32,
    #[serde(with = "clock_time")]
    pub start_time: Time,
    #[serde(with = "clock_time")]
    pub end_time: Time,
    pub week_days: Vec<String>,
    #[serde(rename = "type")]
    pub class_type: ClassType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

/// Values needed to insert a class.
#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub sport_type: SportType,
    pub description: String,
    pub max_participants: i32,
    pub start_time: Time,
    pub end_time: Time,
    pub week_days: Vec<String>,
    pub class_type: ClassType,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i32,
    pub class_id: i32,
    pub user_id: i32,
    pub status: EnrollmentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub class_id: i32,
    pub user_id: i32,
    pub status: EnrollmentStatus,
}

/// Listing filters; empty fields do not restrict.
#[derive(Debug, Clone, Default)]
pub struct ClassFilter {
    pub sports: Vec<SportType>,
    pub day: Option<String>,
    pub class_type: Option<ClassType>,
}

impl ClassFilter {
    pub fn matches(&self, class: &Class) -> bool {
        (self.sports.is_empty() || self.sports.contains(&class.sport_type))
            && self
                .day
                .as_ref()
                .map_or(true, |d| class.week_days.iter().any(|w| w == d))
            && self.class_type.map_or(true, |t| class.class_type == t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sport_type_parses_case_insensitively() {
        assert_eq!(SportType::parse("Basketball"), Some(SportType::Basketball));
        assert_eq!(SportType::parse(" TENNIS "), Some(SportType::Tennis));
        assert_eq!(SportType::parse("curling"), None);
    }

    #[test]
    fn week_day_is_normalized() {
        assert_eq!(normalize_week_day("monday"), Some("Monday"));
        assert_eq!(normalize_week_day("SUNDAY"), Some("Sunday"));
        assert_eq!(normalize_week_day("Funday"), None);
    }

    #[test]
    fn cancelled_enrollment_is_inactive() {
        assert!(EnrollmentStatus::Pending.is_active());
        assert!(EnrollmentStatus::Confirmed.is_active());
        assert!(!EnrollmentStatus::Cancelled.is_active());
    }

    #[test]
    fn class_type_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&ClassType::SemiPrivate).unwrap();
        assert_eq!(json, "\"semi-private\"");
    }
}
