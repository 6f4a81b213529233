use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ServiceType {
    Ocr,
    Face,
    Liveness,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Ocr => "ocr",
            ServiceType::Face => "face",
            ServiceType::Liveness => "liveness",
        }
    }
}

/// Invariant: `0 <= consumed <= limit` between consume operations.
/// `reset_at` rolls to the first day of the next month when a
/// check-and-consume or the background resetter observes it has passed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganizationQuota {
    pub id: Uuid,
    pub org_id: Uuid,
    pub service_type: ServiceType,
    pub limit: i64,
    pub consumed: i64,
    pub reset_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// First instant of next month in UTC, used to advance `reset_at`.
pub fn start_of_next_month(from: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::{Datelike, TimeZone};
    let (year, month) = if from.month() == 12 {
        (from.year() + 1, 1)
    } else {
        (from.year(), from.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rolls_to_first_of_next_month() {
        let d = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        let next = start_of_next_month(d);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn rolls_december_into_next_year() {
        let d = Utc.with_ymd_and_hms(2026, 12, 15, 0, 0, 0).unwrap();
        let next = start_of_next_month(d);
        assert_eq!(next, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }
}
