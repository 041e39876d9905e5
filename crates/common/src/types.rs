use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated registration, ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub child_name: String,
    pub batch: String,
    pub center: String,
    pub father_name: String,
    pub mother_name: String,
    pub dob: NaiveDate,
    pub media_consent: bool,
    pub email: String,
    pub child_photo_url: String,
    pub payment_screenshot_url: String,
}

/// A persisted registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub child_name: String,
    pub batch: String,
    pub center: String,
    pub father_name: String,
    pub mother_name: String,
    pub dob: NaiveDate,
    pub media_consent: bool,
    pub email: String,
    pub child_photo_url: String,
    pub payment_screenshot_url: String,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    /// Attach the server-generated identity to a validated registration.
    pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewRegistration) -> Self {
        Self {
            id,
            child_name: new.child_name,
            batch: new.batch,
            center: new.center,
            father_name: new.father_name,
            mother_name: new.mother_name,
            dob: new.dob,
            media_consent: new.media_consent,
            email: new.email,
            child_photo_url: new.child_photo_url,
            payment_screenshot_url: new.payment_screenshot_url,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_serializes_camel_case() {
        let registration = Registration::from_new(
            Uuid::nil(),
            Utc::now(),
            NewRegistration {
                child_name: "Asha".into(),
                batch: "B1".into(),
                center: "C1".into(),
                father_name: "Ram".into(),
                mother_name: "Sita".into(),
                dob: NaiveDate::from_ymd_opt(2016, 4, 2).unwrap(),
                media_consent: true,
                email: "parent@example.com".into(),
                child_photo_url: "https://example.com/a.jpg".into(),
                payment_screenshot_url: "https://example.com/b.jpg".into(),
            },
        );

        let json = serde_json::to_value(&registration).unwrap();
        assert_eq!(json["childName"], "Asha");
        assert_eq!(json["paymentScreenshotUrl"], "https://example.com/b.jpg");
        assert_eq!(json["dob"], "2016-04-02");
        assert_eq!(json["mediaConsent"], true);
        assert!(json.get("createdAt").is_some());
    }
}
