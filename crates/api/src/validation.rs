//! Registration request validation.
//!
//! The raw JSON body is deserialized into [`RegisterRequest`] (unknown
//! fields rejected) and then checked field by field into a
//! [`NewRegistration`]. Nothing reaches the store unless every check passes.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use icvk_common::error::AppError;
use icvk_common::types::NewRegistration;
use icvk_notifier::payload::parse_recipient;

/// Host serving uploaded registration images.
pub const ASSET_HOST: &str = "res.cloudinary.com";

/// Folder that registration uploads are placed in.
const ASSET_FOLDER: [&str; 2] = ["icvk", "registrations"];

/// Media consent as sent by the form: a checkbox boolean or a Yes/No answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConsentValue {
    Flag(bool),
    Text(String),
}

impl ConsentValue {
    fn to_bool(&self) -> Result<bool, AppError> {
        match self {
            ConsentValue::Flag(flag) => Ok(*flag),
            ConsentValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" => Ok(true),
                "no" | "false" => Ok(false),
                other => Err(AppError::Validation(format!(
                    "mediaConsent must be Yes or No, got '{}'",
                    other
                ))),
            },
        }
    }
}

/// Request body for `POST /api/icvk/register`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub child_name: Option<String>,
    pub batch: Option<String>,
    pub center: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub dob: Option<String>,
    pub media_consent: Option<ConsentValue>,
    pub email: Option<String>,
    pub child_photo_url: Option<String>,
    pub payment_screenshot_url: Option<String>,
}

impl RegisterRequest {
    /// Check every field and produce a registration ready to persist.
    ///
    /// `asset_account` is the hosting account the image URLs must belong to;
    /// without it uploads cannot be verified and the request fails with a
    /// configuration error.
    pub fn validate(self, asset_account: Option<&str>) -> Result<NewRegistration, AppError> {
        let child_name = required("childName", self.child_name)?;
        let batch = required("batch", self.batch)?;
        let center = required("center", self.center)?;
        let father_name = required("fatherName", self.father_name)?;
        let mother_name = required("motherName", self.mother_name)?;
        let dob = parse_dob(&required("dob", self.dob)?)?;
        let media_consent = self
            .media_consent
            .ok_or_else(|| missing("mediaConsent"))?
            .to_bool()?;

        let email = required("email", self.email)?;
        parse_recipient(&email)
            .map_err(|_| AppError::Validation(format!("Invalid email address '{}'", email)))?;

        let child_photo_url = required("childPhotoUrl", self.child_photo_url)?;
        let payment_screenshot_url = required("paymentScreenshotUrl", self.payment_screenshot_url)?;

        let account = asset_account.ok_or_else(|| {
            AppError::Config("CLOUDINARY_CLOUD_NAME is not configured".to_string())
        })?;
        validate_asset_url("childPhotoUrl", &child_photo_url, account)?;
        validate_asset_url("paymentScreenshotUrl", &payment_screenshot_url, account)?;

        Ok(NewRegistration {
            child_name,
            batch,
            center,
            father_name,
            mother_name,
            dob,
            media_consent,
            email,
            child_photo_url,
            payment_screenshot_url,
        })
    }
}

fn missing(field: &str) -> AppError {
    AppError::Validation(format!("Missing required field: {}", field))
}

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(field))
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_dob(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::Validation(format!("Invalid dob '{}', expected YYYY-MM-DD", raw)))
}

/// Check that `url` points at an image uploaded to the registration folder of
/// `account`:
///
/// `https://res.cloudinary.com/<account>/image/upload/v<version>/icvk/registrations/<file>`
pub fn validate_asset_url(field: &str, url: &str, account: &str) -> Result<(), AppError> {
    let invalid = || AppError::Validation(format!("Invalid {} URL", field));

    let rest = url.strip_prefix("https://").ok_or_else(invalid)?;
    if rest.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let mut segments = rest.splitn(8, '/');
    let expected_prefix = [ASSET_HOST, account, "image", "upload"];
    for expected in expected_prefix {
        if segments.next() != Some(expected) {
            return Err(invalid());
        }
    }

    let version = segments.next().and_then(|s| s.strip_prefix('v')).ok_or_else(invalid)?;
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    for expected in ASSET_FOLDER {
        if segments.next() != Some(expected) {
            return Err(invalid());
        }
    }

    match segments.next() {
        Some(file) if !file.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const ACCOUNT: &str = "demo";

    fn url(file: &str) -> String {
        format!("https://res.cloudinary.com/demo/image/upload/v1712345678/icvk/registrations/{file}")
    }

    fn valid_body() -> serde_json::Value {
        json!({
            "childName": "Asha",
            "batch": "B1",
            "center": "C1",
            "fatherName": "Ram",
            "motherName": "Sita",
            "dob": "2016-04-02",
            "mediaConsent": "Yes",
            "email": "parent@example.com",
            "childPhotoUrl": url("child.jpg"),
            "paymentScreenshotUrl": url("payment.png"),
        })
    }

    fn parse(body: serde_json::Value) -> RegisterRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_valid_request() {
        let registration = parse(valid_body()).validate(Some(ACCOUNT)).unwrap();
        assert_eq!(registration.child_name, "Asha");
        assert_eq!(registration.dob, NaiveDate::from_ymd_opt(2016, 4, 2).unwrap());
        assert!(registration.media_consent);
    }

    #[test]
    fn test_missing_field_named_in_error() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("fatherName");
        let err = parse(body).validate(Some(ACCOUNT)).unwrap_err();
        assert!(err.to_string().contains("fatherName"));
    }

    #[test]
    fn test_blank_field_rejected() {
        let mut body = valid_body();
        body["batch"] = json!("   ");
        assert!(matches!(
            parse(body).validate(Some(ACCOUNT)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected_by_deserializer() {
        let mut body = valid_body();
        body["isAdmin"] = json!(true);
        assert!(serde_json::from_value::<RegisterRequest>(body).is_err());
    }

    #[test]
    fn test_consent_forms() {
        for (value, expected) in [
            (json!(true), true),
            (json!(false), false),
            (json!("Yes"), true),
            (json!("no"), false),
            (json!("true"), true),
        ] {
            let mut body = valid_body();
            body["mediaConsent"] = value;
            let registration = parse(body).validate(Some(ACCOUNT)).unwrap();
            assert_eq!(registration.media_consent, expected);
        }

        let mut body = valid_body();
        body["mediaConsent"] = json!("maybe");
        assert!(parse(body).validate(Some(ACCOUNT)).is_err());
    }

    #[test]
    fn test_dob_accepts_rfc3339() {
        let mut body = valid_body();
        body["dob"] = json!("2016-04-02T00:00:00.000Z");
        let registration = parse(body).validate(Some(ACCOUNT)).unwrap();
        assert_eq!(registration.dob, NaiveDate::from_ymd_opt(2016, 4, 2).unwrap());
    }

    #[test]
    fn test_bad_dob_and_email() {
        let mut body = valid_body();
        body["dob"] = json!("02/04/2016");
        assert!(parse(body).validate(Some(ACCOUNT)).is_err());

        for email in ["parent.example.com", "a..b@example.com", "parent@example..com", "a@-x.com"] {
            let mut body = valid_body();
            body["email"] = json!(email);
            assert!(
                matches!(parse(body).validate(Some(ACCOUNT)), Err(AppError::Validation(_))),
                "accepted {email}"
            );
        }
    }

    #[test]
    fn test_missing_asset_account_is_config_error() {
        let err = parse(valid_body()).validate(None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_asset_url_accepted() {
        assert!(validate_asset_url("childPhotoUrl", &url("a.jpg"), ACCOUNT).is_ok());
        assert!(validate_asset_url("childPhotoUrl", &url("nested/a.jpg"), ACCOUNT).is_ok());
    }

    #[test]
    fn test_asset_url_rejections() {
        let cases = [
            "http://res.cloudinary.com/demo/image/upload/v1/icvk/registrations/a.jpg",
            "https://evil.example.com/demo/image/upload/v1/icvk/registrations/a.jpg",
            "https://res.cloudinary.com/other/image/upload/v1/icvk/registrations/a.jpg",
            "https://res.cloudinary.com/demo/video/upload/v1/icvk/registrations/a.jpg",
            "https://res.cloudinary.com/demo/image/upload/vX1/icvk/registrations/a.jpg",
            "https://res.cloudinary.com/demo/image/upload/v/icvk/registrations/a.jpg",
            "https://res.cloudinary.com/demo/image/upload/v1/other/registrations/a.jpg",
            "https://res.cloudinary.com/demo/image/upload/v1/icvk/registrations/",
            "https://res.cloudinary.com/demo/image/upload/v1/icvk/registrations",
            "not a url",
        ];
        for case in cases {
            assert!(
                validate_asset_url("childPhotoUrl", case, ACCOUNT).is_err(),
                "accepted {case}"
            );
        }
    }
}
