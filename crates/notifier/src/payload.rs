//! Confirmation message rendering.
//!
//! Turns a persisted registration into an immutable [`NotificationRequest`].
//! Pure: no I/O, and identical input yields identical output apart from the
//! copyright year stamped into the footer.
//!
//! Bodies are Handlebars templates registered once per process. The HTML
//! template relies on Handlebars escaping; the text template uses
//! triple-stash so values come through verbatim.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use handlebars::Handlebars;
use lettre::Address;
use serde::Serialize;

use icvk_common::types::Registration;

use crate::error::NotifyError;

/// Fixed subject line of the confirmation email.
pub const CONFIRMATION_SUBJECT: &str = "ICVK Registration Confirmation - Hare Krishna!";

/// Contact number printed in the closing paragraph.
const CONTACT_NUMBER: &str = "+91 96008 15108";

const CONFIRMATION_HTML: &str = "confirmation_html";
const CONFIRMATION_TEXT: &str = "confirmation_text";

static TEMPLATES: LazyLock<Result<Handlebars<'static>, NotifyError>> =
    LazyLock::new(register_templates);

/// A fully rendered notification. Fields are private so that retries always
/// resend exactly what was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    recipient: String,
    subject: &'static str,
    fields: BTreeMap<&'static str, String>,
    html_body: String,
    text_body: String,
}

impl NotificationRequest {
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn subject(&self) -> &'static str {
        self.subject
    }

    /// Named values the bodies were rendered from.
    pub fn fields(&self) -> &BTreeMap<&'static str, String> {
        &self.fields
    }

    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    pub fn text_body(&self) -> &str {
        &self.text_body
    }
}

/// Values handed to both templates.
#[derive(Serialize)]
struct TemplateContext<'a> {
    #[serde(flatten)]
    fields: &'a BTreeMap<&'static str, String>,
    contact: &'static str,
    year: i32,
}

/// Parse a recipient address the same way the mail relay will.
///
/// Intake uses this to reject addresses that could never be delivered to.
pub fn parse_recipient(raw: &str) -> Result<Address, NotifyError> {
    let recipient = raw.trim();
    if recipient.is_empty() {
        return Err(NotifyError::Validation(
            "Recipient address is missing".to_string(),
        ));
    }
    recipient
        .parse::<Address>()
        .map_err(|e| NotifyError::Validation(format!("Invalid recipient '{}': {}", recipient, e)))
}

/// Build the confirmation notification for a registration.
///
/// Fails with [`NotifyError::Validation`] when the recipient is blank or not
/// a syntactically valid address.
pub fn build(registration: &Registration) -> Result<NotificationRequest, NotifyError> {
    build_for_year(registration, Utc::now().year())
}

fn build_for_year(registration: &Registration, year: i32) -> Result<NotificationRequest, NotifyError> {
    let recipient = parse_recipient(&registration.email)?;

    let fields = BTreeMap::from([
        ("childName", registration.child_name.clone()),
        ("batch", registration.batch.clone()),
        ("center", registration.center.clone()),
        ("fatherName", registration.father_name.clone()),
        ("motherName", registration.mother_name.clone()),
    ]);

    let context = TemplateContext {
        fields: &fields,
        contact: CONTACT_NUMBER,
        year,
    };

    Ok(NotificationRequest {
        recipient: recipient.to_string(),
        subject: CONFIRMATION_SUBJECT,
        html_body: render(CONFIRMATION_HTML, &context)?,
        text_body: render(CONFIRMATION_TEXT, &context)?,
        fields,
    })
}

fn register_templates() -> Result<Handlebars<'static>, NotifyError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string(CONFIRMATION_HTML, CONFIRMATION_HTML_TEMPLATE)
        .map_err(|e| NotifyError::Template(format!("Failed to register {}: {}", CONFIRMATION_HTML, e)))?;
    handlebars
        .register_template_string(CONFIRMATION_TEXT, CONFIRMATION_TEXT_TEMPLATE)
        .map_err(|e| NotifyError::Template(format!("Failed to register {}: {}", CONFIRMATION_TEXT, e)))?;

    Ok(handlebars)
}

fn render(template: &str, context: &TemplateContext<'_>) -> Result<String, NotifyError> {
    let handlebars = TEMPLATES.as_ref().map_err(Clone::clone)?;
    handlebars
        .render(template, context)
        .map_err(|e| NotifyError::Template(format!("Failed to render {}: {}", template, e)))
}

const CONFIRMATION_HTML_TEMPLATE: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; border: 1px solid #eee; border-radius: 10px; overflow: hidden;">
    <div style="background-color: #FBB201; padding: 20px; text-align: center;">
        <h1 style="color: #2D0A0A; margin: 0;">Hare Krishna!</h1>
        <p style="color: #2D0A0A; margin: 5px 0 0;">ICVK Registration Confirmed</p>
    </div>
    <div style="padding: 20px; background-color: #FFF9F0;">
        <p>Dear Parent,</p>
        <p>Thank you for registering <strong>{{childName}}</strong> for the Indian Culture &amp; Values for Kids (ICVK) program.</p>
        <div style="background-color: #fff; padding: 15px; border-radius: 8px; border: 1px solid #eee; margin: 20px 0;">
            <h3 style="color: #ea580c; border-bottom: 1px solid #eee; padding-bottom: 10px; margin-top: 0;">Registration Details</h3>
            <p><strong>Batch:</strong> {{batch}}</p>
            <p><strong>Center:</strong> {{center}}</p>
            <p><strong>Parent's Name:</strong> {{fatherName}} / {{motherName}}</p>
        </div>
        <p>We are excited to have your child join us in this journey of learning and fun!</p>
        <p style="margin-top: 30px;">
            Hare Krishna,<br>
            You have successfully registered for ICVK program, for further queries or information you may please contact <strong>{{contact}}</strong>.
        </p>
    </div>
    <div style="background-color: #2D0A0A; color: #FBB201; padding: 15px; text-align: center; font-size: 12px;">
        &copy; {{year}} Hare Krishna Movement. All rights reserved.
    </div>
</div>"#;

const CONFIRMATION_TEXT_TEMPLATE: &str = r#"Hare Krishna!
ICVK Registration Confirmed

Dear Parent,

Thank you for registering {{{childName}}} for the Indian Culture & Values for Kids (ICVK) program.

Registration Details
Batch: {{{batch}}}
Center: {{{center}}}
Parent's Name: {{{fatherName}}} / {{{motherName}}}

For further queries or information you may please contact {{{contact}}}.

(c) {{year}} Hare Krishna Movement. All rights reserved.
"#;
