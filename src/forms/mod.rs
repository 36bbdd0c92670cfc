//! TNS submission forms.
//!
//! Raw form fields arrive as strings. Each form validates every field it
//! knows about, collecting all errors before failing, and once valid can
//! produce the JSON payload the TNS bulk-report API expects.

mod classification;
mod report;

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::models::{FormKind, TargetWithNames};

pub use classification::ClassificationForm;
pub use report::AtReportForm;

/// Datetime format used in TNS payloads.
const TNS_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Something that can be turned into a TNS bulk-report payload.
pub trait ReportPayload {
    fn generate_report_payload(&self) -> serde_json::Value;
}

/// A validated submission, one variant per sub-form.
#[derive(Debug, Clone)]
pub enum TnsForm {
    Report(AtReportForm),
    Classify(ClassificationForm),
    Supernova(ClassificationForm),
}

impl TnsForm {
    /// Validate raw fields as the sub-form named by `kind`.
    pub fn from_fields(kind: FormKind, fields: &HashMap<String, String>) -> Result<Self, FormErrors> {
        match kind {
            FormKind::Report => AtReportForm::from_fields(fields).map(Self::Report),
            FormKind::Classify => ClassificationForm::from_fields(fields, false).map(Self::Classify),
            FormKind::Supernova => {
                ClassificationForm::from_fields(fields, true).map(Self::Supernova)
            }
        }
    }

    pub fn kind(&self) -> FormKind {
        match self {
            Self::Report(_) => FormKind::Report,
            Self::Classify(_) => FormKind::Classify,
            Self::Supernova(_) => FormKind::Supernova,
        }
    }
}

impl ReportPayload for TnsForm {
    fn generate_report_payload(&self) -> serde_json::Value {
        match self {
            Self::Report(form) => form.generate_report_payload(),
            Self::Classify(form) | Self::Supernova(form) => form.generate_report_payload(),
        }
    }
}

/// Field values a form starts from before the user's input is applied.
pub fn initial_fields(kind: FormKind, target: &TargetWithNames) -> HashMap<String, String> {
    let mut initial = HashMap::new();
    match kind {
        FormKind::Report => {
            initial.insert("internal_name".to_string(), target.target.name.clone());
            if let Some(ra) = target.target.ra {
                initial.insert("ra".to_string(), ra.to_string());
            }
            if let Some(dec) = target.target.dec {
                initial.insert("dec".to_string(), dec.to_string());
            }
        }
        FormKind::Classify | FormKind::Supernova => {
            if let Some(name) = target.names().into_iter().find_map(strip_designation) {
                initial.insert("name".to_string(), name);
            }
        }
    }
    initial
}

/// `AT2023abc` and `SN 2023abc` both become `2023abc`.
fn strip_designation(name: &str) -> Option<String> {
    let prefix = name.get(..2)?;
    if prefix.eq_ignore_ascii_case("AT") || prefix.eq_ignore_ascii_case("SN") {
        let rest = name[2..].trim();
        rest.starts_with(|c: char| c.is_ascii_digit())
            .then(|| rest.to_string())
    } else {
        None
    }
}

// ============================================================
// Errors
// ============================================================

/// A single validation failure on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub message: String,
    pub code: &'static str,
}

/// Validation failures keyed by field name.
///
/// Serializes as `{"field": [{"message": ..., "code": ...}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<FieldError>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, code: &'static str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(FieldError {
            message: message.into(),
            code,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[FieldError]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json())
    }
}

// ============================================================
// Field parsing
// ============================================================

/// Reads raw fields and records every problem it runs into.
struct Fields<'a> {
    raw: &'a HashMap<String, String>,
    errors: FormErrors,
}

impl<'a> Fields<'a> {
    fn new(raw: &'a HashMap<String, String>) -> Self {
        Self {
            raw,
            errors: FormErrors::default(),
        }
    }

    /// Trimmed value, with blank treated as missing.
    fn value(&self, name: &str) -> Option<&'a str> {
        self.raw
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn text(&self, name: &str) -> Option<String> {
        self.value(name).map(str::to_string)
    }

    fn required_text(&mut self, name: &str) -> String {
        match self.text(name) {
            Some(v) => v,
            None => {
                self.missing(name);
                String::new()
            }
        }
    }

    fn parse<T: FromStr>(&mut self, name: &str) -> Option<T> {
        let raw = self.value(name)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.errors
                    .add(name, "invalid", format!("Enter a valid value, got '{}'.", raw));
                None
            }
        }
    }

    fn required<T: FromStr + Default>(&mut self, name: &str) -> T {
        if self.value(name).is_none() {
            self.missing(name);
            return T::default();
        }
        self.parse(name).unwrap_or_default()
    }

    /// A finite float. `NaN` and infinities parse as `f64` but have no JSON form.
    fn float(&mut self, name: &str) -> Option<f64> {
        let value: f64 = self.parse(name)?;
        if value.is_finite() {
            Some(value)
        } else {
            self.errors
                .add(name, "invalid", format!("Enter a finite number, got '{}'.", value));
            None
        }
    }

    fn required_float(&mut self, name: &str) -> f64 {
        if self.value(name).is_none() {
            self.missing(name);
            return 0.0;
        }
        self.float(name).unwrap_or_default()
    }

    fn datetime(&mut self, name: &str) -> Option<DateTime<Utc>> {
        let raw = self.value(name)?;
        match parse_datetime(raw) {
            Some(dt) => Some(dt),
            None => {
                self.errors.add(
                    name,
                    "invalid",
                    format!("Enter a valid date/time, got '{}'.", raw),
                );
                None
            }
        }
    }

    fn required_datetime(&mut self, name: &str) -> DateTime<Utc> {
        if self.value(name).is_none() {
            self.missing(name);
            return DateTime::<Utc>::UNIX_EPOCH;
        }
        self.datetime(name).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Record a range violation unless `ok`.
    fn check(&mut self, name: &str, ok: bool, message: &str) {
        if !ok {
            self.errors.add(name, "invalid", message);
        }
    }

    fn missing(&mut self, name: &str) {
        self.errors.add(name, "required", "This field is required.");
    }

    fn finish<T>(self, form: T) -> Result<T, FormErrors> {
        if self.errors.is_empty() {
            Ok(form)
        } else {
            Err(self.errors)
        }
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn tns_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(TNS_DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{Target, TargetName};

    fn target(name: &str, aliases: &[&str]) -> TargetWithNames {
        let now = Utc::now();
        let id = Uuid::new_v4();
        TargetWithNames {
            target: Target {
                id,
                name: name.to_string(),
                ra: Some(150.25),
                dec: Some(-12.5),
                created_at: now,
                updated_at: now,
            },
            aliases: aliases
                .iter()
                .map(|a| TargetName {
                    id: Uuid::new_v4(),
                    target_id: id,
                    name: a.to_string(),
                    created_at: now,
                })
                .collect(),
        }
    }

    #[test]
    fn parses_tns_and_rfc3339_datetimes() {
        let expected = "2024-03-01 04:05:06";
        for raw in [
            "2024-03-01 04:05:06",
            "2024-03-01T04:05:06",
            "2024-03-01T04:05:06Z",
            "2024-03-01T05:05:06+01:00",
        ] {
            let dt = parse_datetime(raw).expect(raw);
            assert_eq!(tns_datetime(&dt), expected);
        }
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn report_initial_fields_come_from_target() {
        let initial = initial_fields(FormKind::Report, &target("ZTF24abc", &[]));
        assert_eq!(initial.get("internal_name").map(String::as_str), Some("ZTF24abc"));
        assert_eq!(initial.get("ra").map(String::as_str), Some("150.25"));
        assert_eq!(initial.get("dec").map(String::as_str), Some("-12.5"));
    }

    #[test]
    fn classification_initial_name_strips_designation_prefix() {
        let initial = initial_fields(FormKind::Classify, &target("ZTF24abc", &["AT 2024xyz"]));
        assert_eq!(initial.get("name").map(String::as_str), Some("2024xyz"));

        let initial = initial_fields(FormKind::Supernova, &target("ATLAS24abc", &[]));
        assert!(initial.get("name").is_none());
    }

    #[test]
    fn form_errors_serialize_per_field() {
        let mut errors = FormErrors::default();
        errors.add("ra", "required", "This field is required.");
        assert_eq!(
            errors.to_json(),
            r#"{"ra":[{"message":"This field is required.","code":"required"}]}"#
        );
    }
}
