use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{tns_datetime, Fields, FormErrors, ReportPayload};

/// A classification report with its supporting spectrum.
///
/// Used both for classifying an AT object and for reclassifying an object
/// that already carries an SN designation. The latter must say why in
/// `remarks`.
#[derive(Debug, Clone)]
pub struct ClassificationForm {
    /// TNS object name without its prefix, e.g. `2024xyz`.
    pub name: String,
    pub classifier: String,
    pub classification: i64,
    pub redshift: Option<f64>,
    pub group_id: i64,
    pub remarks: Option<String>,
    pub observation_date: DateTime<Utc>,
    pub instrument_id: i64,
    pub exposure_time: Option<f64>,
    pub observer: Option<String>,
    pub reducer: Option<String>,
    pub spectrum_type: i64,
}

impl ClassificationForm {
    pub fn from_fields(
        raw: &HashMap<String, String>,
        require_remarks: bool,
    ) -> Result<Self, FormErrors> {
        let mut fields = Fields::new(raw);

        let redshift = fields.float("redshift");
        fields.check(
            "redshift",
            redshift.map_or(true, |z| z >= 0.0),
            "Redshift cannot be negative.",
        );
        let exposure_time = fields.float("exposure_time");
        fields.check(
            "exposure_time",
            exposure_time.map_or(true, |t| t > 0.0),
            "Exposure time must be positive.",
        );

        let remarks = if require_remarks {
            Some(fields.required_text("remarks"))
        } else {
            fields.text("remarks")
        };

        let form = Self {
            name: fields.required_text("name"),
            classifier: fields.required_text("classifier"),
            classification: fields.required("classification"),
            redshift,
            group_id: fields.required("group_id"),
            remarks,
            observation_date: fields.required_datetime("observation_date"),
            instrument_id: fields.required("instrument_id"),
            exposure_time,
            observer: fields.text("observer"),
            reducer: fields.text("reducer"),
            spectrum_type: fields.required("spectrum_type"),
        };

        fields.finish(form)
    }
}

impl ReportPayload for ClassificationForm {
    fn generate_report_payload(&self) -> serde_json::Value {
        json!({
            "classification_report": {
                "0": {
                    "name": self.name,
                    "classifier": self.classifier,
                    "objtypeid": self.classification,
                    "redshift": self.redshift,
                    "groupid": self.group_id,
                    "remarks": self.remarks,
                    "spectra": {
                        "spectra_group": {
                            "0": {
                                "obsdate": tns_datetime(&self.observation_date),
                                "instrumentid": self.instrument_id,
                                "exptime": self.exposure_time,
                                "observer": self.observer,
                                "reducer": self.reducer,
                                "spectypeid": self.spectrum_type,
                            }
                        }
                    }
                }
            }
        })
    }
}
