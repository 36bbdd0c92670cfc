use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::{tns_datetime, Fields, FormErrors, ReportPayload};

/// TNS archive id meaning "other": the archive must be described in remarks.
const OTHER_ARCHIVE: &str = "0";

/// An AT report announcing a new transient to the TNS.
#[derive(Debug, Clone)]
pub struct AtReportForm {
    pub internal_name: Option<String>,
    pub ra: f64,
    pub dec: f64,
    pub reporter: String,
    pub reporting_group_id: i64,
    pub discovery_data_source_id: i64,
    pub discovery_date: DateTime<Utc>,
    pub at_type: i64,
    pub flux: f64,
    pub flux_error: Option<f64>,
    pub flux_units: i64,
    pub limiting_flux: Option<f64>,
    pub filter_id: i64,
    pub instrument_id: i64,
    pub observer: Option<String>,
    pub archive: String,
    pub archival_remarks: Option<String>,
}

impl AtReportForm {
    pub fn from_fields(raw: &HashMap<String, String>) -> Result<Self, FormErrors> {
        let mut fields = Fields::new(raw);

        let ra = fields.required_float("ra");
        fields.check("ra", (0.0..360.0).contains(&ra), "RA must be in [0, 360) degrees.");
        let dec = fields.required_float("dec");
        fields.check("dec", (-90.0..=90.0).contains(&dec), "Dec must be in [-90, 90] degrees.");

        let archive = fields.text("archive").unwrap_or_else(|| OTHER_ARCHIVE.to_string());
        let archival_remarks = fields.text("archival_remarks");
        fields.check(
            "archival_remarks",
            archive != OTHER_ARCHIVE || archival_remarks.is_some(),
            "Describe the archive when reporting against 'other'.",
        );

        let form = Self {
            internal_name: fields.text("internal_name"),
            ra,
            dec,
            reporter: fields.required_text("reporter"),
            reporting_group_id: fields.required("reporting_group_id"),
            discovery_data_source_id: fields.required("discovery_data_source_id"),
            discovery_date: fields.required_datetime("discovery_date"),
            at_type: fields.parse("at_type").unwrap_or(1),
            flux: fields.required_float("flux"),
            flux_error: fields.float("flux_error"),
            flux_units: fields.required("flux_units"),
            limiting_flux: fields.float("limiting_flux"),
            filter_id: fields.required("filter_id"),
            instrument_id: fields.required("instrument_id"),
            observer: fields.text("observer"),
            archive,
            archival_remarks,
        };

        fields.finish(form)
    }
}

impl ReportPayload for AtReportForm {
    fn generate_report_payload(&self) -> serde_json::Value {
        let discovery = tns_datetime(&self.discovery_date);
        json!({
            "at_report": {
                "0": {
                    "ra": { "value": self.ra, "error": null, "units": "deg" },
                    "dec": { "value": self.dec, "error": null, "units": "deg" },
                    "reporting_group_id": self.reporting_group_id,
                    "discovery_data_source_id": self.discovery_data_source_id,
                    "reporter": self.reporter,
                    "discovery_datetime": discovery,
                    "at_type": self.at_type,
                    "internal_name": self.internal_name,
                    "non_detection": {
                        "archiveid": self.archive,
                        "archival_remarks": self.archival_remarks,
                    },
                    "photometry": {
                        "photometry_group": {
                            "0": {
                                "obsdate": discovery,
                                "flux": self.flux,
                                "flux_error": self.flux_error,
                                "flux_units": self.flux_units,
                                "limiting_flux": self.limiting_flux,
                                "filter_value": self.filter_id,
                                "instrument_value": self.instrument_id,
                                "observer": self.observer,
                            }
                        }
                    }
                }
            }
        })
    }
}
