use serde::{Deserialize, Serialize};

use super::{Message, TargetWithNames};

/// The three TNS sub-forms offered for a target.
///
/// - `Report`: an AT report registering a new transient
/// - `Classify`: a classification report for an object with an AT name
/// - `Supernova`: a classification report for an object already designated SN
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    Report,
    Classify,
    Supernova,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Classify => "classify",
            Self::Supernova => "supernova",
        }
    }

    /// Pick the tab to open first from a target's names.
    ///
    /// An `AT` name suggests classifying, but keeps looking. The first `SN`
    /// name wins outright: the object has already been classified.
    pub fn default_for<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut kind = Self::Report;
        for name in names {
            let name = name.to_uppercase();
            if name.starts_with("AT") {
                kind = Self::Classify;
            }
            if name.starts_with("SN") {
                kind = Self::Supernova;
                break;
            }
        }
        kind
    }
}

/// Render context for the TNS report page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPageContext {
    pub target: TargetWithNames,
    pub default_form: FormKind,
}

/// Target detail page, with any messages left by a previous submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDetail {
    #[serde(flatten)]
    pub target: TargetWithNames,
    pub messages: Vec<Message>,
}
