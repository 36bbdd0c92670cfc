use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An astronomical object of interest.
///
/// The canonical `name` is mutable: when the TNS assigns an official
/// designation the target is renamed and the superseded name is kept as a
/// [`TargetName`] alias so it stays searchable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub name: String,
    /// Right ascension in degrees.
    pub ra: Option<f64>,
    /// Declination in degrees.
    pub dec: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A historical or alternative name for a target.
///
/// Aliases are immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetName {
    pub id: Uuid,
    pub target_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTargetInput {
    pub name: String,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    /// Extra names to register as aliases, in order.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A target with its aliases, used for detailed responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetWithNames {
    #[serde(flatten)]
    pub target: Target,
    pub aliases: Vec<TargetName>,
}

impl TargetWithNames {
    /// Every known name: the canonical name first, then aliases in the
    /// order they were recorded.
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(self.target.name.as_str())
            .chain(self.aliases.iter().map(|a| a.name.as_str()))
            .collect()
    }
}
