use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
    Extension, Form, Json,
};
use uuid::Uuid;

use super::{internal_error, target_not_found};
use crate::api::middleware::{Caller, Permission};
use crate::api::AppState;
use crate::db::Database;
use crate::forms::{self, ReportPayload, TnsForm};
use crate::models::*;
use crate::tns::{TnsError, TnsRegistry};

fn target_detail(id: Uuid) -> Redirect {
    Redirect::to(&format!("/api/v1/targets/{}", id))
}

/// Render context for the TNS report page, opening on the tab that best
/// fits the target's current names.
pub async fn show_report_form(
    State(db): State<Database>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportPageContext>, (StatusCode, String)> {
    caller.require(Permission::ViewTarget)?;
    let target = db
        .get_target_with_names(id)
        .map_err(internal_error)?
        .ok_or_else(target_not_found)?;

    let default_form = FormKind::default_for(target.names());
    tracing::debug!("Report page for {} opens on {}", target.target.name, default_form.as_str());

    Ok(Json(ReportPageContext {
        target,
        default_form,
    }))
}

/// Validate a sub-form, submit it to the TNS and adopt the designation the
/// TNS assigns. Always ends on the target detail page; problems are left
/// there as messages.
pub async fn submit_report(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, kind)): Path<(Uuid, FormKind)>,
    Form(submitted): Form<HashMap<String, String>>,
) -> Result<Redirect, (StatusCode, String)> {
    caller.require(Permission::ChangeTarget)?;
    let db = &state.db;
    let target = db
        .get_target_with_names(id)
        .map_err(internal_error)?
        .ok_or_else(target_not_found)?;

    let mut fields = forms::initial_fields(kind, &target);
    fields.extend(submitted.into_iter().filter(|(_, v)| !v.trim().is_empty()));

    let form = match TnsForm::from_fields(kind, &fields) {
        Ok(form) => form,
        Err(errors) => {
            tracing::warn!("Invalid {} form for {}: {}", kind.as_str(), target.target.name, errors);
            db.add_message(
                id,
                MessageLevel::Error,
                format!(
                    "The following error was encountered when submitting to the TNS: {}",
                    errors.to_json()
                ),
            )
            .map_err(internal_error)?;
            return Ok(target_detail(id));
        }
    };

    match submit(state.registry.as_ref(), &form).await {
        Ok(Some(name)) => record_designation(db, id, &name).map_err(internal_error)?,
        Ok(None) => {
            db.add_message(
                id,
                MessageLevel::Info,
                "The TNS accepted the report without assigning a designation.",
            )
            .map_err(internal_error)?;
        }
        Err(e) => {
            tracing::error!("TNS submission for {} failed: {}", target.target.name, e);
            db.add_message(id, MessageLevel::Error, format!("TNS returned an error: {}", e))
                .map_err(internal_error)?;
        }
    }

    Ok(target_detail(id))
}

/// Send the report and wait for its outcome.
async fn submit(registry: &dyn TnsRegistry, form: &TnsForm) -> Result<Option<String>, TnsError> {
    let payload = form.generate_report_payload().to_string();
    let report_id = registry.send_report(&payload).await?;
    tracing::info!("Submitted {} report, TNS report id {}", form.kind().as_str(), report_id);

    let name = registry.get_report_reply(&report_id).await?;
    Ok(name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()))
}

/// Rename the target to its TNS designation, keeping the old name as an alias.
fn record_designation(db: &Database, id: Uuid, name: &str) -> anyhow::Result<()> {
    match db.rename_target(id, name)? {
        Some(alias) => {
            tracing::info!("Renamed target {} from {} to {}", id, alias.name, name);
            db.add_message(
                id,
                MessageLevel::Success,
                format!("The TNS designated this target {}; {} kept as an alias.", name, alias.name),
            )?;
        }
        None => {
            db.add_message(
                id,
                MessageLevel::Success,
                format!("The TNS confirmed the designation {}.", name),
            )?;
        }
    }
    Ok(())
}
