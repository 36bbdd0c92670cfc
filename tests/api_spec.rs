use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use tns_reporter::api::create_router;
use tns_reporter::api::middleware::{AccessConfig, Permission};
use tns_reporter::db::Database;
use tns_reporter::models::*;
use tns_reporter::tns::{ReportId, TnsError, TnsRegistry};
use uuid::Uuid;

/// How the fake registry answers.
#[derive(Clone)]
enum Outcome {
    Designation(Option<String>),
    SendFails,
    ReplyFails,
    ReplyRejected(String),
}

struct FakeRegistry {
    outcome: Outcome,
    sent: Mutex<Vec<String>>,
    replies_requested: Mutex<Vec<String>>,
}

impl FakeRegistry {
    fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            sent: Mutex::new(Vec::new()),
            replies_requested: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn replies_requested(&self) -> Vec<String> {
        self.replies_requested.lock().unwrap().clone()
    }
}

fn transport_error() -> TnsError {
    let err = reqwest::Client::new()
        .get("not a url")
        .build()
        .expect_err("invalid url should not build");
    TnsError::Transport(err)
}

#[async_trait]
impl TnsRegistry for FakeRegistry {
    async fn send_report(&self, payload: &str) -> Result<ReportId, TnsError> {
        if let Outcome::SendFails = self.outcome {
            return Err(transport_error());
        }
        self.sent.lock().unwrap().push(payload.to_string());
        Ok("12345".to_string())
    }

    async fn get_report_reply(&self, report_id: &str) -> Result<Option<String>, TnsError> {
        self.replies_requested.lock().unwrap().push(report_id.to_string());
        match &self.outcome {
            Outcome::Designation(name) => Ok(name.clone()),
            Outcome::ReplyFails => Err(transport_error()),
            Outcome::ReplyRejected(msg) => Err(TnsError::Rejected(msg.clone())),
            Outcome::SendFails => unreachable!("reply requested after failed send"),
        }
    }
}

struct Harness {
    server: TestServer,
    db: Database,
    registry: Arc<FakeRegistry>,
}

fn setup_with(outcome: Outcome, access: AccessConfig) -> Harness {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let registry = FakeRegistry::new(outcome);
    let app = create_router(db.clone(), registry.clone(), access);
    Harness {
        server: TestServer::new(app).expect("Failed to create test server"),
        db,
        registry,
    }
}

fn setup(outcome: Outcome) -> Harness {
    setup_with(outcome, AccessConfig::disabled())
}

fn create_target(db: &Database, name: &str, aliases: &[&str]) -> Uuid {
    db.create_target(CreateTargetInput {
        name: name.to_string(),
        ra: Some(150.25),
        dec: Some(-12.5),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    })
    .expect("Failed to create target")
    .target
    .id
}

fn classify_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("classifier", "A. Spectroscopist"),
        ("classification", "3"),
        ("group_id", "48"),
        ("observation_date", "2024-03-02 01:00:00"),
        ("instrument_id", "10"),
        ("spectrum_type", "1"),
    ]
}

fn report_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("reporter", "A. Observer"),
        ("reporting_group_id", "48"),
        ("discovery_data_source_id", "48"),
        ("discovery_date", "2024-03-01 04:05:06"),
        ("flux", "19.2"),
        ("flux_units", "1"),
        ("filter_id", "110"),
        ("instrument_id", "196"),
        ("archive", "SDSS"),
    ]
}

fn detail_url(id: Uuid) -> String {
    format!("/api/v1/targets/{}", id)
}

fn assert_redirects_to_detail(response: &axum_test::TestResponse, id: Uuid) {
    response.assert_status(StatusCode::SEE_OTHER);
    let location = response.header("location");
    assert_eq!(location.to_str().unwrap(), detail_url(id));
}

fn aliases(db: &Database, id: Uuid) -> Vec<String> {
    db.get_target_names(id)
        .unwrap()
        .into_iter()
        .map(|n| n.name)
        .collect()
}

mod targets {
    use super::*;

    #[tokio::test]
    async fn health_is_ok() {
        let h = setup(Outcome::Designation(None));
        h.server.get("/api/v1/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn creates_and_lists_targets() {
        let h = setup(Outcome::Designation(None));

        let response = h
            .server
            .post("/api/v1/targets")
            .json(&CreateTargetInput {
                name: "ZTF24abc".to_string(),
                ra: None,
                dec: None,
                aliases: vec!["Gaia24xyz".to_string()],
            })
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: TargetWithNames = response.json();
        assert_eq!(created.names(), vec!["ZTF24abc", "Gaia24xyz"]);

        let targets: Vec<Target> = h.server.get("/api/v1/targets").await.json();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, created.target.id);
    }

    #[tokio::test]
    async fn rejects_blank_target_name() {
        let h = setup(Outcome::Designation(None));

        let response = h
            .server
            .post("/api/v1/targets")
            .json(&CreateTargetInput {
                name: "  ".to_string(),
                ra: None,
                dec: None,
                aliases: vec![],
            })
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn detail_returns_404_for_unknown_target() {
        let h = setup(Outcome::Designation(None));
        h.server
            .get(&detail_url(Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn detail_shows_messages_once() {
        let h = setup(Outcome::Designation(None));
        let id = create_target(&h.db, "AT2024xyz", &[]);
        h.db.add_message(id, MessageLevel::Info, "hello").unwrap();

        let detail: TargetDetail = h.server.get(&detail_url(id)).await.json();
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.messages[0].text, "hello");

        let detail: TargetDetail = h.server.get(&detail_url(id)).await.json();
        assert!(detail.messages.is_empty());
    }
}

mod report_page {
    use super::*;

    async fn default_form(name: &str, aliases: &[&str]) -> FormKind {
        let h = setup(Outcome::Designation(None));
        let id = create_target(&h.db, name, aliases);

        let response = h.server.get(&format!("/api/v1/targets/{}/tns", id)).await;
        response.assert_status_ok();
        let context: ReportPageContext = response.json();
        assert_eq!(context.target.target.id, id);
        context.default_form
    }

    #[tokio::test]
    async fn opens_on_report_without_designation() {
        assert_eq!(default_form("ZTF24abc", &["Gaia24xyz"]).await, FormKind::Report);
    }

    #[tokio::test]
    async fn opens_on_classify_for_at_name() {
        assert_eq!(default_form("ZTF24abc", &["at2024xyz"]).await, FormKind::Classify);
    }

    #[tokio::test]
    async fn opens_on_supernova_when_sn_follows_at() {
        assert_eq!(default_form("AT2023abc", &["SN2023abc"]).await, FormKind::Supernova);
    }

    #[tokio::test]
    async fn opens_on_supernova_when_sn_precedes_at() {
        assert_eq!(default_form("SN2023abc", &["AT2023abc"]).await, FormKind::Supernova);
    }

    #[tokio::test]
    async fn returns_404_for_unknown_target() {
        let h = setup(Outcome::Designation(None));
        h.server
            .get(&format!("/api/v1/targets/{}/tns", Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }
}

mod submission {
    use super::*;

    #[tokio::test]
    async fn invalid_form_records_error_without_calling_tns() {
        let h = setup(Outcome::Designation(Some("SN2024xyz".to_string())));
        let id = create_target(&h.db, "AT2024xyz", &[]);

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/classify", id))
            .form(&vec![("classifier", "A. Spectroscopist")])
            .await;

        assert_redirects_to_detail(&response, id);
        assert!(h.registry.sent().is_empty());
        assert!(h.registry.replies_requested().is_empty());

        let detail: TargetDetail = h.server.get(&detail_url(id)).await.json();
        assert_eq!(detail.target.target.name, "AT2024xyz");
        assert!(detail.target.aliases.is_empty());
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.messages[0].level, MessageLevel::Error);
        assert!(detail.messages[0]
            .text
            .starts_with("The following error was encountered when submitting to the TNS: "));
        assert!(detail.messages[0].text.contains("\"spectrum_type\""));
    }

    #[tokio::test]
    async fn designation_renames_target_and_keeps_alias() {
        let h = setup(Outcome::Designation(Some("SN2024xyz".to_string())));
        let id = create_target(&h.db, "AT2024xyz", &[]);

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/classify", id))
            .form(&classify_fields())
            .await;

        assert_redirects_to_detail(&response, id);
        assert_eq!(h.registry.replies_requested(), vec!["12345"]);

        let sent = h.registry.sent();
        assert_eq!(sent.len(), 1);
        let payload: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(payload["classification_report"]["0"]["name"], "2024xyz");

        let target = h.db.get_target(id).unwrap().unwrap();
        assert_eq!(target.name, "SN2024xyz");
        assert_eq!(aliases(&h.db, id), vec!["AT2024xyz"]);

        let messages = h.db.take_messages(id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, MessageLevel::Success);
    }

    #[tokio::test]
    async fn report_uses_target_coordinates_and_name() {
        let h = setup(Outcome::Designation(Some("AT2024new".to_string())));
        let id = create_target(&h.db, "ZTF24abc", &[]);

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/report", id))
            .form(&report_fields())
            .await;

        assert_redirects_to_detail(&response, id);
        let payload: serde_json::Value = serde_json::from_str(&h.registry.sent()[0]).unwrap();
        let report = &payload["at_report"]["0"];
        assert_eq!(report["internal_name"], "ZTF24abc");
        assert_eq!(report["ra"]["value"], 150.25);
        assert_eq!(report["dec"]["value"], -12.5);

        assert_eq!(h.db.get_target(id).unwrap().unwrap().name, "AT2024new");
        assert_eq!(aliases(&h.db, id), vec!["ZTF24abc"]);
    }

    #[tokio::test]
    async fn reply_without_name_leaves_target_unchanged() {
        let h = setup(Outcome::Designation(None));
        let id = create_target(&h.db, "AT2024xyz", &["ZTF24abc"]);

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/classify", id))
            .form(&classify_fields())
            .await;

        assert_redirects_to_detail(&response, id);
        assert_eq!(h.registry.sent().len(), 1);
        assert_eq!(h.db.get_target(id).unwrap().unwrap().name, "AT2024xyz");
        assert_eq!(aliases(&h.db, id), vec!["ZTF24abc"]);

        let messages = h.db.take_messages(id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, MessageLevel::Info);
    }

    #[tokio::test]
    async fn transport_error_leaves_target_unchanged() {
        let h = setup(Outcome::SendFails);
        let id = create_target(&h.db, "AT2024xyz", &[]);

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/classify", id))
            .form(&classify_fields())
            .await;

        assert_redirects_to_detail(&response, id);
        assert!(h.registry.replies_requested().is_empty());
        assert_eq!(h.db.get_target(id).unwrap().unwrap().name, "AT2024xyz");
        assert!(aliases(&h.db, id).is_empty());

        let messages = h.db.take_messages(id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, MessageLevel::Error);
        assert!(messages[0]
            .text
            .starts_with("TNS returned an error: HTTP request failed"));
    }

    #[tokio::test]
    async fn reply_transport_error_leaves_target_unchanged() {
        let h = setup(Outcome::ReplyFails);
        let id = create_target(&h.db, "AT2024xyz", &["ZTF24abc"]);

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/classify", id))
            .form(&classify_fields())
            .await;

        assert_redirects_to_detail(&response, id);
        assert_eq!(h.registry.sent().len(), 1);
        assert_eq!(h.registry.replies_requested(), vec!["12345"]);
        assert_eq!(h.db.get_target(id).unwrap().unwrap().name, "AT2024xyz");
        assert_eq!(aliases(&h.db, id), vec!["ZTF24abc"]);

        let messages = h.db.take_messages(id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, MessageLevel::Error);
        assert!(messages[0]
            .text
            .starts_with("TNS returned an error: HTTP request failed"));
    }

    #[tokio::test]
    async fn rejected_reply_leaves_target_unchanged() {
        let h = setup(Outcome::ReplyRejected("name already taken".to_string()));
        let id = create_target(&h.db, "SN2024xyz", &["AT2024xyz"]);

        let mut fields = classify_fields();
        fields.push(("remarks", "Revised host redshift"));
        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/supernova", id))
            .form(&fields)
            .await;

        assert_redirects_to_detail(&response, id);
        assert_eq!(h.db.get_target(id).unwrap().unwrap().name, "SN2024xyz");
        assert_eq!(aliases(&h.db, id), vec!["AT2024xyz"]);

        let messages = h.db.take_messages(id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].text,
            "TNS returned an error: Bad request: name already taken"
        );
    }

    #[tokio::test]
    async fn unknown_form_kind_is_rejected() {
        let h = setup(Outcome::Designation(None));
        let id = create_target(&h.db, "AT2024xyz", &[]);

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/bogus", id))
            .form(&classify_fields())
            .await;

        response.assert_status_bad_request();
        assert!(h.registry.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_target_returns_404() {
        let h = setup(Outcome::Designation(None));

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/classify", Uuid::new_v4()))
            .form(&classify_fields())
            .await;

        response.assert_status_not_found();
        assert!(h.registry.sent().is_empty());
    }
}

mod access {
    use super::*;

    fn keyed() -> AccessConfig {
        AccessConfig::disabled()
            .with_key("viewer", [Permission::ViewTarget])
            .with_key("editor", [Permission::ViewTarget, Permission::ChangeTarget])
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let h = setup_with(Outcome::Designation(None), keyed());
        let id = create_target(&h.db, "AT2024xyz", &[]);

        h.server
            .get(&format!("/api/v1/targets/{}/tns", id))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_needs_no_key() {
        let h = setup_with(Outcome::Designation(None), keyed());
        h.server.get("/api/v1/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn viewer_can_open_the_report_page() {
        let h = setup_with(Outcome::Designation(None), keyed());
        let id = create_target(&h.db, "AT2024xyz", &[]);

        h.server
            .get(&format!("/api/v1/targets/{}/tns", id))
            .authorization_bearer("viewer")
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn viewer_cannot_submit() {
        let h = setup_with(Outcome::Designation(Some("SN2024xyz".to_string())), keyed());
        let id = create_target(&h.db, "AT2024xyz", &[]);

        h.server
            .post(&format!("/api/v1/targets/{}/tns/classify", id))
            .authorization_bearer("viewer")
            .form(&classify_fields())
            .await
            .assert_status(StatusCode::FORBIDDEN);

        assert!(h.registry.sent().is_empty());
        assert_eq!(h.db.get_target(id).unwrap().unwrap().name, "AT2024xyz");
    }

    #[tokio::test]
    async fn editor_can_submit() {
        let h = setup_with(Outcome::Designation(Some("SN2024xyz".to_string())), keyed());
        let id = create_target(&h.db, "AT2024xyz", &[]);

        let response = h
            .server
            .post(&format!("/api/v1/targets/{}/tns/classify", id))
            .authorization_bearer("editor")
            .form(&classify_fields())
            .await;

        assert_redirects_to_detail(&response, id);
        assert_eq!(h.db.get_target(id).unwrap().unwrap().name, "SN2024xyz");
    }
}
