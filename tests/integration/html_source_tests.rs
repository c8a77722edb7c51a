//! HTML directory sources against mock HTTP servers

use crate::common::Workspace;
use vespers::config::{Config, SelectorConfig, SourceEntry, SourceKind};
use vespers::crawler::Engine;
use vespers::state::{SessionStatus, TaskStatus};
use vespers::storage::{ChurchFilter, Storage};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn directory_source(base_url: &str) -> SourceEntry {
    SourceEntry {
        id: "oca".to_string(),
        jurisdiction: "Orthodox Church in America".to_string(),
        urls: vec![format!("{}/parishes", base_url)],
        kind: SourceKind::HtmlDirectory,
        selectors: SelectorConfig {
            item: ".parish".to_string(),
            name: ".name".to_string(),
            address: Some(".street".to_string()),
            city: Some(".city".to_string()),
            state: Some(".state".to_string()),
            zip: Some(".zip".to_string()),
            clergy: Some(".rector".to_string()),
            website: Some("a.site".to_string()),
            phone: Some("a.phone".to_string()),
            email: Some("a.email".to_string()),
        },
    }
}

fn config_for(ws: &Workspace, server: &MockServer) -> Config {
    let mut config = ws.config();
    config.sources = vec![directory_source(&server.uri())];
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Parishes</title></head><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

const TWO_PARISHES: &str = r#"
    <div class="parish">
        <h3 class="name">St. Nicholas  Cathedral</h3>
        <span class="street">1 Main St</span>
        <span class="city">Chicago</span>
        <span class="state">Illinois</span>
        <span class="zip">60601-1234</span>
        <span class="rector">Fr. Peter Jones</span>
        <a class="phone" href="tel:+1-312-555-0100">Call</a>
        <a class="email" href="mailto:Office@StNicholas.example.org">Email</a>
    </div>
    <div class="parish">
        <h3 class="name">Holy Trinity</h3>
        <span class="city">Boston</span>
        <span class="state">ma</span>
    </div>
"#;

#[tokio::test]
async fn test_directory_page_is_extracted_and_cleaned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parishes"))
        .respond_with(html(TWO_PARISHES))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let result = Engine::new(config_for(&ws, &server), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.totals.found, 2);
    assert_eq!(result.totals.new, 2);
    assert_eq!(result.tasks[0].candidates, 2);

    let churches = ws
        .storage()
        .search_churches(&ChurchFilter {
            city: Some("Chicago".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(churches.len(), 1);

    let cathedral = &churches[0];
    assert_eq!(cathedral.name, "Saint Nicholas Cathedral");
    assert_eq!(cathedral.state.as_deref(), Some("IL"));
    assert_eq!(cathedral.zip_code.as_deref(), Some("60601"));
    assert_eq!(cathedral.clergy_contact.as_deref(), Some("Father Peter Jones"));
    assert_eq!(cathedral.contact_phone.as_deref(), Some("(312) 555-0100"));
    assert_eq!(
        cathedral.contact_email.as_deref(),
        Some("office@stnicholas.example.org")
    );
    assert_eq!(
        cathedral.source_url.as_deref(),
        Some(format!("{}/parishes", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_robots_denial_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/parishes"))
        .respond_with(html(TWO_PARISHES))
        .expect(0)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let result = Engine::new(config_for(&ws, &server), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Failed);
    assert_eq!(result.tasks[0].status, TaskStatus::Failed);
    assert_eq!(result.tasks[0].attempts, 1);
    assert_eq!(result.totals.errors, 1);
    assert!(result.errors[0].message.contains("robots.txt"));
}

#[tokio::test]
async fn test_server_errors_retried_up_to_bound() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parishes"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let result = Engine::new(config_for(&ws, &server), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Failed);
    assert_eq!(result.tasks[0].attempts, 3);
    assert_eq!(result.errors[0].kind, "fetch");

    let stored = ws.storage().errors_for_session(&result.session_id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].source, "oca");
}

#[tokio::test]
async fn test_non_html_payload_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parishes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("{\"parishes\": []}", "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let result = Engine::new(config_for(&ws, &server), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(result.status, SessionStatus::Failed);
    assert_eq!(result.errors[0].kind, "parse");
}

#[tokio::test]
async fn test_unreachable_website_rejected_by_live_check() {
    let server = MockServer::start().await;
    let body = format!(
        r#"<div class="parish">
            <h3 class="name">Saint Sava</h3>
            <span class="city">Denver</span>
            <a class="site" href="{}/gone">Website</a>
        </div>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/parishes"))
        .respond_with(html(&body))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/parishes"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let mut config = config_for(&ws, &server);
    config.engine.live_check_urls = true;

    let result = Engine::new(config, "hash".to_string()).unwrap().run().await.unwrap();

    // Candidate rejects do not downgrade the session
    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.totals.found, 1);
    assert_eq!(result.totals.errors, 1);
    assert_eq!(result.errors[0].kind, "validation");
    assert!(result.errors[0].message.starts_with("unreachable_url"));
    assert_eq!(ws.storage().count_churches().unwrap(), 0);
}
