//! Flow tests against a mock panel: transport retry, login outcomes,
//! discovery fallback, and full runs through the orchestrator.

use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use whmcs_checkin::auth;
use whmcs_checkin::notify::TelegramNotifier;
use whmcs_checkin::checkin;
use whmcs_checkin::config::{Account, Config, Pacing};
use whmcs_checkin::http::{PanelClient, RetryPolicy};
use whmcs_checkin::outcome::Status;
use whmcs_checkin::runner;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        backoff_base: 1.0,
        jitter_ms: 5,
    }
}

async fn client_for(server: &MockServer) -> (PanelClient, Url) {
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = PanelClient::new(&base_url).unwrap().with_retry(fast_retry());
    (client, base_url)
}

const LOGIN_PAGE: &str = r#"<html><body>
    <form method="post" action="/index.php?rp=/login">
        <input type="text" name="username">
        <input type="password" name="password">
        <input type="hidden" name="token" value="csrf-token-1">
    </form>
</body></html>"#;

/// Mount the standard login page at /index.php?rp=/login.
async fn mount_login_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("rp", "/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;
}

// ---- transport retry ----

#[tokio::test]
async fn retry_recovers_after_two_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let url = base_url.join("/flaky").unwrap();

    let page = client.get(&url).await.expect("third attempt should succeed");
    assert_eq!(page.status.as_u16(), 200);
    assert_eq!(page.body, "recovered");
}

#[tokio::test]
async fn retry_exhaustion_surfaces_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let url = base_url.join("/down").unwrap();

    let err = client.get(&url).await.expect_err("all attempts exhausted");
    assert!(err.to_string().contains("500"), "got: {}", err);
}

#[tokio::test]
async fn client_errors_are_returned_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let url = base_url.join("/missing").unwrap();

    let page = client.get(&url).await.expect("4xx is not an error");
    assert_eq!(page.status.as_u16(), 404);
}

// ---- authentication flow ----

#[tokio::test]
async fn challenge_on_login_page_short_circuits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("rp", "/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>Please complete the security check</html>"),
        )
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = auth::login(&client, &base_url, "a@b.c", "pw").await.unwrap();
    assert_eq!(outcome.status, Status::ChallengeRequired);
}

#[tokio::test]
async fn failure_phrase_after_submit_means_failed() {
    let server = MockServer::start().await;
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(query_param("rp", "/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>Login Details Incorrect</html>"),
        )
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = auth::login(&client, &base_url, "a@b.c", "wrong").await.unwrap();
    assert_eq!(outcome.status, Status::Failed);
    assert_eq!(outcome.detail, "invalid credentials or login failed");
}

#[tokio::test]
async fn logout_link_on_dashboard_confirms_login() {
    let server = MockServer::start().await;
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(query_param("rp", "/login"))
        .and(body_string_contains("token=csrf-token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>redirecting...</html>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/clientarea.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><a href="/logout.php">Logout</a></html>"#),
        )
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = auth::login(&client, &base_url, "a@b.c", "pw").await.unwrap();
    assert_eq!(outcome.status, Status::Success);
}

#[tokio::test]
async fn unconfirmed_login_is_conservatively_failed() {
    let server = MockServer::start().await;
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok?</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clientarea.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nothing familiar</html>"))
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = auth::login(&client, &base_url, "a@b.c", "pw").await.unwrap();
    assert_eq!(outcome.status, Status::Failed);
    assert_eq!(outcome.detail, "unable to confirm login");
}

// ---- check-in discovery + execution ----

#[tokio::test]
async fn checkin_via_dashboard_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clientarea.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><a href="/daily">每日签到</a></html>"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/daily"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>签到成功 +5</html>"))
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = checkin::perform_checkin(&client, &base_url, false).await.unwrap();
    assert_eq!(outcome.status, Status::Success);
}

#[tokio::test]
async fn checkin_form_posts_with_fresh_token() {
    let server = MockServer::start().await;

    let dashboard = r#"<html>
        <input type="hidden" name="token" value="dash-token">
        <form method="post" action="/do-checkin"><button>签到</button></form>
    </html>"#;
    Mock::given(method("GET"))
        .and(path("/clientarea.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(dashboard))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/do-checkin"))
        .and(body_string_contains("token=dash-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"message":"签到成功"}"#),
        )
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = checkin::perform_checkin(&client, &base_url, false).await.unwrap();
    assert_eq!(outcome.status, Status::Success);
}

#[tokio::test]
async fn probe_fallback_finds_conventional_endpoint() {
    let server = MockServer::start().await;

    // Probe target first so it outranks the generic dashboard mock
    Mock::given(method("GET"))
        .and(path("/clientarea.php"))
        .and(query_param("action", "qiandao"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>签到成功 积分+1</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clientarea.php"))
        .and(query_param_is_missing("action"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no entry here</html>"))
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = checkin::perform_checkin(&client, &base_url, true).await.unwrap();
    assert_eq!(outcome.status, Status::Success);
}

#[tokio::test]
async fn probing_with_no_relevant_endpoint_is_failed() {
    let server = MockServer::start().await;

    // Nothing on this panel mentions check-in, probes included
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>generic page</html>"))
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = checkin::perform_checkin(&client, &base_url, true).await.unwrap();
    assert_eq!(outcome.status, Status::Failed);
    assert_eq!(outcome.detail, "check-in entry not found");
}

#[tokio::test]
async fn missing_entry_without_probing_is_failed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clientarea.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no entry here</html>"))
        .mount(&server)
        .await;

    let (client, base_url) = client_for(&server).await;
    let outcome = checkin::perform_checkin(&client, &base_url, false).await.unwrap();
    assert_eq!(outcome.status, Status::Failed);
    assert_eq!(outcome.detail, "check-in entry not found");
}

// ---- telegram delivery ----

#[tokio::test]
async fn telegram_send_posts_to_bot_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/botTOKEN123/sendMessage"))
        .and(body_string_contains("每日签到结果"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new("TOKEN123", "42").with_api_base(server.uri());
    notifier
        .send("2026-08-30 每日签到结果\n- 成功: a***e@example.com")
        .await
        .expect("delivery should succeed");
}

#[tokio::test]
async fn telegram_api_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"ok":false}"#))
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new("TOKEN123", "42").with_api_base(server.uri());
    let err = notifier.send("hello").await.expect_err("403 is an error");
    assert!(err.to_string().contains("403"), "got: {}", err);
}

// ---- end-to-end runs ----

fn account(email: &str, password: &str) -> Account {
    serde_json::from_value(serde_json::json!({
        "email": email,
        "password": password,
    }))
    .unwrap()
}

fn test_config(server: &MockServer, accounts: Vec<Account>) -> Config {
    Config {
        accounts,
        default_base_url: server.uri(),
        telegram: None,
        probe_fallback: false,
        pacing: Pacing::none(),
    }
}

/// Mount a panel where `good@example.com` can log in and check in, and
/// any other credentials bounce.
async fn mount_full_panel(server: &MockServer, checkin_body: &str) {
    mount_login_page(server).await;

    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(query_param("rp", "/login"))
        .and(body_string_contains("username=good%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>welcome</html>"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(query_param("rp", "/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>Login Details Incorrect</html>"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/clientarea.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><a href="/logout.php">Logout</a><a href="/daily">签到</a></html>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/daily"))
        .respond_with(ResponseTemplate::new(200).set_body_string(checkin_body.to_string()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn mixed_run_reports_both_accounts_and_is_not_all_failed() {
    let server = MockServer::start().await;
    mount_full_panel(&server, "<html>签到成功</html>").await;

    let config = test_config(
        &server,
        vec![
            account("good@example.com", "right-password"),
            account("bad@example.com", "wrong-password"),
        ],
    );

    let report = runner::run(&config).await;
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].label, "g**d@example.com");
    assert_eq!(report.results[0].outcome.status, Status::Success);
    assert_eq!(report.results[1].outcome.status, Status::Failed);
    assert!(!report.all_hard_failed());

    let summary = report.summary();
    assert!(summary.contains("- 成功: g**d@example.com"));
    assert!(summary.contains("- 失败: b*d@example.com"));
}

#[tokio::test]
async fn second_run_of_the_day_reports_already_done() {
    let server = MockServer::start().await;
    mount_full_panel(&server, "<html>今日已签到，签到成功记录保留</html>").await;

    let config = test_config(&server, vec![account("good@example.com", "right-password")]);

    let report = runner::run(&config).await;
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].outcome.status, Status::AlreadyDone);
}

#[tokio::test]
async fn account_without_credentials_fails_without_network() {
    let server = MockServer::start().await;
    // No mocks mounted: any request would 404 and the login would fail
    // differently than the expected detail below
    let config = test_config(&server, vec![account("", "")]);

    let report = runner::run(&config).await;
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].outcome.status, Status::Failed);
    assert_eq!(report.results[0].outcome.detail, "missing credentials");
    assert!(report.all_hard_failed());
}
