//! Check-in execution and result classification
//!
//! Performs a discovered action and reads the tea leaves of the response.
//! "Already checked in" is always tested before generic success wording:
//! the already-done page commonly restates the past success message.

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::checkin::discover::{self, ActionMethod};
use crate::heuristics;
use crate::html;
use crate::http::{join_url, HttpError, PageResponse, PanelClient};
use crate::outcome::Outcome;

const CLIENT_AREA_PATH: &str = "/clientarea.php";

/// Discover and perform the daily check-in on an authenticated session.
pub async fn perform_checkin(
    client: &PanelClient,
    base_url: &Url,
    probe_fallback: bool,
) -> Result<Outcome, HttpError> {
    let dashboard_url = join_url(base_url, CLIENT_AREA_PATH)?;
    let dashboard = client.get(&dashboard_url).await?;

    let mut action = discover::find_checkin_action(base_url, &dashboard.body);
    if action.is_none() && probe_fallback {
        debug!("no check-in markup found, probing known endpoints");
        action = discover::probe_known_endpoints(client, base_url).await;
    }
    let Some(mut action) = action else {
        return Ok(Outcome::failed("check-in entry not found"));
    };

    let response = match action.method {
        ActionMethod::Post => {
            // The panel's forms want a CSRF token; pull a fresh one from
            // the dashboard when discovery didn't capture it
            if !action.has_field("token") {
                if let Some(token) = html::extract_token(&dashboard.body) {
                    action.form.push(("token".to_string(), token));
                }
            }
            client.post_form(&action.url, &action.form).await?
        }
        ActionMethod::Get => client.get(&action.url).await?,
    };

    Ok(classify_response(&response))
}

/// Classify a check-in response. Pure over the response contents, so the
/// phrase ordering rules are testable without a network.
pub fn classify_response(response: &PageResponse) -> Outcome {
    if response.is_json() {
        if let Some(outcome) = classify_json(&response.body) {
            return outcome;
        }
        // Unrecognized JSON falls through to the text heuristics
    }

    if heuristics::is_already_checked_in(&response.body) {
        return Outcome::already_done("already checked in today");
    }
    if heuristics::is_checkin_success(&response.body) {
        return Outcome::success("check-in success");
    }
    if heuristics::is_challenge(&response.body, &response.final_url) {
        return Outcome::challenge("2FA or human verification encountered during check-in");
    }

    Outcome::failed("unable to determine check-in result")
}

fn classify_json(body: &str) -> Option<Outcome> {
    let json: Value = serde_json::from_str(body).ok()?;

    let msg = ["message", "msg", "status"]
        .iter()
        .find_map(|k| json.get(k).and_then(Value::as_str))
        .unwrap_or("");

    if !msg.is_empty() {
        if heuristics::json_msg_already(msg) {
            return Some(Outcome::already_done(msg));
        }
        if heuristics::json_msg_success(msg) {
            return Some(Outcome::success(msg));
        }
    }

    // Fall back to boolean-ish flags
    for key in ["success", "ok", "result"] {
        if truthy(json.get(key)) {
            let detail = if msg.is_empty() { "OK" } else { msg };
            return Some(Outcome::success(detail));
        }
    }

    None
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Status;
    use reqwest::StatusCode;

    fn html_response(body: &str) -> PageResponse {
        PageResponse {
            status: StatusCode::OK,
            final_url: "https://panel.example/checkin".to_string(),
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.to_string(),
        }
    }

    fn json_response(body: &str) -> PageResponse {
        PageResponse {
            content_type: Some("application/json".to_string()),
            ..html_response(body)
        }
    }

    #[test]
    fn test_already_wins_over_success_text() {
        // The already-done page restates the old success message; order matters
        let page = html_response("<p>今日已签到</p><p>上次签到成功 +5 积分</p>");
        assert_eq!(classify_response(&page).status, Status::AlreadyDone);
    }

    #[test]
    fn test_html_success() {
        let page = html_response("<div class=\"alert\">签到成功，获得 3 积分</div>");
        assert_eq!(classify_response(&page).status, Status::Success);
    }

    #[test]
    fn test_html_challenge() {
        let page = html_response("<div>Please complete the security check</div>");
        assert_eq!(classify_response(&page).status, Status::ChallengeRequired);
    }

    #[test]
    fn test_html_ambiguous_is_failed() {
        let page = html_response("<html><body>Client Dashboard</body></html>");
        let outcome = classify_response(&page);
        assert_eq!(outcome.status, Status::Failed);
        assert_eq!(outcome.detail, "unable to determine check-in result");
    }

    #[test]
    fn test_json_message_already_before_success() {
        let page = json_response(r#"{"message":"今日已签到，明日再来"}"#);
        assert_eq!(classify_response(&page).status, Status::AlreadyDone);
    }

    #[test]
    fn test_json_msg_field_success() {
        let page = json_response(r#"{"msg":"签到成功"}"#);
        let outcome = classify_response(&page);
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.detail, "签到成功");
    }

    #[test]
    fn test_json_boolean_flag_fallback() {
        let page = json_response(r#"{"success":true,"points":5}"#);
        let outcome = classify_response(&page);
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.detail, "OK");
    }

    #[test]
    fn test_unrecognized_json_falls_through_to_text() {
        let page = json_response(r#"{"state":"已签到"}"#);
        // No known field, but the body text still carries the phrase
        assert_eq!(classify_response(&page).status, Status::AlreadyDone);
    }
}
