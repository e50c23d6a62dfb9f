//! WHMCS login flow
//!
//! Drives a session from unauthenticated to authenticated with three
//! layered textual checks (challenge, failure phrase, logged-in phrase).
//! HTTP status alone proves nothing here: the panels answer 200 for
//! success and failure pages alike, so the flow never trusts a single
//! signal and defaults to `Failed` when nothing matches conclusively.

use tracing::{debug, info};
use url::Url;

use crate::heuristics;
use crate::html;
use crate::http::{join_url, HttpError, PanelClient};
use crate::outcome::Outcome;

const LOGIN_PATH: &str = "/index.php?rp=/login";
const CLIENT_AREA_PATH: &str = "/clientarea.php";

/// Log into the panel. Terminal outcomes: `Success`, `ChallengeRequired`,
/// `Failed`. Transport errors propagate to the caller.
pub async fn login(
    client: &PanelClient,
    base_url: &Url,
    email: &str,
    password: &str,
) -> Result<Outcome, HttpError> {
    let login_url = join_url(base_url, LOGIN_PATH)?;

    // Visit the login page for cookies and the CSRF token
    let page = client.get(&login_url).await?;
    if heuristics::is_challenge(&page.body, &page.final_url) {
        return Ok(Outcome::challenge("2FA or human verification detected on login page"));
    }

    let token = html::extract_token(&page.body);
    debug!("CSRF token found: {}", token.is_some());

    let mut payload: Vec<(String, String)> = vec![
        // WHMCS expects 'username' to carry the email address
        ("username".to_string(), email.to_string()),
        ("password".to_string(), password.to_string()),
        ("rememberme".to_string(), "on".to_string()),
    ];
    if let Some(token) = token {
        payload.push(("token".to_string(), token));
    }

    let post_url = resolve_login_target(base_url, &login_url, &page.body);
    let submitted = client.post_form(&post_url, &payload).await?;

    if heuristics::is_challenge(&submitted.body, &submitted.final_url) {
        return Ok(Outcome::challenge("2FA or human verification challenge detected after login"));
    }
    if heuristics::is_login_failure(&submitted.body) {
        return Ok(Outcome::failed("invalid credentials or login failed"));
    }

    // Confirm by fetching the client area; the submit response alone is
    // not trusted as a success signal
    let client_area_url = join_url(base_url, CLIENT_AREA_PATH)?;
    let client_area = client.get(&client_area_url).await?;

    if heuristics::is_challenge(&client_area.body, &client_area.final_url) {
        return Ok(Outcome::challenge("2FA or human verification detected in client area"));
    }
    if heuristics::is_logged_in(&client_area.body) {
        info!("login confirmed via client area");
        return Ok(Outcome::success("logged in"));
    }

    Ok(Outcome::failed("unable to confirm login"))
}

/// Pick the URL the credentials are POSTed to: the form whose action
/// mentions "login", else a form carrying username+password inputs (its
/// action, when present), else the login page itself.
fn resolve_login_target(base_url: &Url, login_url: &Url, page_html: &str) -> Url {
    let Some(root) = html::try_parse(page_html) else {
        return login_url.clone();
    };

    for form in html::extract_forms(&root) {
        let action_is_login = form
            .action
            .as_deref()
            .map(|a| a.to_ascii_lowercase().contains("/login"))
            .unwrap_or(false);
        let has_credential_inputs = form.has_field("username") && form.has_field("password");

        if action_is_login || has_credential_inputs {
            if let Some(action) = form.action.as_deref() {
                if let Ok(resolved) = base_url.join(action) {
                    return resolved;
                }
            }
            break;
        }
    }

    login_url.clone()
}
