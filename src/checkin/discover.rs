//! Check-in trigger discovery
//!
//! Three layers, most to least reliable: structured DOM scan of the
//! dashboard, regex over the raw markup, then probing a fixed list of
//! conventional endpoints. Markup varies across deployments of the same
//! panel software family, which is the only reason probing exists.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::heuristics;
use crate::html;
use crate::http::{join_url, PanelClient};

/// Marker phrase identifying the check-in trigger in page text.
const CHECKIN_MARKER: &str = "签到";

/// Conventional check-in endpoints probed when the markup yields nothing.
pub const PROBE_PATHS: &[&str] = &[
    "/clientarea.php?action=qiandao",
    "/clientarea.php?action=checkin",
    "/index.php?m=checkin",
    "/index.php?m=signin",
    "/index.php?rp=/checkin",
    "/index.php?rp=/signin",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMethod {
    Get,
    Post,
}

/// The discovered way to trigger check-in: method, resolved URL, and any
/// form fields to send along. Lives only for one executor invocation.
#[derive(Debug, Clone)]
pub struct CheckinAction {
    pub method: ActionMethod,
    pub url: Url,
    pub form: Vec<(String, String)>,
}

impl CheckinAction {
    fn get(url: Url) -> Self {
        Self { method: ActionMethod::Get, url, form: Vec::new() }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.form.iter().any(|(n, _)| n == name)
    }
}

/// Locate the check-in trigger in dashboard markup. `None` is a normal
/// outcome (entry point not present), not an error.
pub fn find_checkin_action(base_url: &Url, dashboard_html: &str) -> Option<CheckinAction> {
    if dashboard_html.is_empty() {
        return None;
    }

    if let Some(root) = html::try_parse(dashboard_html) {
        if let Some(action) = scan_dom(base_url, &root) {
            return Some(action);
        }
    }

    scan_regex(base_url, dashboard_html)
}

/// Structured pass: links first (scan order gives them precedence), then
/// forms whose visible text mentions the marker.
fn scan_dom(base_url: &Url, root: &html::DomNode) -> Option<CheckinAction> {
    for link in html::extract_links(root) {
        if link.text.contains(CHECKIN_MARKER) {
            if let Ok(url) = base_url.join(&link.href) {
                debug!("check-in link found: {}", url);
                return Some(CheckinAction::get(url));
            }
        }
    }

    for form in html::extract_forms(root) {
        if !form.text.contains(CHECKIN_MARKER) {
            continue;
        }
        let Some(action) = form.action.as_deref().filter(|a| !a.is_empty()) else {
            continue;
        };
        let Ok(url) = base_url.join(action) else {
            continue;
        };
        let method = match form.method.as_deref() {
            Some(m) if m.eq_ignore_ascii_case("get") => ActionMethod::Get,
            _ => ActionMethod::Post,
        };
        debug!("check-in form found: {} {}", action, form.fields.len());
        return Some(CheckinAction { method, url, form: form.fields });
    }

    None
}

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a[^>]+href="([^"]+)"[^>]*>[^<]*签到[^<]*</a>"#).expect("anchor pattern")
});

static FORM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<form[^>]+action="([^"]+)"[^>]*>(.*?)</form>"#).expect("form pattern")
});

/// Regex pass over raw markup, for when the structured parse is
/// unavailable or came up empty.
fn scan_regex(base_url: &Url, dashboard_html: &str) -> Option<CheckinAction> {
    if let Some(captures) = ANCHOR_RE.captures(dashboard_html) {
        let href = captures.get(1)?.as_str();
        if let Ok(url) = base_url.join(href) {
            return Some(CheckinAction::get(url));
        }
    }

    for captures in FORM_RE.captures_iter(dashboard_html) {
        let body = captures.get(2).map(|m| m.as_str()).unwrap_or("");
        if !body.contains(CHECKIN_MARKER) {
            continue;
        }
        let action = captures.get(1)?.as_str();
        let Ok(url) = base_url.join(action) else {
            continue;
        };
        let form = html::extract_token(dashboard_html)
            .map(|t| vec![("token".to_string(), t)])
            .unwrap_or_default();
        return Some(CheckinAction { method: ActionMethod::Post, url, form });
    }

    None
}

/// Last-resort probing of conventional endpoints: accept the first that
/// answers 200 with check-in/points wording.
pub async fn probe_known_endpoints(client: &PanelClient, base_url: &Url) -> Option<CheckinAction> {
    for path in PROBE_PATHS {
        let Ok(url) = join_url(base_url, path) else {
            continue;
        };
        match client.get(&url).await {
            Ok(page) if page.status.as_u16() == 200 && heuristics::is_probe_relevant(&page.body) => {
                debug!("probe hit: {}", url);
                return Some(CheckinAction::get(url));
            }
            Ok(_) => {}
            Err(e) => {
                debug!("probe {} failed: {}", url, e);
            }
        }
    }
    None
}
