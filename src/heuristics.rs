//! Heuristic response classification
//!
//! The panels return HTTP 200 for success and failure pages alike, so every
//! decision in the login and check-in flows rests on phrase matching. All
//! pattern sets live here as pure, deterministic predicates; adding a new
//! locale or phrase never touches control flow.

use once_cell::sync::Lazy;
use regex::Regex;

/// 2FA prompts, CAPTCHA providers and human-verification interstitials,
/// across the locales the panels ship in.
static CHALLENGE_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)two\s*-?\s*factor|二次验证|二步验证|两步验证|验证码|人机验证|机器人验证|hcaptcha|recaptcha|please complete the security check|attention required!\s*cloudflare|安全验证",
    )
    .expect("challenge body pattern")
});

/// 2FA markers in a redirect target's path or query.
static CHALLENGE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)two[-_]?factor|twofa|2fa").expect("challenge url pattern"));

static LOGIN_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)login details incorrect|invalid\s+login|登录失败|邮箱或密码错误|email address or password|sign in was incorrect",
    )
    .expect("login failure pattern")
});

static LOGGED_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)logout|退出|client area|客户中心|我的资料|服务").expect("logged-in pattern")
});

static ALREADY_DONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)今日已签到|已签到|already").expect("already-done pattern"));

static CHECKIN_SUCCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)签到成功|成功|success").expect("checkin success pattern"));

static JSON_ALREADY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)已签到|already|重复").expect("json already pattern"));

static JSON_SUCCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)成功|success|ok").expect("json success pattern"));

/// Broad "this page is about check-in or points" test for endpoint probing.
static PROBE_RELEVANT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)签到|已签到|成功|积分|check-?in").expect("probe pattern"));

/// True when the response looks like a 2FA or human-verification challenge,
/// judged from the body text or the final URL.
pub fn is_challenge(body: &str, final_url: &str) -> bool {
    if !body.is_empty() && CHALLENGE_BODY.is_match(body) {
        return true;
    }
    CHALLENGE_URL.is_match(final_url)
}

/// True when the post-login page carries a wrong-credentials message.
pub fn is_login_failure(body: &str) -> bool {
    LOGIN_FAILURE.is_match(body)
}

/// True when the page shows signs of an authenticated session
/// (logout link, client-area labels).
pub fn is_logged_in(body: &str) -> bool {
    LOGGED_IN.is_match(body)
}

/// True when an HTML check-in response says today's reward was already
/// claimed. Must be tested before [`is_checkin_success`]: the already-done
/// page commonly restates the past success message.
pub fn is_already_checked_in(body: &str) -> bool {
    ALREADY_DONE.is_match(body)
}

/// True when an HTML check-in response reads as a fresh success.
pub fn is_checkin_success(body: &str) -> bool {
    CHECKIN_SUCCESS.is_match(body)
}

/// JSON `message`/`msg`/`status` field: duplicate check-in wording.
pub fn json_msg_already(msg: &str) -> bool {
    JSON_ALREADY.is_match(msg)
}

/// JSON `message`/`msg`/`status` field: success wording.
pub fn json_msg_success(msg: &str) -> bool {
    JSON_SUCCESS.is_match(msg)
}

/// Whether a probed endpoint's body is plausibly a check-in page.
pub fn is_probe_relevant(body: &str) -> bool {
    PROBE_RELEVANT.is_match(body)
}
