//! Daily check-in against the authenticated dashboard
//!
//! Discovery finds the trigger (link, form, or guessed endpoint) on the
//! client area page; the executor performs it and classifies the result.

mod discover;
mod perform;

pub use discover::{find_checkin_action, probe_known_endpoints, ActionMethod, CheckinAction, PROBE_PATHS};
pub use perform::{classify_response, perform_checkin};
