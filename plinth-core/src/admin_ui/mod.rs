//! Embedded admin dashboard.
//!
//! A single-file page (inline CSS/JS, no build step) served under the
//! configured admin basepath. It bootstraps itself from
//! `GET /api/system/config` and browses entities through the data API,
//! logging in through the auth routes when the guard rejects it.

use crate::config::AdminOptions;

/// The embedded dashboard HTML.
pub const DASHBOARD_HTML: &str = include_str!("dashboard.html");

pub(crate) fn render(admin: &AdminOptions) -> String {
    DASHBOARD_HTML.replace("{{return_path}}", &admin.logo_return_path)
}
