//! Page-level route protection for the admin panel and the shop profile.
//!
//! Only pages are guarded here. API routes enforce their own sessions through
//! the extractors in `session`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use super::auth::is_staff_role;
use super::session::{read_session, Claims, Realm};
use crate::db::StaffRole;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDecision {
    Continue,
    Redirect(&'static str),
}

/// `path` is `prefix` or lies below it
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Decide what happens to a page request given the sessions it carries
pub fn page_decision(path: &str, customer: Option<&Claims>, staff: Option<&Claims>) -> PageDecision {
    if under(path, "/admin") {
        if under(path, "/admin/login") || under(path, "/admin/auth") {
            return PageDecision::Continue;
        }
        let is_staff = staff.is_some_and(|c| c.role.parse::<StaffRole>().is_ok());
        if !is_staff {
            return PageDecision::Redirect(Realm::Staff.login_path());
        }
        return PageDecision::Continue;
    }

    if under(path, "/profile") {
        return match customer {
            None => PageDecision::Redirect(Realm::Customer.login_path()),
            Some(claims) if is_staff_role(&claims.role) => PageDecision::Redirect("/admin/dashboard"),
            Some(_) => PageDecision::Continue,
        };
    }

    PageDecision::Continue
}

pub async fn page_guard(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if under(&path, "/api") {
        return next.run(request).await;
    }

    let customer = read_session(request.headers(), &state, Realm::Customer);
    let staff = read_session(request.headers(), &state, Realm::Staff);

    match page_decision(&path, customer.as_ref(), staff.as_ref()) {
        PageDecision::Continue => next.run(request).await,
        PageDecision::Redirect(to) => {
            tracing::debug!(path = %path, to, "Redirecting unauthenticated page request");
            Redirect::to(to).into_response()
        }
    }
}
