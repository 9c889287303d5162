//! Session gate for all dashboard pages.
//!
//! One shared password, configured via `auth.token` / `ECO_AUTH_TOKEN`.
//! Browsers authenticate through the login form, which sets the session
//! cookie; non-browser clients may send the token as a bearer header.

use salvo::http::header::AUTHORIZATION;
use salvo::prelude::*;
use secrecy::ExposeSecret;

use crate::web::{render, web_state};

pub const SESSION_COOKIE: &str = "eco_session";

#[handler]
pub async fn require_auth(req: &mut Request, res: &mut Response, ctrl: &mut FlowCtrl) {
    let state = web_state();
    let token = state.config.auth.token.expose_secret();

    let cookie_ok = req
        .cookie(SESSION_COOKIE)
        .map(|cookie| cookie.value() == token)
        .unwrap_or(false);
    let bearer_ok = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value == token)
        .unwrap_or(false);

    if cookie_ok || bearer_ok {
        return;
    }

    res.render(Redirect::other(render::href(&state.config, "/login")));
    ctrl.skip_rest();
}
