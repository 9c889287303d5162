use salvo::http::cookie::Cookie;
use salvo::prelude::*;
use secrecy::ExposeSecret;

use crate::web::middleware::auth::SESSION_COOKIE;
use crate::web::{render, web_state};

fn login_body(config: &crate::config::Config, failed: bool) -> String {
    let error = if failed {
        render::error_box("Invalid password. Please try again.")
    } else {
        String::new()
    };
    format!(
        "<div class=\"login-box\"><h2>Authentication Required</h2>\
         <p>Enter the password to access Eco Site Analytics.</p>{error}\
         <form method=\"post\" action=\"{action}\">\
         <input type=\"password\" name=\"password\" autofocus>\
         <button class=\"button\" type=\"submit\">Login</button>\
         </form></div>",
        action = render::html_escape(&render::href(config, "/login")),
    )
}

#[handler]
pub async fn login_form(req: &mut Request, res: &mut Response) {
    let state = web_state();
    let failed = req.query::<String>("error").is_some();
    res.render(Text::Html(render::bare_page(
        &state.config,
        "Login",
        &login_body(&state.config, failed),
    )));
}

#[handler]
pub async fn login_submit(req: &mut Request, res: &mut Response) {
    let state = web_state();
    let password = req
        .form::<String>("password")
        .await
        .unwrap_or_default();

    if !password.is_empty() && password == state.config.auth.token.expose_secret() {
        let mut cookie = Cookie::new(SESSION_COOKIE, password);
        cookie.set_path("/");
        cookie.set_http_only(true);
        res.add_cookie(cookie);
        res.render(Redirect::other(render::href(&state.config, "/")));
    } else {
        res.render(Redirect::other(render::href(
            &state.config,
            "/login?error=1",
        )));
    }
}

#[handler]
pub async fn logout(res: &mut Response) {
    let state = web_state();
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    res.add_cookie(cookie);
    res.render(Redirect::other(render::href(&state.config, "/login")));
}
