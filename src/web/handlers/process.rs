//! Forward a "process this site" request to the external qualification
//! service. The dashboard's own database is never written; this only posts
//! to the configured service and redirects back with a notice.

use std::time::{Duration, Instant};

use salvo::prelude::*;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use super::render_not_found;
use crate::web::{render, web_state};

fn redirect_with_notice(res: &mut Response, notice: &str) {
    let state = web_state();
    let target = render::href_with_query(
        &state.config,
        "/search",
        &[("notice", notice.to_string())],
    );
    res.render(Redirect::other(target));
}

#[handler]
pub async fn process_site(req: &mut Request, res: &mut Response) {
    let state = web_state();
    let Some(qualifier) = state.config.qualifier.as_ref() else {
        render_not_found(res, "No qualification service is configured.");
        return;
    };
    let Some(site_id) = req.param::<String>("id") else {
        render_not_found(res, "Missing site id.");
        return;
    };

    // One in-flight processing request at a time; the service takes up to
    // ten minutes per site.
    {
        let guard = state.process_cooldown.lock();
        if let Some(until) = *guard {
            let now = Instant::now();
            if until > now {
                let remaining = (until - now).as_secs();
                redirect_with_notice(
                    res,
                    &format!(
                        "A site is already being processed. Try again in {}m {}s.",
                        remaining / 60,
                        remaining % 60
                    ),
                );
                return;
            }
        }
    }

    let url = format!(
        "{}/api/process/{}",
        qualifier.base_url.trim_end_matches('/'),
        site_id
    );
    let result = state
        .http
        .post(&url)
        .query(&[("token", qualifier.token.expose_secret())])
        .send()
        .await;

    let cooldown = Duration::from_secs(qualifier.cooldown_secs);
    match result {
        Ok(response) if response.status().is_success() => {
            info!(%site_id, "queued site for qualification processing");
            *state.process_cooldown.lock() = Some(Instant::now() + cooldown);
            redirect_with_notice(
                res,
                &format!(
                    "Site {site_id} has been queued for processing. Results can take up to \
                     ten minutes; refresh the page to see updates."
                ),
            );
        }
        Ok(response) => {
            warn!(%site_id, status = %response.status(), "qualification service rejected request");
            redirect_with_notice(
                res,
                &format!(
                    "Failed to process site {site_id}: the service answered {}.",
                    response.status()
                ),
            );
        }
        Err(err) if err.is_timeout() => {
            // The service keeps working after the request times out.
            info!(%site_id, "qualification service timed out; treating as queued");
            *state.process_cooldown.lock() = Some(Instant::now() + cooldown);
            redirect_with_notice(
                res,
                &format!(
                    "Site {site_id} is processing in the background. Refresh the page later \
                     to see updated results."
                ),
            );
        }
        Err(err) => {
            warn!(%site_id, "qualification service unreachable: {err}");
            redirect_with_notice(res, &format!("Error processing site {site_id}."));
        }
    }
}
