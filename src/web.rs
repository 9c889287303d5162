use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use salvo::prelude::*;
use tracing::info;

use crate::config::Config;
use crate::db::DatabaseManager;
use crate::db::cache::TtlCache;
use crate::db::models::{BatchRun, ContactStats, SummaryStats};

pub mod csv;
pub mod handlers;
pub mod middleware;
pub mod render;

use self::middleware::auth::require_auth;

/// TTL caches for option lists and slider-bound statistics.
pub struct Caches {
    pub options: TtlCache<Vec<String>>,
    pub stats: TtlCache<SummaryStats>,
    pub contact_stats: TtlCache<ContactStats>,
    pub batches: TtlCache<Vec<BatchRun>>,
}

impl Caches {
    fn new(config: &Config) -> Self {
        let options_ttl = Duration::from_secs(config.cache.options_ttl_secs);
        let stats_ttl = Duration::from_secs(config.cache.stats_ttl_secs);
        Self {
            options: TtlCache::new(options_ttl),
            stats: TtlCache::new(stats_ttl),
            contact_stats: TtlCache::new(stats_ttl),
            batches: TtlCache::new(options_ttl),
        }
    }

    pub fn clear_all(&self) {
        self.options.clear();
        self.stats.clear();
        self.contact_stats.clear();
        self.batches.clear();
    }
}

pub struct WebState {
    pub config: Arc<Config>,
    pub db: Arc<DatabaseManager>,
    pub caches: Caches,
    pub started_at: Instant,
    /// One external processing request at a time; holds the cooldown expiry.
    pub process_cooldown: Mutex<Option<Instant>>,
    pub http: reqwest::Client,
}

static WEB_STATE: OnceCell<WebState> = OnceCell::new();

pub fn web_state() -> &'static WebState {
    WEB_STATE
        .get()
        .expect("web state is not initialized before handler execution")
}

#[derive(Clone)]
pub struct WebServer {
    config: Arc<Config>,
}

impl WebServer {
    pub async fn new(config: Arc<Config>, db: Arc<DatabaseManager>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        let _ = WEB_STATE.set(WebState {
            caches: Caches::new(&config),
            config: config.clone(),
            db,
            started_at: Instant::now(),
            process_cooldown: Mutex::new(None),
            http,
        });
        Ok(Self { config })
    }

    pub async fn start(&self) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        info!("Starting web server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor).serve(create_router()).await;

        Ok(())
    }
}

pub fn create_router() -> Router {
    Router::new()
        .hoop(middleware::logging::log_requests)
        .push(Router::with_path("health").get(handlers::health::health_check))
        .push(Router::with_path("status").get(handlers::health::get_status))
        .push(Router::with_path("assets/app.css").get(handlers::assets::stylesheet))
        .push(
            Router::with_path("login")
                .get(handlers::auth::login_form)
                .post(handlers::auth::login_submit),
        )
        .push(Router::with_path("logout").post(handlers::auth::logout))
        .push(
            Router::new()
                .hoop(require_auth)
                .get(handlers::dashboard::dashboard)
                .push(Router::with_path("refresh").post(handlers::refresh_caches))
                .push(
                    Router::with_path("search")
                        .get(handlers::search::search_page)
                        .push(Router::with_path("export.csv").get(handlers::search::search_export)),
                )
                .push(
                    Router::with_path("sites")
                        .get(handlers::sites::site_picker)
                        .push(
                            Router::with_path("{id}")
                                .get(handlers::sites::site_detail)
                                .push(
                                    Router::with_path("process")
                                        .post(handlers::process::process_site),
                                ),
                        ),
                )
                .push(
                    Router::with_path("explorer")
                        .get(handlers::explorer::explorer_page)
                        .push(
                            Router::with_path("export.csv").get(handlers::explorer::explorer_export),
                        ),
                )
                .push(Router::with_path("narratives").get(handlers::narratives::narratives_page))
                .push(
                    Router::with_path("documents")
                        .get(handlers::documents::documents_page)
                        .push(
                            Router::with_path("export.csv")
                                .get(handlers::documents::documents_export),
                        ),
                )
                .push(
                    Router::with_path("qualifications")
                        .get(handlers::qualifications::qualifications_page)
                        .push(
                            Router::with_path("export.csv")
                                .get(handlers::qualifications::qualifications_export),
                        ),
                )
                .push(
                    Router::with_path("contaminants")
                        .get(handlers::contaminants::contaminants_page)
                        .push(
                            Router::with_path("export.csv")
                                .get(handlers::contaminants::contaminants_export),
                        ),
                )
                .push(
                    Router::with_path("contacts")
                        .get(handlers::contacts::contacts_page)
                        .push(Router::with_path("export.csv").get(handlers::contacts::contacts_export)),
                )
                .push(
                    Router::with_path("customers")
                        .get(handlers::customers::customers_page)
                        .push(
                            Router::with_path("export.csv").get(handlers::customers::customers_export),
                        ),
                )
                .push(
                    Router::with_path("filtered-out")
                        .get(handlers::filtered_out::filtered_out_page)
                        .push(
                            Router::with_path("tribal.csv")
                                .get(handlers::filtered_out::tribal_export),
                        )
                        .push(Router::with_path("dnc.csv").get(handlers::filtered_out::dnc_export)),
                )
                .push(
                    Router::with_path("feedback")
                        .get(handlers::feedback::feedback_page)
                        .push(Router::with_path("export.csv").get(handlers::feedback::feedback_export)),
                )
                .push(Router::with_path("dictionary").get(handlers::dictionary::dictionary_page)),
        )
}
