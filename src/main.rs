use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpResponse, HttpServer};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use forumcore::config::{EnvConfig, Settings, SECRET_KEY};
use forumcore::openapi::ApiDoc;
use forumcore::repo::Repo;
use forumcore::{config, AppState, Forum};

const MIN_SECRET_LEN: usize = 32;

async fn render_metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(handle.render())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping forum server");

    let metrics = PrometheusBuilder::new().install_recorder()?;

    let repo: Arc<dyn Repo> = build_repo().await?;
    let settings = Settings::from_env();
    info!(?settings, "rule parameters loaded");

    let forum = Forum::new(repo).with_config(Arc::new(EnvConfig)).with_settings(settings);
    let state = AppState { forum };

    let openapi = ApiDoc::openapi();
    let bind = std::env::var("FORUM_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Ok(front) = std::env::var("FRONTEND_URL") {
                c = c.allowed_origin(&front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .configure(config)
            .route("/metrics", web::get().to(render_metrics))
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(bind.as_str())?;

    info!("Listening on http://{bind}");
    server.run().await?;
    Ok(())
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo() -> anyhow::Result<Arc<dyn Repo>> {
    use forumcore::repo::inmem::InMemRepo;
    info!("Using in-memory repository backend");
    Ok(Arc::new(InMemRepo::from_env()))
}

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
async fn build_repo() -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("no repository backend compiled in; enable `inmem-store` or `postgres-store`")
}

#[cfg(feature = "postgres-store")]
async fn build_repo() -> anyhow::Result<Arc<dyn Repo>> {
    use anyhow::Context;
    use forumcore::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new().max_connections(5).connect(&db_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(PgRepo::new(pool)))
}

/// Fails fast when the signing secret is missing or weak.
fn validate_env_vars() -> anyhow::Result<()> {
    let var = EnvConfig::var_name(SECRET_KEY);
    match std::env::var(&var) {
        Err(_) => anyhow::bail!("missing required environment variable {var}; copy .env.example to .env"),
        Ok(secret) if secret.len() < MIN_SECRET_LEN => {
            anyhow::bail!("{var} must be at least {MIN_SECRET_LEN} characters long")
        }
        Ok(_) => Ok(()),
    }
}
