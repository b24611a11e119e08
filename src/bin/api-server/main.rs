use actix_cors::Cors;
use actix_web::{
    middleware::{Logger, NormalizePath},
    web, App, HttpServer,
};
use anyhow::Context;
use campus_eats::{config::Config, db, seed::SeedFixture};
use tracing_subscriber::EnvFilter;

mod api;

fn cors(origin: Option<&str>) -> Cors {
    match origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allow_any_method()
            .allow_any_header(),
        None => Cors::permissive(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(true)
        .with_file(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("fail to setup logging: {e}"))?;

    let config = Config::from_env()?;
    let db_pool = db::connect(&config.database_url, &config.pool_settings())
        .await
        .with_context(|| format!("fail to open database {}", config.database_url))?;

    let fixture = SeedFixture::new(config.seed_path.clone());
    let state = web::Data::new(api::ApiState::new(db_pool.clone(), fixture));
    let report = state
        .restaurants()
        .ensure_seeded()
        .await
        .context("fail to seed restaurants")?;
    if report.seeded {
        tracing::info!("seeded {} restaurants", report.count);
    } else {
        tracing::info!("{} restaurants already stored, skip seeding", report.count);
    }

    let cors_origin = config.cors_origin.clone();
    tracing::info!("listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(cors(cors_origin.as_deref()))
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(api::configure)
            .default_service(web::to(api::not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    db_pool.close().await;
    tracing::info!("database connection closed");
    Ok(())
}
