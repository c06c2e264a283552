#[macro_use]
extern crate rocket;

use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use rocket::figment::{
    providers::{Format, Toml},
    Figment, Profile,
};
use rocket::Config;
use tokio::signal::unix::{signal, SignalKind};

use magickd::api;
use magickd::cache::FileCache;
use magickd::catalog::TransformCatalog;
use magickd::config::AppConfig;
use magickd::fetch::Fetcher;
use magickd::transform::Invoker;

#[launch]
async fn rocket() -> _ {
    dotenv().ok();

    // Load config
    let mut figment = Figment::from(Config::default()).merge(Toml::file("App.toml").nested());

    // Deployment overrides
    if let Ok(dir) = env::var("MAGICKD_CACHE_DIR") {
        figment = figment.merge(("cache_dir", dir));
    }
    if let Ok(path) = env::var("MAGICKD_TRANSFORMS") {
        figment = figment.merge(("transforms", path));
    }

    figment = figment.select(Profile::from_env_or("APP_PROFILE", "default"));

    // App config
    let config = figment.extract::<AppConfig>().unwrap();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Transform catalog, reloaded on SIGHUP
    let catalog = Arc::new(TransformCatalog::load(&config.transforms).unwrap());
    {
        let catalog = catalog.clone();
        tokio::spawn(async move {
            let mut hangups = match signal(SignalKind::hangup()) {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Cannot listen for SIGHUP: {}", e);
                    return;
                }
            };
            while hangups.recv().await.is_some() {
                info!("SIGHUP received, reloading transform catalog");
                if let Err(e) = catalog.reload() {
                    error!("Transform catalog reload failed: {}", e);
                }
            }
        });
    }

    let cache = FileCache::new(&config.cache_dir, config.cache_size)
        .expect("Cannot create cache directory");
    info!(
        "Cache dir {} (max {} bytes)",
        config.cache_dir.display(),
        config.cache_size
    );

    let fetcher = Fetcher::new(&config);
    let invoker = Invoker::new(&config.convert_bin);

    info!(
        "Starting magickd on {}:{}",
        config.address, config.port
    );

    rocket::custom(figment)
        .manage(catalog)
        .manage(cache)
        .manage(fetcher)
        .manage(invoker)
        .mount(
            "/",
            routes![api::images::favicon, api::images::transform_image],
        )
}
