use actix_web::{middleware, web, App, HttpServer};
use neuropaint::{logger, Config, Gateway};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let config = Config::from_env();
    logger::init_for(&config)?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    logger::log_startup_info(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.bind_host(),
        config.bind_port(),
    );
    logger::log_config_info(&config);

    if config.together.api_key.is_none() {
        log::warn!("⚠️  TOGETHER_API_KEY is not set; callers must bring their own key");
    }

    let gateway = match Gateway::from_config(&config) {
        Ok(gateway) => web::Data::new(gateway),
        Err(e) => {
            log::error!("❌ Failed to build the gateway: {}", e);
            return Err(e.into());
        }
    };
    if !gateway.rate_limited() {
        log::warn!("⚠️  Rate limiting is disabled");
    }

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(gateway.clone())
            .configure(neuropaint::server::configure)
    })
    .bind((config.bind_host().to_string(), config.bind_port()))?
    .run()
    .await?;

    log::info!("👋 Server stopped");
    Ok(())
}
