use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use craft_payment_engine::{
    events::EventHandlers,
    pricing::{PriceResolver, PricingCache},
    EventFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    notifications::create_notification_hooks,
    routes::{health, PaymentWebhookRoute},
    signature::SignatureVerifier,
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db).await?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub async fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    // One set of event handlers for the whole server; each worker gets cloned producers.
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_notification_hooks(db.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let verifier = SignatureVerifier::new(config.webhook.secrets.clone(), config.webhook.timestamp_tolerance);
    let pricing = config.pricing;
    let srv = HttpServer::new(move || {
        let cache = Arc::new(PricingCache::new(db.clone(), pricing.cache_ttl, pricing.fetch_timeout));
        let resolver = PriceResolver::new(db.clone(), cache);
        let api = EventFlowApi::new(db.clone(), resolver, producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(verifier.clone()))
            .service(health)
            .service(PaymentWebhookRoute::<SqliteDatabase, SqliteDatabase, SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
