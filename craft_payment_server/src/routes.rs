//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. For this reason, any long, non-cpu-bound operation (e.g. I/O,
//! database operations, etc.) should be expressed as futures or asynchronous functions.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use craft_payment_engine::{
    provider_types::WebhookEnvelope,
    EventFlowApi,
    EventFlowError,
    PaymentGatewayDatabase,
    PricingSource,
    ProductCatalog,
};
use log::*;

use crate::{
    data_objects::JsonResponse,
    errors::ServerError,
    signature::{SignatureError, SignatureVerifier, SIGNATURE_HEADER},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//------------------------------------------   Payment webhook  ------------------------------------------------
route!(payment_webhook => Post "/webhook/payment" impl PaymentGatewayDatabase, ProductCatalog, PricingSource);
/// The single provider-facing endpoint. The signature is verified against the raw body before the payload is even
/// parsed; nothing downstream ever sees an unauthenticated byte.
///
/// Status codes drive the provider's retry machinery: 2xx acknowledges the event (including duplicates and skips),
/// 4xx rejects a delivery that never reached the ledger (bad signature, unparseable envelope), and 5xx covers any
/// failure after the ledger row exists, so the provider redelivers.
pub async fn payment_webhook<BData, CData, PData>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<EventFlowApi<BData, CData, PData>>,
    verifier: web::Data<SignatureVerifier>,
) -> Result<HttpResponse, ServerError>
where
    BData: PaymentGatewayDatabase,
    CData: ProductCatalog,
    PData: PricingSource,
{
    trace!("📬️ Received webhook request: {}", req.uri());
    let header =
        req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).ok_or(SignatureError::MissingHeader)?;
    verifier.verify(&body, header, Utc::now())?;
    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequestBody(format!("not a valid event envelope: {e}")))?;
    debug!("📬️ Event [{}] of type '{}' passed signature verification", envelope.id, envelope.event_type);
    match api.process_event(&envelope).await {
        Ok(disposition) => {
            info!("📬️ Event [{}] acknowledged: {disposition}", envelope.id);
            Ok(HttpResponse::Ok().json(JsonResponse::success(disposition)))
        },
        Err(EventFlowError::InvalidPayload(e)) => {
            warn!("📬️ Event [{}] carried an unusable payload. {e}", envelope.id);
            Err(ServerError::InvalidEventPayload(e.to_string()))
        },
        Err(e) => {
            warn!("📬️ Event [{}] could not be processed. Asking the provider to redeliver. {e}", envelope.id);
            Err(ServerError::BackendError(e.to_string()))
        },
    }
}
