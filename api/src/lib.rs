pub mod commission;
pub mod routes;
pub mod settlement;
pub mod store;
pub mod telemetry;
pub mod time;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use jiff::{Span, ToSpan};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use std::net::TcpListener;

use crate::time::TimeSource;

/// Runtime knobs shared with the request handlers.
#[derive(Clone)]
pub struct AppSettings {
    pub service_token: SecretString,
    pub minimum_withdrawal: Decimal,
    pub holdback: Span,
}

/// Build the server, but not await it.
///
/// Returns the port that the server has bound to by modifying the config.
pub async fn build(
    config: &mut Config,
    time_source: TimeSource,
) -> std::io::Result<Server> {
    let db_pool = web::Data::new(
        PgPool::connect(&config.database_url).await.unwrap(),
    );
    let time_source = web::Data::new(time_source);
    let settings = web::Data::new(config.app_settings());

    // Clone config values for use in closure
    let allowed_origins = config.allowed_origins.clone();

    // OS assigns the port if binding to 0
    let listener = TcpListener::bind(format!("{}:{}", config.ip, config.port))?;
    config.port = listener.local_addr()?.port();
    let server = HttpServer::new(move || {
        // Configure CORS based on allowed origins
        let cors = if allowed_origins.contains(&"*".to_string()) {
            // Allow any origin (for development)
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
        } else {
            // Production: Only allow specified origins
            let mut cors =
                Cors::default().allow_any_method().allow_any_header();
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        };

        App::new()
            .wrap(cors)
            .service(routes::api_services())
            .app_data(db_pool.clone())
            .app_data(time_source.clone())
            .app_data(settings.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}

pub struct Config {
    pub database_url: String,
    /// set to "0.0.0.0" for public access, "127.0.0.1" for local dev
    pub ip: String,
    /// set to 0 to get an os-assigned port
    pub port: u16,
    /// List of allowed CORS origins. Use "*" to allow any origin (development only)
    pub allowed_origins: Vec<String>,
    /// Shared secret that order-management and the payout service present
    /// on service endpoints
    pub service_token: SecretString,
    /// Smallest withdrawal the platform will process
    pub minimum_withdrawal: Decimal,
    /// Days between delivery and commission availability
    pub holdback_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        use std::env::var;

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string()) // Default to allow any origin for development
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let minimum_withdrawal = var("MINIMUM_WITHDRAWAL")
            .ok()
            .map(|s| s.parse().unwrap())
            .unwrap_or(Decimal::from(50));
        let holdback_days = var("HOLDBACK_DAYS")
            .ok()
            .map(|s| s.parse().unwrap())
            .unwrap_or(7);

        Config {
            database_url: var("DATABASE_URL").unwrap(),
            ip: var("IP_ADDRESS").unwrap(),
            port: var("PORT").unwrap().parse().unwrap(),
            allowed_origins,
            service_token: SecretString::from(var("SERVICE_TOKEN").unwrap()),
            minimum_withdrawal,
            holdback_days,
        }
    }

    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            service_token: self.service_token.clone(),
            minimum_withdrawal: self.minimum_withdrawal,
            // expressed in hours; timestamp arithmetic rejects calendar units
            holdback: (self.holdback_days * 24).hours(),
        }
    }
}
