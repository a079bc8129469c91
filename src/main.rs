mod auth;
mod config;
mod db;
mod entity;
mod error;
mod response;
mod routes;


use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use db::connect_db;
use log::info;
use response::json_error_handler;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env();
    let db = connect_db(&config).await;
    let server_port = config.server_port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .wrap(actix_web::middleware::from_fn(routes::cors::cors_handler))
            .service(web::scope("/api").configure(routes::api))
    })
    .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}
