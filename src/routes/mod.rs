pub mod auth;
pub mod comment;
pub mod cors;
pub mod like;
pub mod stats;
pub mod user;
pub mod wish;

use actix_web::web;
use chrono::{DateTime, SecondsFormat, Utc};

pub fn api(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/auth").configure(auth::config))
        .service(web::scope("/users").configure(user::config))
        .service(web::scope("/wishes").configure(wish::config))
        .service(web::scope("/comments").configure(comment::config))
        .configure(stats::config);
}

pub(crate) fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}
