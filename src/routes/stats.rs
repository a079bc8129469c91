use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::db::query_count;
use crate::error::AppError;
use crate::routes::wish::{page_count, query_wish_page, WishDto, WishPageQuery};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/stats").route(web::get().to(stats)))
        .service(web::resource("/search").route(web::get().to(search)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/info").route(web::get().to(info)));
}

#[derive(Serialize)]
struct StatsResponse {
    total_users: i64,
    total_wishes: i64,
    total_comments: i64,
    total_likes: i64,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Serialize)]
struct SearchResponse {
    wishes: Vec<WishDto>,
    total: i64,
    pages: i64,
    current_page: i64,
    query: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
}

#[derive(Serialize)]
struct InfoResponse {
    name: String,
    version: String,
    description: String,
}

async fn stats(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let total_users =
        query_count(db.get_ref(), "select count(1) as cnt from t_user", vec![]).await?;
    let total_wishes = query_count(
        db.get_ref(),
        "select count(1) as cnt from t_wish where is_public = 1",
        vec![],
    )
    .await?;
    let total_comments =
        query_count(db.get_ref(), "select count(1) as cnt from t_comment", vec![]).await?;
    let total_likes =
        query_count(db.get_ref(), "select count(1) as cnt from t_like", vec![]).await?;

    Ok(HttpResponse::Ok().json(StatsResponse {
        total_users,
        total_wishes,
        total_comments,
        total_likes,
    }))
}

async fn search(
    db: web::Data<DatabaseConnection>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let term = query.q.clone().unwrap_or_default().trim().to_string();
    if term.chars().count() < 2 {
        return Err(AppError::validation(
            "search query must be at least 2 characters",
        ));
    }

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).max(1);
    let q = WishPageQuery {
        user_id: None,
        category: None,
        status: None,
        search: Some(term.clone()),
        sort_by: None,
        page,
        per_page: Some(per_page),
    };
    let (wishes, total) = query_wish_page(db.get_ref(), &q).await?;

    Ok(HttpResponse::Ok().json(SearchResponse {
        wishes,
        total,
        pages: page_count(total, per_page),
        current_page: page,
        query: term,
    }))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        message: "Wish Wall API is running".to_string(),
    })
}

async fn info() -> HttpResponse {
    HttpResponse::Ok().json(InfoResponse {
        name: "Wish Wall API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "social wish wall backend".to_string(),
    })
}
