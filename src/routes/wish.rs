use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, error};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::{map_tx_error, query_all, query_count};
use crate::entity::{comment, like, user, wish};
use crate::error::AppError;
use crate::response::MessageResponse;
use crate::routes::comment::{comments_for_wish, CommentDto};
use crate::routes::user::{public_user_dto, UserDto};
use crate::routes::{comment as comment_routes, like as like_routes, to_rfc3339};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/{id:\\d+}")
            .route(web::get().to(get))
            .route(web::put().to(update))
            .route(web::delete().to(remove)),
    )
    .service(
        web::resource("/{id:\\d+}/comments")
            .route(web::get().to(comment_routes::list_for_wish))
            .route(web::post().to(comment_routes::create)),
    )
    .service(web::resource("/{id:\\d+}/like").route(web::post().to(like_routes::like)))
    .service(web::resource("/{id:\\d+}/unlike").route(web::post().to(like_routes::unlike)))
    .service(web::resource("/{id:\\d+}/likes").route(web::get().to(like_routes::list)));
}

#[derive(Serialize)]
pub(crate) struct WishDto {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub content: String,
    pub category: String,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub status: String,
    pub priority: i32,
    pub target_date: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub author: UserDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentDto>>,
}

#[derive(Deserialize)]
struct CreateWishRequest {
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
    image_url: Option<String>,
    is_public: Option<bool>,
    priority: Option<i32>,
    target_date: Option<String>,
}

#[derive(Deserialize)]
struct UpdateWishRequest {
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
    image_url: Option<String>,
    is_public: Option<bool>,
    status: Option<String>,
    priority: Option<i32>,
    target_date: Option<String>,
}

#[derive(Deserialize)]
struct ListWishesQuery {
    page: Option<i64>,
    per_page: Option<i64>,
    category: Option<String>,
    status: Option<String>,
    sort_by: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct WishPageResponse {
    pub wishes: Vec<WishDto>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
}

#[derive(Serialize)]
struct WishResponse {
    message: String,
    wish: WishDto,
}

const STATUSES: [&str; 3] = ["active", "completed", "archived"];

async fn list(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ListWishesQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).max(1);
    let status = query
        .status
        .clone()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "active".to_string());

    let q = WishPageQuery {
        user_id: None,
        category: query.category.clone().filter(|v| !v.trim().is_empty()),
        status: Some(status),
        search: None,
        sort_by: query.sort_by.clone(),
        page,
        per_page: Some(per_page),
    };
    let (wishes, total) = query_wish_page(db.get_ref(), &q).await?;

    Ok(HttpResponse::Ok().json(WishPageResponse {
        wishes,
        total,
        pages: page_count(total, per_page),
        current_page: page,
    }))
}

async fn create(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CreateWishRequest>,
) -> Result<HttpResponse, AppError> {
    let title = payload.title.clone().unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    let content = payload.content.clone().unwrap_or_default().trim().to_string();
    if content.is_empty() {
        return Err(AppError::validation("content is required"));
    }

    let category = payload
        .category
        .clone()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "general".to_string());
    let priority = payload.priority.unwrap_or(0);
    check_priority(priority)?;
    let target_date = parse_target_date(payload.target_date.as_deref())?;

    let now = Utc::now();
    let model = wish::ActiveModel {
        user_id: Set(auth.user_id),
        title: Set(title),
        content: Set(content),
        category: Set(category),
        image_url: Set(payload.image_url.clone()),
        is_public: Set(payload.is_public.unwrap_or(true)),
        status: Set("active".to_string()),
        priority: Set(priority),
        target_date: Set(target_date),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };

    let inserted = model.insert(db.get_ref()).await.map_err(AppError::db)?;
    debug!("wish created id={} user={}", inserted.id, auth.user_id);

    let dto = build_wish_dto(db.get_ref(), inserted, false).await?;
    Ok(HttpResponse::Created().json(WishResponse {
        message: "wish created".to_string(),
        wish: dto,
    }))
}

async fn get(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let model = find_public_wish(db.get_ref(), *path).await?;
    let dto = build_wish_dto(db.get_ref(), model, true).await?;
    Ok(HttpResponse::Ok().json(dto))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<UpdateWishRequest>,
) -> Result<HttpResponse, AppError> {
    let model = wish::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("wish not found"))?;
    if model.user_id != auth.user_id {
        return Err(AppError::forbidden("cannot modify another user's wish"));
    }

    let mut active = wish::ActiveModel {
        id: Set(model.id),
        ..Default::default()
    };
    active.updated_at = Set(Some(Utc::now()));

    if let Some(v) = payload.title.clone() {
        let v = v.trim().to_string();
        if v.is_empty() {
            return Err(AppError::validation("title cannot be empty"));
        }
        active.title = Set(v);
    }
    if let Some(v) = payload.content.clone() {
        let v = v.trim().to_string();
        if v.is_empty() {
            return Err(AppError::validation("content cannot be empty"));
        }
        active.content = Set(v);
    }
    if let Some(v) = payload.category.clone().filter(|v| !v.trim().is_empty()) {
        active.category = Set(v);
    }
    if let Some(v) = payload.image_url.clone() {
        active.image_url = Set(Some(v));
    }
    if let Some(v) = payload.is_public {
        active.is_public = Set(v);
    }
    if let Some(v) = payload.status.clone() {
        if !STATUSES.contains(&v.as_str()) {
            return Err(AppError::validation(
                "status must be active, completed or archived",
            ));
        }
        active.status = Set(v);
    }
    if let Some(v) = payload.priority {
        check_priority(v)?;
        active.priority = Set(v);
    }
    if let Some(date) = parse_target_date(payload.target_date.as_deref())? {
        active.target_date = Set(Some(date));
    }

    let updated = wish::Entity::update(active)
        .exec(db.get_ref())
        .await
        .map_err(AppError::db)?;

    let dto = build_wish_dto(db.get_ref(), updated, false).await?;
    Ok(HttpResponse::Ok().json(WishResponse {
        message: "wish updated".to_string(),
        wish: dto,
    }))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let model = wish::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("wish not found"))?;
    if model.user_id != auth.user_id {
        return Err(AppError::forbidden("cannot delete another user's wish"));
    }

    let wish_id = model.id;
    db.get_ref()
        .transaction::<_, (), AppError>(|txn| {
            Box::pin(async move {
                like::Entity::delete_many()
                    .filter(like::Column::WishId.eq(wish_id))
                    .exec(txn)
                    .await
                    .map_err(AppError::db)?;
                comment::Entity::delete_many()
                    .filter(comment::Column::WishId.eq(wish_id))
                    .exec(txn)
                    .await
                    .map_err(AppError::db)?;
                wish::Entity::delete_by_id(wish_id)
                    .exec(txn)
                    .await
                    .map_err(AppError::db)?;
                Ok(())
            })
        })
        .await
        .map_err(map_tx_error)?;
    debug!("wish deleted id={} user={}", wish_id, auth.user_id);

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "wish deleted".to_string(),
    }))
}

/// Lookup that applies the visibility rule: a private wish is absent as far
/// as every read path is concerned.
pub(crate) async fn find_public_wish(
    db: &DatabaseConnection,
    id: i32,
) -> Result<wish::Model, AppError> {
    wish::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(AppError::db)?
        .filter(|w| w.is_public)
        .ok_or_else(|| AppError::not_found("wish not found"))
}

pub(crate) async fn build_wish_dto(
    db: &DatabaseConnection,
    model: wish::Model,
    include_comments: bool,
) -> Result<WishDto, AppError> {
    let author = user::Entity::find_by_id(model.user_id)
        .one(db)
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| {
            error!("wish {} has no author row", model.id);
            AppError::Internal
        })?;

    let likes_count = query_count(
        db,
        "select count(1) as cnt from t_like where wish_id = ?",
        vec![model.id.into()],
    )
    .await?;
    let comments_count = query_count(
        db,
        "select count(1) as cnt from t_comment where wish_id = ?",
        vec![model.id.into()],
    )
    .await?;

    let comments = if include_comments {
        Some(comments_for_wish(db, model.id).await?)
    } else {
        None
    };

    Ok(WishDto {
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        content: model.content,
        category: model.category,
        image_url: model.image_url,
        is_public: model.is_public,
        status: model.status,
        priority: model.priority,
        target_date: model.target_date.map(|d| d.to_string()),
        created_at: model.created_at.map(to_rfc3339),
        updated_at: model.updated_at.map(to_rfc3339),
        likes_count,
        comments_count,
        author: public_user_dto(&author),
        comments,
    })
}

pub(crate) struct WishPageQuery {
    pub user_id: Option<i32>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub page: i64,
    pub per_page: Option<i64>,
}

/// One round trip per page: the wish rows, their authors, and the per-wish
/// like/comment counts come back together so count-ordered listing works.
pub(crate) async fn query_wish_page(
    db: &DatabaseConnection,
    q: &WishPageQuery,
) -> Result<(Vec<WishDto>, i64), AppError> {
    let mut where_sql = vec!["t.is_public = 1".to_string()];
    let mut values: Vec<sea_orm::Value> = Vec::new();

    if let Some(user_id) = q.user_id {
        where_sql.push("t.user_id = ?".to_string());
        values.push(user_id.into());
    }
    if let Some(category) = &q.category {
        where_sql.push("t.category = ?".to_string());
        values.push(category.clone().into());
    }
    if let Some(status) = &q.status {
        where_sql.push("t.status = ?".to_string());
        values.push(status.clone().into());
    }
    if let Some(search) = &q.search {
        let pattern = format!("%{}%", search.to_lowercase());
        where_sql.push("(lower(t.title) like ? or lower(t.content) like ?)".to_string());
        values.push(pattern.clone().into());
        values.push(pattern.into());
    }

    let where_clause = where_sql.join(" and ");
    let count_sql = format!("select count(1) as cnt from t_wish t where {}", where_clause);
    let total = query_count(db, &count_sql, values.clone()).await?;

    let order = match q.sort_by.as_deref() {
        Some("likes") => "likes_count desc, t.created_at desc",
        Some("comments") => "comments_count desc, t.created_at desc",
        _ => "t.created_at desc",
    };

    let mut list_sql = format!(
        "select t.id, t.user_id, t.title, t.content, t.category, t.image_url, t.is_public, \
         t.status, t.priority, t.target_date, t.created_at, t.updated_at, \
         u.username as author_username, u.display_name as author_display_name, \
         u.avatar_url as author_avatar_url, u.bio as author_bio, u.created_at as author_created_at, \
         (select count(1) from t_like l where l.wish_id = t.id) as likes_count, \
         (select count(1) from t_comment c where c.wish_id = t.id) as comments_count \
         from t_wish t join t_user u on u.id = t.user_id where {} order by {}",
        where_clause, order
    );
    if let Some(per_page) = q.per_page {
        list_sql.push_str(" limit ?,?");
        values.push(((q.page - 1) * per_page).into());
        values.push(per_page.into());
    }

    let rows = query_all(db, &list_sql, values).await?;
    let wishes = rows.into_iter().map(row_to_wish_dto).collect();
    Ok((wishes, total))
}

fn row_to_wish_dto(row: sea_orm::QueryResult) -> WishDto {
    let author = UserDto {
        id: row.try_get("", "user_id").unwrap_or(0),
        username: row.try_get("", "author_username").unwrap_or_default(),
        email: None,
        display_name: row.try_get("", "author_display_name").ok(),
        avatar_url: row.try_get("", "author_avatar_url").ok(),
        bio: row.try_get("", "author_bio").ok(),
        created_at: get_datetime_utc(&row, "author_created_at").map(to_rfc3339),
    };
    WishDto {
        id: row.try_get("", "id").unwrap_or(0),
        user_id: row.try_get("", "user_id").unwrap_or(0),
        title: row.try_get("", "title").unwrap_or_default(),
        content: row.try_get("", "content").unwrap_or_default(),
        category: row.try_get("", "category").unwrap_or_default(),
        image_url: row.try_get("", "image_url").ok(),
        is_public: get_bool(&row, "is_public"),
        status: row.try_get("", "status").unwrap_or_default(),
        priority: row.try_get("", "priority").unwrap_or(0),
        target_date: get_date(&row, "target_date").map(|d| d.to_string()),
        created_at: get_datetime_utc(&row, "created_at").map(to_rfc3339),
        updated_at: get_datetime_utc(&row, "updated_at").map(to_rfc3339),
        likes_count: row.try_get("", "likes_count").unwrap_or(0),
        comments_count: row.try_get("", "comments_count").unwrap_or(0),
        author,
        comments: None,
    }
}

pub(crate) fn page_count(total: i64, per_page: i64) -> i64 {
    if total % per_page == 0 {
        total / per_page
    } else {
        total / per_page + 1
    }
}

fn check_priority(priority: i32) -> Result<(), AppError> {
    if !(0..=2).contains(&priority) {
        return Err(AppError::validation("priority must be 0, 1 or 2"));
    }
    Ok(())
}

fn parse_target_date(input: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match input.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::validation("target_date must be formatted YYYY-MM-DD")),
    }
}

fn get_bool(row: &sea_orm::QueryResult, col: &str) -> bool {
    row.try_get::<bool>("", col)
        .ok()
        .or_else(|| row.try_get::<i32>("", col).ok().map(|v| v != 0))
        .unwrap_or(false)
}

fn get_date(row: &sea_orm::QueryResult, col: &str) -> Option<NaiveDate> {
    row.try_get::<NaiveDate>("", col).ok().or_else(|| {
        row.try_get::<String>("", col)
            .ok()
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
    })
}

fn get_datetime_utc(row: &sea_orm::QueryResult, col: &str) -> Option<DateTime<Utc>> {
    row.try_get::<DateTime<Utc>>("", col)
        .ok()
        .or_else(|| {
            row.try_get::<NaiveDateTime>("", col)
                .ok()
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        })
        .or_else(|| {
            row.try_get::<String>("", col)
                .ok()
                .and_then(parse_db_datetime)
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        })
}

fn parse_db_datetime(input: String) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&input, "%Y-%m-%d %H:%M:%S").ok().or_else(|| {
        DateTime::parse_from_rfc3339(&input)
            .ok()
            .map(|dt| dt.naive_utc())
    })
}
