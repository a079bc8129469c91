use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::error;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::AuthUser;
use crate::entity::{comment, user};
use crate::error::AppError;
use crate::response::MessageResponse;
use crate::routes::to_rfc3339;
use crate::routes::user::{public_user_dto, UserDto};
use crate::routes::wish::find_public_wish;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{id:\\d+}")
            .route(web::put().to(update))
            .route(web::delete().to(remove)),
    );
}

#[derive(Serialize)]
pub(crate) struct CommentDto {
    pub id: i32,
    pub wish_id: i32,
    pub user_id: i32,
    pub content: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub author: UserDto,
}

#[derive(Deserialize)]
pub(crate) struct CommentRequest {
    content: Option<String>,
}

#[derive(Serialize)]
struct CommentResponse {
    message: String,
    comment: CommentDto,
}

#[derive(Serialize)]
struct CommentListResponse {
    comments: Vec<CommentDto>,
    total: i64,
}

pub(crate) fn to_comment_dto(model: &comment::Model, author: &user::Model) -> CommentDto {
    CommentDto {
        id: model.id,
        wish_id: model.wish_id,
        user_id: model.user_id,
        content: model.content.clone(),
        created_at: model.created_at.map(to_rfc3339),
        updated_at: model.updated_at.map(to_rfc3339),
        author: public_user_dto(author),
    }
}

pub(crate) async fn comments_for_wish(
    db: &DatabaseConnection,
    wish_id: i32,
) -> Result<Vec<CommentDto>, AppError> {
    let comments = comment::Entity::find()
        .filter(comment::Column::WishId.eq(wish_id))
        .order_by_desc(comment::Column::CreatedAt)
        .all(db)
        .await
        .map_err(AppError::db)?;

    let user_ids: Vec<i32> = comments.iter().map(|c| c.user_id).collect();
    let authors: HashMap<i32, user::Model> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await
        .map_err(AppError::db)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    comments
        .iter()
        .map(|c| {
            let author = authors.get(&c.user_id).ok_or_else(|| {
                error!("comment {} has no author row", c.id);
                AppError::Internal
            })?;
            Ok(to_comment_dto(c, author))
        })
        .collect()
}

pub(crate) async fn list_for_wish(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let wish = find_public_wish(db.get_ref(), *path).await?;
    let comments = comments_for_wish(db.get_ref(), wish.id).await?;
    let total = comments.len() as i64;
    Ok(HttpResponse::Ok().json(CommentListResponse { comments, total }))
}

pub(crate) async fn create(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<CommentRequest>,
) -> Result<HttpResponse, AppError> {
    let wish = find_public_wish(db.get_ref(), *path).await?;
    let content = payload.content.clone().unwrap_or_default().trim().to_string();
    if content.is_empty() {
        return Err(AppError::validation("content is required"));
    }

    let author = user::Entity::find_by_id(auth.user_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

    let now = Utc::now();
    let model = comment::ActiveModel {
        user_id: Set(auth.user_id),
        wish_id: Set(wish.id),
        content: Set(content),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };
    let inserted = model.insert(db.get_ref()).await.map_err(AppError::db)?;

    Ok(HttpResponse::Created().json(CommentResponse {
        message: "comment added".to_string(),
        comment: to_comment_dto(&inserted, &author),
    }))
}

async fn update(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<CommentRequest>,
) -> Result<HttpResponse, AppError> {
    let model = comment::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("comment not found"))?;
    if model.user_id != auth.user_id {
        return Err(AppError::forbidden("cannot modify another user's comment"));
    }

    let content = payload.content.clone().unwrap_or_default().trim().to_string();
    if content.is_empty() {
        return Err(AppError::validation("content is required"));
    }

    let active = comment::ActiveModel {
        id: Set(model.id),
        content: Set(content),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    let updated = comment::Entity::update(active)
        .exec(db.get_ref())
        .await
        .map_err(AppError::db)?;

    let author = user::Entity::find_by_id(updated.user_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

    Ok(HttpResponse::Ok().json(CommentResponse {
        message: "comment updated".to_string(),
        comment: to_comment_dto(&updated, &author),
    }))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let model = comment::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("comment not found"))?;
    if model.user_id != auth.user_id {
        return Err(AppError::forbidden("cannot delete another user's comment"));
    }

    comment::Entity::delete_by_id(model.id)
        .exec(db.get_ref())
        .await
        .map_err(AppError::db)?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "comment deleted".to_string(),
    }))
}
