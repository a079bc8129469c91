use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::entity::like;
use crate::error::AppError;
use crate::response::MessageResponse;
use crate::routes::to_rfc3339;
use crate::routes::wish::find_public_wish;

#[derive(Serialize)]
pub(crate) struct LikeDto {
    pub id: i32,
    pub wish_id: i32,
    pub user_id: i32,
    pub created_at: Option<String>,
}

#[derive(Serialize)]
struct LikeResponse {
    message: String,
    like: LikeDto,
}

#[derive(Serialize)]
struct LikeListResponse {
    likes: Vec<LikeDto>,
    total: i64,
}

fn to_like_dto(model: &like::Model) -> LikeDto {
    LikeDto {
        id: model.id,
        wish_id: model.wish_id,
        user_id: model.user_id,
        created_at: model.created_at.map(to_rfc3339),
    }
}

pub(crate) async fn like(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let wish = find_public_wish(db.get_ref(), *path).await?;

    let existing = like::Entity::find()
        .filter(like::Column::UserId.eq(auth.user_id))
        .filter(like::Column::WishId.eq(wish.id))
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?;
    if existing.is_some() {
        return Err(AppError::validation("wish already liked"));
    }

    let model = like::ActiveModel {
        user_id: Set(auth.user_id),
        wish_id: Set(wish.id),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    // Concurrent double-likes slip past the check above; the UNIQUE
    // (user_id, wish_id) index settles them here.
    let inserted = match model.insert(db.get_ref()).await {
        Ok(m) => m,
        Err(err) => {
            let msg = err.to_string();
            if msg.contains("UNIQUE") || msg.contains("Duplicate") {
                return Err(AppError::validation("wish already liked"));
            }
            return Err(AppError::db(err));
        }
    };

    Ok(HttpResponse::Created().json(LikeResponse {
        message: "wish liked".to_string(),
        like: to_like_dto(&inserted),
    }))
}

pub(crate) async fn unlike(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let wish = find_public_wish(db.get_ref(), *path).await?;

    let result = like::Entity::delete_many()
        .filter(like::Column::UserId.eq(auth.user_id))
        .filter(like::Column::WishId.eq(wish.id))
        .exec(db.get_ref())
        .await
        .map_err(AppError::db)?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("like not found"));
    }

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "wish unliked".to_string(),
    }))
}

pub(crate) async fn list(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let wish = find_public_wish(db.get_ref(), *path).await?;

    let likes = like::Entity::find()
        .filter(like::Column::WishId.eq(wish.id))
        .order_by_desc(like::Column::CreatedAt)
        .all(db.get_ref())
        .await
        .map_err(AppError::db)?;

    let dtos: Vec<LikeDto> = likes.iter().map(to_like_dto).collect();
    let total = dtos.len() as i64;
    Ok(HttpResponse::Ok().json(LikeListResponse { likes: dtos, total }))
}
