use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::entity::user;
use crate::error::AppError;
use crate::routes::to_rfc3339;
use crate::routes::wish::{query_wish_page, WishDto, WishPageQuery};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{id:\\d+}")
            .route(web::get().to(get_user))
            .route(web::put().to(update_user)),
    )
    .service(web::resource("/{id:\\d+}/wishes").route(web::get().to(list_user_wishes)));
}

#[derive(Serialize)]
pub(crate) struct UserDto {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    display_name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
}

#[derive(Serialize)]
struct UserResponse {
    user: UserDto,
}

#[derive(Serialize)]
struct UpdatedUserResponse {
    message: String,
    user: UserDto,
}

#[derive(Serialize)]
struct UserWishesResponse {
    wishes: Vec<WishDto>,
    total: i64,
}

pub(crate) fn public_user_dto(model: &user::Model) -> UserDto {
    UserDto {
        id: model.id,
        username: model.username.clone(),
        email: None,
        display_name: model.display_name.clone(),
        avatar_url: model.avatar_url.clone(),
        bio: model.bio.clone(),
        created_at: model.created_at.map(to_rfc3339),
    }
}

/// Same projection plus the email; only ever returned to the account owner.
pub(crate) fn owner_user_dto(model: &user::Model) -> UserDto {
    UserDto {
        email: Some(model.email.clone()),
        ..public_user_dto(model)
    }
}

async fn get_user(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let model = user::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(HttpResponse::Ok().json(UserResponse {
        user: public_user_dto(&model),
    }))
}

async fn update_user(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = *path;
    if auth.user_id != user_id {
        return Err(AppError::forbidden("cannot modify another user's profile"));
    }

    user::Entity::find_by_id(user_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let mut active = user::ActiveModel {
        id: Set(user_id),
        ..Default::default()
    };
    active.updated_at = Set(Some(Utc::now()));
    if let Some(v) = payload.display_name.clone() {
        active.display_name = Set(Some(v));
    }
    if let Some(v) = payload.avatar_url.clone() {
        active.avatar_url = Set(Some(v));
    }
    if let Some(v) = payload.bio.clone() {
        active.bio = Set(Some(v));
    }

    let updated = user::Entity::update(active)
        .exec(db.get_ref())
        .await
        .map_err(AppError::db)?;

    Ok(HttpResponse::Ok().json(UpdatedUserResponse {
        message: "profile updated".to_string(),
        user: owner_user_dto(&updated),
    }))
}

async fn list_user_wishes(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = *path;
    user::Entity::find_by_id(user_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let query = WishPageQuery {
        user_id: Some(user_id),
        category: None,
        status: None,
        search: None,
        sort_by: None,
        page: 1,
        per_page: None,
    };
    let (wishes, total) = query_wish_page(db.get_ref(), &query).await?;

    Ok(HttpResponse::Ok().json(UserWishesResponse { wishes, total }))
}
