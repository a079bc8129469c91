use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify};
use chrono::Utc;
use log::info;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::{issue_token, AuthUser};
use crate::config::AppConfig;
use crate::entity::user;
use crate::error::AppError;
use crate::routes::user::{owner_user_dto, UserDto};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/register").route(web::post().to(register)))
        .service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/me").route(web::get().to(me)))
        .service(web::resource("/refresh").route(web::post().to(refresh)));
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct AuthResponse {
    message: String,
    token: String,
    user: UserDto,
}

#[derive(Serialize)]
struct TokenResponse {
    message: String,
    token: String,
}

#[derive(Serialize)]
struct MeResponse {
    user: UserDto,
}

async fn register(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let username = payload.username.clone().unwrap_or_default().trim().to_string();
    if username.is_empty() {
        return Err(AppError::validation("username is required"));
    }
    let email = payload.email.clone().unwrap_or_default().trim().to_string();
    if email.is_empty() {
        return Err(AppError::validation("email is required"));
    }
    let password = payload.password.clone().unwrap_or_default();
    if password.trim().is_empty() {
        return Err(AppError::validation("password is required"));
    }

    let taken = user::Entity::find()
        .filter(user::Column::Username.eq(username.clone()))
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?;
    if taken.is_some() {
        return Err(AppError::conflict("username already exists"));
    }
    let taken = user::Entity::find()
        .filter(user::Column::Email.eq(email.clone()))
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?;
    if taken.is_some() {
        return Err(AppError::conflict("email already registered"));
    }

    let display_name = payload
        .display_name
        .clone()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| username.clone());

    let password_hash = hash(password, 10).map_err(|_| AppError::Internal)?;
    let now = Utc::now();
    let model = user::ActiveModel {
        username: Set(username.clone()),
        email: Set(email),
        password_hash: Set(password_hash),
        display_name: Set(Some(display_name)),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };

    // A concurrent register can still hit the UNIQUE constraints.
    let inserted = match model.insert(db.get_ref()).await {
        Ok(u) => u,
        Err(err) => {
            let msg = err.to_string();
            if msg.contains("UNIQUE") || msg.contains("Duplicate") {
                return Err(AppError::conflict("username or email already exists"));
            }
            return Err(AppError::db(err));
        }
    };
    info!("user registered id={} username={}", inserted.id, username);

    let token = issue_token(&config, inserted.id)?;
    Ok(HttpResponse::Created().json(AuthResponse {
        message: "user registered".to_string(),
        token,
        user: owner_user_dto(&inserted),
    }))
}

async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let username = payload.username.clone().unwrap_or_default().trim().to_string();
    if username.is_empty() {
        return Err(AppError::validation("username is required"));
    }
    let password = payload.password.clone().unwrap_or_default();
    if password.trim().is_empty() {
        return Err(AppError::validation("password is required"));
    }

    let model = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::unauthorized("invalid username or password"))?;

    let ok = verify(password, &model.password_hash).map_err(|_| AppError::Internal)?;
    if !ok {
        return Err(AppError::unauthorized("invalid username or password"));
    }

    let token = issue_token(&config, model.id)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "login successful".to_string(),
        token,
        user: owner_user_dto(&model),
    }))
}

async fn me(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let model = user::Entity::find_by_id(auth.user_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::db)?
        .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

    Ok(HttpResponse::Ok().json(MeResponse {
        user: owner_user_dto(&model),
    }))
}

async fn refresh(
    config: web::Data<AppConfig>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let token = issue_token(&config, auth.user_id)?;
    Ok(HttpResponse::Ok().json(TokenResponse {
        message: "token refreshed".to_string(),
        token,
    }))
}
