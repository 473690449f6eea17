use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    models::{LoginReqDto, RegisterReq, TokenType, UserSql},
};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, Responder, get, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument};

fn expiry_timestamp(exp: usize) -> DateTime<Utc> {
    DateTime::from_timestamp(exp as i64, 0).unwrap_or_else(Utc::now)
}

/// User registration handler
pub async fn register(user: web::Json<RegisterReq>, pool: web::Data<PgPool>) -> impl Responder {
    let full_name = user.full_name.trim();
    let email = user.email.trim().to_lowercase();

    if full_name.is_empty() || email.is_empty() || user.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Name, email and password must not be empty"
        }));
    }

    let hashed = match hash_password(&user.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "Failed to hash password");
            return HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            }));
        }
    };

    let result = sqlx::query(
        r#"INSERT INTO users (full_name, email, password) VALUES ($1, $2, $3)"#,
    )
    .bind(full_name)
    .bind(&email)
    .bind(&hashed)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => HttpResponse::Created().json(json!({
            "message": "User registered successfully"
        })),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                // Unique violation on the email column
                if db_err.code().as_deref() == Some("23505") {
                    return HttpResponse::Conflict().json(json!({
                        "error": "Email already registered"
                    }));
                }
            }

            error!(error = %e, "Failed to register user");
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            }))
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return HttpResponse::BadRequest().body("Email or password required");
    }

    debug!("Fetching user from database");

    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, full_name, email, password
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(user.email.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    debug!("Password verified");

    let access_token = generate_access_token(
        db_user.id,
        db_user.email.clone(),
        db_user.full_name.clone(),
        &config.jwt_secret,
        config.access_token_ttl,
    );

    let (refresh_token, refresh_claims) = generate_refresh_token(
        db_user.id,
        db_user.email.clone(),
        db_user.full_name.clone(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    );

    debug!(
        user_id = db_user.id,
        jti = %refresh_claims.jti,
        "Storing refresh token"
    );

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO refresh_tokens (jti, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(&refresh_claims.jti)
    .bind(db_user.id)
    .bind(expiry_timestamp(refresh_claims.exp))
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to store refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
        // intentionally not failing login
    }

    info!("Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
    })
}

#[get("/me")]
pub async fn me(req: HttpRequest) -> impl Responder {
    match req.extensions().get::<crate::auth::auth::AuthUser>() {
        Some(user) => HttpResponse::Ok().json(json!({
            "user_id": user.user_id,
            "email": user.email,
            "full_name": user.full_name,
        })),
        None => HttpResponse::Unauthorized().body("No user"),
    }
}

#[derive(sqlx::FromRow)]
struct RefreshRow {
    user_id: i64,
    revoked: bool,
}

pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::Unauthorized().body("No token"),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::Unauthorized().body("Invalid token"),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::Unauthorized().finish(),
    };

    if claims.token_type != TokenType::Refresh {
        return HttpResponse::Unauthorized().finish();
    }

    let record = match sqlx::query_as::<_, RefreshRow>(
        r#"
        SELECT user_id, revoked
        FROM refresh_tokens
        WHERE jti = $1
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "Failed to look up refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let record = match record {
        Some(r) if !r.revoked => r,
        _ => return HttpResponse::Unauthorized().finish(),
    };

    // Rotate: revoke the presented token before issuing a replacement.
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = $1")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    let (new_refresh_token, new_claims) = generate_refresh_token(
        claims.user_id,
        claims.sub.clone(),
        claims.full_name.clone(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    );

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO refresh_tokens (jti, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(&new_claims.jti)
    .bind(record.user_id)
    .bind(expiry_timestamp(new_claims.exp))
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to store rotated refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    let access_token = generate_access_token(
        claims.user_id,
        claims.sub,
        claims.full_name,
        &config.jwt_secret,
        config.access_token_ttl,
    );

    HttpResponse::Ok().json(serde_json::json!({
        "access_token": access_token,
        "refresh_token": new_refresh_token
    }))
}

pub async fn logout(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::NoContent().finish(),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::NoContent().finish(),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // Only refresh tokens can be revoked.
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    let _ = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = $1
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await;

    // success (even if token didn't exist)
    HttpResponse::NoContent().finish()
}
