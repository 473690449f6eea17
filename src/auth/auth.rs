use crate::config::Config;
use crate::models::{Claims, TokenType};
use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};
use jsonwebtoken::decode;
use jsonwebtoken::{DecodingKey, Validation};

#[derive(Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(d) => d,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        // Refresh tokens are only good for /auth/refresh and /auth/logout.
        if data.claims.token_type != TokenType::Access {
            return ready(Err(ErrorUnauthorized("Invalid token")));
        }

        ready(Ok(AuthUser {
            user_id: data.claims.user_id,
            email: data.claims.sub,
            full_name: data.claims.full_name,
        }))
    }
}
