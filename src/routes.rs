use crate::{
    api::{attendance, clockout_link, employee},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    feed, jobs, storage,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Emailed clock-out link, change feed and photo serving are reachable
    // without a bearer token.
    cfg.service(
        web::resource("/clock-out").route(web::get().to(clockout_link::clock_out_by_token)),
    );
    cfg.service(web::resource("/events").route(web::get().to(feed::subscribe)));
    cfg.service(
        web::resource("/media/profile-photos/{filename}")
            .route(web::get().to(storage::serve_photo)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            // authentication
            .wrap(protected_limiter) // rate limiting
            .service(handlers::me)
            .service(
                web::scope("/employees")
                    // /employees
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employees/analytics/joining
                    .service(
                        web::resource("/analytics/joining")
                            .route(web::get().to(employee::joining_analytics)),
                    )
                    // /employees/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    // /employees/{id}/photo
                    .service(
                        web::resource("/{id}/photo")
                            .route(web::put().to(employee::upload_photo)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("").route(web::get().to(attendance::list_attendance)),
                    )
                    .service(
                        web::resource("/today")
                            .route(web::get().to(attendance::today_attendance)),
                    )
                    .service(
                        web::resource("/clock-in")
                            .route(web::post().to(attendance::clock_in)),
                    )
                    .service(
                        web::resource("/clock-out")
                            .route(web::post().to(attendance::clock_out)),
                    )
                    .service(
                        web::resource("/pause").route(web::post().to(attendance::pause_work)),
                    )
                    .service(
                        web::resource("/resume").route(web::post().to(attendance::resume_work)),
                    )
                    // /attendance/{id}/map
                    .service(
                        web::resource("/{id}/map").route(web::get().to(attendance::map_view)),
                    ),
            )
            .service(
                web::scope("/jobs").service(
                    web::resource("/check-overdue")
                        .route(web::post().to(jobs::overdue::trigger_sweep)),
                ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /refresh with refresh_token
//       └─ returns new access_token
