use std::sync::Arc;

use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use tracing::warn;

use crate::{
    api::{attendance, division, employee, permission, position, role, status, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP token bucket refilled evenly over a minute.
fn build_limiter(requests_per_min: u32) -> Limiter {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            warn!(requests_per_min, "Rejected rate limit, using governor defaults");
            GovernorConfig::default()
        });
    Arc::new(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = build_limiter(config.rate_login_per_min);
    let refresh_limiter = build_limiter(config.rate_refresh_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(web::resource("/auth/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/attendance")
                    .service(web::resource("/checkin").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/checkout").route(web::post().to(attendance::check_out)))
                    .service(web::resource("/status").route(web::get().to(attendance::status)))
                    .service(
                        web::resource("/user/{user_id}").route(web::get().to(attendance::history)),
                    ),
            )
            .service(
                web::scope("/user")
                    .service(
                        web::resource("")
                            .route(web::get().to(user::list_users))
                            .route(web::post().to(user::create_user)),
                    )
                    // before /{id}
                    .service(
                        web::resource("/check-username").route(web::post().to(user::check_username)),
                    )
                    .service(web::resource("/check-email").route(web::post().to(user::check_email)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::delete_user)),
                    ),
            )
            .service(
                web::scope("/role")
                    .service(
                        web::resource("")
                            .route(web::get().to(role::list_roles))
                            .route(web::post().to(role::create_role)),
                    )
                    .service(
                        web::resource("/{id}/permissions")
                            .route(web::get().to(role::role_permissions))
                            .route(web::post().to(role::assign_permission)),
                    )
                    .service(
                        web::resource("/{id}/permissions/{permission_id}")
                            .route(web::delete().to(role::remove_permission)),
                    ),
            )
            .service(
                web::resource("/permission")
                    .route(web::get().to(permission::list_permissions))
                    .route(web::post().to(permission::create_permission)),
            )
            .service(
                web::scope("/status")
                    .service(
                        web::resource("")
                            .route(web::get().to(status::list_statuses))
                            .route(web::post().to(status::create_status)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(status::get_status))
                            .route(web::put().to(status::update_status))
                            .route(web::delete().to(status::delete_status)),
                    ),
            )
            .service(
                web::scope("/division")
                    .service(
                        web::resource("")
                            .route(web::get().to(division::list_divisions))
                            .route(web::post().to(division::create_division)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(division::get_division))
                            .route(web::put().to(division::update_division))
                            .route(web::delete().to(division::delete_division)),
                    ),
            )
            .service(
                web::scope("/position")
                    .service(
                        web::resource("")
                            .route(web::get().to(position::list_positions))
                            .route(web::post().to(position::create_position)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(position::get_position))
                            .route(web::put().to(position::update_position))
                            .route(web::delete().to(position::delete_position)),
                    ),
            )
            .service(
                web::scope("/employee")
                    .service(
                        web::resource("")
                            .route(web::get().to(employee::list_employees))
                            .route(web::post().to(employee::create_employee)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            ),
    );
}
