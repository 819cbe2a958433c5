use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::logger::RequestLogger;
use crate::middleware::AuthGate;
use crate::routes::{get_current_user, health_check, login, logout, refresh, register};

/// Build the HTTP server around an already configured `AuthService`.
///
/// The service is constructed (and its configuration validated) before
/// this is called, so a misconfigured process never binds a listener.
pub fn run(listener: TcpListener, auth_service: AuthService) -> Result<Server, std::io::Error> {
    let codec = auth_service.codec().clone();
    let auth_service = web::Data::new(auth_service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(auth_service.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout)),
            )
            // Protected routes (require a bearer access token)
            .service(
                web::scope("/api")
                    .wrap(AuthGate::new(codec.clone()))
                    .route("/me", web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
