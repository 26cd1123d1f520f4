use crate::{
    error::PaintError,
    gateway::{client_identity, Gateway, FORWARDED_FOR_HEADER, REAL_IP_HEADER},
    models::ErrorBody,
};
use actix_web::{
    http::StatusCode, web, HttpRequest, HttpResponse, ResponseError,
};

impl ResponseError for PaintError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::from(self))
    }
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

async fn generate_image(
    gateway: web::Data<Gateway>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, PaintError> {
    let identity = client_identity(
        header(&req, FORWARDED_FOR_HEADER),
        header(&req, REAL_IP_HEADER),
    );
    let image = gateway.handle(&body, &identity).await?;
    Ok(HttpResponse::Ok().json(image))
}

/// Registers the generation route and its legacy alias.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/generate-image", web::post().to(generate_image))
        .route("/api/generateImage", web::post().to(generate_image));
}
