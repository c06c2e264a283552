use rocket::http::{ContentType, Status};
use serde_json::json;

use crate::api::request::ParseError;
use crate::cache::CacheError;
use crate::fetch::FetchError;
use crate::transform::TransformError;

#[derive(Debug)]
pub enum ApiError {
    Parse(ParseError),
    Cache(CacheError),
    Fetch(FetchError),
    Transform(TransformError),
}

impl From<ParseError> for ApiError {
    fn from(error: ParseError) -> Self {
        ApiError::Parse(error)
    }
}

impl From<CacheError> for ApiError {
    fn from(error: CacheError) -> Self {
        ApiError::Cache(error)
    }
}

impl From<FetchError> for ApiError {
    fn from(error: FetchError) -> Self {
        ApiError::Fetch(error)
    }
}

impl From<TransformError> for ApiError {
    fn from(error: TransformError) -> Self {
        ApiError::Transform(error)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        ApiError::Cache(CacheError::Io(error))
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let (status, error, message) = match &self {
            ApiError::Parse(e) => (Status::BadRequest, "Invalid request", e.to_string()),
            ApiError::Cache(e) => (Status::BadGateway, "Cache failure", e.to_string()),
            ApiError::Fetch(e) => (Status::BadGateway, "Upstream failure", e.to_string()),
            ApiError::Transform(e) => (Status::BadGateway, "Transform failure", e.to_string()),
        };

        let body = json!({
            "error": error,
            "message": message
        })
        .to_string();

        rocket::Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(None, std::io::Cursor::new(body))
            .ok()
    }
}
