use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use log::debug;
use rocket::http::uri::Origin;
use rocket::http::{ContentType, Header, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::State;
use tokio::fs::File;

use crate::api::error::ApiError;
use crate::api::request::RequestDescriptor;
use crate::cache::FileCache;
use crate::catalog::TransformCatalog;
use crate::fetch::Fetcher;
use crate::transform::{self, Invoker, TransformError};

/// Streams an image file back to the client.
///
/// The body is fed straight from the open handle; callers may unlink the
/// underlying path before the response is sent.
pub struct ImageResponse {
    file: File,
    len: Option<u64>,
}

impl ImageResponse {
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path).await?;
        let len = file.metadata().await.ok().map(|m| m.len());
        Ok(Self { file, len })
    }
}

impl<'r> Responder<'r, 'static> for ImageResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let last_modified = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let mut response = Response::build();
        response.header(ContentType::JPEG);
        response.header(Header::new("Last-Modified", last_modified));
        response.sized_body(self.len.map(|len| len as usize), self.file);
        response.ok()
    }
}

#[get("/favicon.ico")]
pub fn favicon() -> Status {
    Status::NotFound
}

#[get("/<_..>")]
pub async fn transform_image(
    uri: &Origin<'_>,
    catalog: &State<Arc<TransformCatalog>>,
    cache: &State<FileCache>,
    fetcher: &State<Fetcher>,
    invoker: &State<Invoker>,
) -> Result<ImageResponse, ApiError> {
    let descriptor = RequestDescriptor::parse(&uri.to_string())?;
    debug!(
        "{} {}x{} from {}",
        descriptor.transform, descriptor.width, descriptor.height, descriptor.source
    );

    let source = fetcher
        .ensure_cached(cache, &descriptor.cache_key(), &descriptor.source_url())
        .await?;

    if descriptor.transform == transform::IDENTITY {
        return Ok(ImageResponse::open(&source).await?);
    }

    let templates = catalog
        .get(&descriptor.transform)
        .ok_or_else(|| TransformError::UnknownTransform(descriptor.transform.clone()))?;
    let args = transform::build_args(&templates, descriptor.width, descriptor.height);
    let scratch = invoker.run(&args, &source).await?;
    let response = ImageResponse::open(&scratch).await?;
    // scratch path is unlinked when it drops; the open handle keeps streaming
    Ok(response)
}
