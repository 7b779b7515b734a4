//! Blur pipeline tests against a mock HTTP image host.

use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use lenspost::concepts::Blurring;
use lenspost::db::Database;
use lenspost::error::ApiError;
use std::io::Cursor;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_blurring() -> (Blurring, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (Blurring::new(db.pool().clone()), temp_dir)
}

/// A small solid-color PNG to serve from the mock host.
fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbaImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = image::Rgba([180, 40, 40, 255]);
    }

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("Failed to encode sample image");
    out.into_inner()
}

#[tokio::test]
async fn test_blur_returns_png_with_original_dimensions() {
    let (blurring, _tmp) = setup_blurring().await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_png(16, 12)))
        .mount(&server)
        .await;

    let url = format!("{}/photo.png", server.uri());
    let bytes = blurring.blur(&url, None).await.expect("blur failed");

    // PNG magic bytes, then a decodable image of the source dimensions.
    assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    let decoded = image::load_from_memory(&bytes).expect("output not decodable");
    assert_eq!(decoded.width(), 16);
    assert_eq!(decoded.height(), 12);
}

#[tokio::test]
async fn test_blur_at_explicit_intensity() {
    let (blurring, _tmp) = setup_blurring().await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_png(8, 8)))
        .mount(&server)
        .await;

    let url = format!("{}/photo.png", server.uri());
    let bytes = blurring
        .blur(&url, Some(50.0))
        .await
        .expect("blur failed");

    let decoded = image::load_from_memory(&bytes).expect("output not decodable");
    assert_eq!(decoded.width(), 8);
    assert_eq!(decoded.height(), 8);
}

#[tokio::test]
async fn test_blur_fails_on_http_error() {
    let (blurring, _tmp) = setup_blurring().await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/missing.png", server.uri());
    let result = blurring.blur(&url, None).await;
    assert!(matches!(result, Err(ApiError::Internal(_))));
}

#[tokio::test]
async fn test_blur_fails_on_non_image_body() {
    let (blurring, _tmp) = setup_blurring().await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not an image</html>"))
        .mount(&server)
        .await;

    let url = format!("{}/page.html", server.uri());
    let result = blurring.blur(&url, None).await;
    assert!(matches!(result, Err(ApiError::Internal(_))));
}
