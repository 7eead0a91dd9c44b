use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::*;

fn timeouts() -> HttpTimeouts {
    HttpTimeouts { request_secs: 5, connect_secs: 2 }
}

/// Serve exactly one HTTP response on an ephemeral port and return the base URL.
async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let head = format!("HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{addr}")
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

// --- Construction ---

#[test]
fn rejects_invalid_base_url() {
    let err = BackendClient::new("not a url", timeouts()).err().unwrap();
    assert!(matches!(err, MapError::ConfigParse(_)));
}

#[test]
fn rejects_non_base_url() {
    let err = BackendClient::new("mailto:ops@example.test", timeouts()).err().unwrap();
    assert!(err.to_string().contains("cannot be a base"));
}

// --- URLs ---

#[test]
fn metadata_url_layout() {
    let client = BackendClient::new("http://backend.test/api", timeouts()).unwrap();
    assert_eq!(client.metadata_url("deck-1").as_str(), "http://backend.test/api/asset-decks/deck-1/map-metadata");
}

#[test]
fn image_url_escapes_segments() {
    let client = BackendClient::new("http://backend.test/", timeouts()).unwrap();
    assert_eq!(
        client.image_url("SITE", "deck 1/a.png").as_str(),
        "http://backend.test/missions/SITE/deck%201%2Fa.png/map"
    );
}

// --- Fetches ---

#[tokio::test]
async fn fetch_metadata_parses_body() {
    let body = br#"{"mapName":"deck1.png","transform":{"scaleX":1,"scaleY":1,"offsetX":0,"offsetY":0}}"#.to_vec();
    let base = serve_once("200 OK", body).await;
    let client = BackendClient::new(&base, timeouts()).unwrap();
    let meta = client.fetch_metadata("deck-1").await.unwrap();
    assert_eq!(meta.map_name, "deck1.png");
}

#[tokio::test]
async fn fetch_metadata_maps_status_to_unavailable() {
    let base = serve_once("404 Not Found", Vec::new()).await;
    let client = BackendClient::new(&base, timeouts()).unwrap();
    let err = client.fetch_metadata("deck-1").await.unwrap_err();
    assert_eq!(err, MapError::metadata("deck-1", "status 404"));
}

#[tokio::test]
async fn fetch_metadata_rejects_malformed_body() {
    let base = serve_once("200 OK", b"<html>".to_vec()).await;
    let client = BackendClient::new(&base, timeouts()).unwrap();
    let err = client.fetch_metadata("deck-1").await.unwrap_err();
    assert!(err.to_string().contains("malformed payload"));
}

#[tokio::test]
async fn fetch_image_decodes_and_tracks_handle() {
    let base = serve_once("200 OK", png_bytes(6, 3)).await;
    let client = BackendClient::new(&base, timeouts()).unwrap();
    let image = client.fetch_image("SITE", "deck1.png").await.unwrap();
    assert_eq!((image.width(), image.height()), (6, 3));
    assert_eq!(client.handles().live_count(), 1);
    drop(image);
    assert_eq!(client.handles().live_count(), 0);
}

#[tokio::test]
async fn fetch_image_undecodable_is_unavailable() {
    let base = serve_once("200 OK", b"garbage".to_vec()).await;
    let client = BackendClient::new(&base, timeouts()).unwrap();
    let err = client.fetch_image("SITE", "deck1.png").await.unwrap_err();
    assert_eq!(err.error_code(), "E_IMAGE_UNAVAILABLE");
    assert_eq!(client.handles().live_count(), 0);
}

#[tokio::test]
async fn fetch_image_connection_refused_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = BackendClient::new(&format!("http://{addr}"), timeouts()).unwrap();
    let err = client.fetch_image("SITE", "deck1.png").await.unwrap_err();
    assert!(err.to_string().contains("request failed"));
}
