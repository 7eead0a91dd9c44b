use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::*;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

// --- Placeholder ---

#[test]
fn placeholder_is_shared_constant() {
    let a = LoadedImage::placeholder();
    let b = LoadedImage::placeholder();
    assert!(Arc::ptr_eq(a.raster(), b.raster()));
    assert!(a.is_placeholder());
    assert_eq!(a.handle_id(), None);
    assert_eq!(a.map_name(), None);
}

#[test]
fn placeholder_has_border_and_background() {
    let p = LoadedImage::placeholder();
    assert_eq!((p.width(), p.height()), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
    assert_eq!(p.raster().get_pixel(0, 0).0, PLACEHOLDER_INK_RGBA);
    assert_eq!(p.raster().get_pixel(PLACEHOLDER_WIDTH / 2, 20).0, PLACEHOLDER_BACKGROUND_RGBA);
}

// --- Registry ---

#[test]
fn handle_released_on_drop() {
    let registry = HandleRegistry::new();
    let handle = registry.acquire();
    let id = handle.id();
    assert!(registry.is_live(id));
    assert_eq!(registry.live_count(), 1);
    drop(handle);
    assert!(!registry.is_live(id));
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn handles_are_distinct() {
    let registry = HandleRegistry::new();
    let a = registry.acquire();
    let b = registry.acquire();
    assert_ne!(a.id(), b.id());
    assert_eq!(registry.live_count(), 2);
}

// --- decode_image ---

#[test]
fn decode_png_acquires_handle() {
    let registry = HandleRegistry::new();
    let image = decode_image(&png_bytes(8, 4), "SITE", "deck.png", &registry).unwrap();
    assert_eq!((image.width(), image.height()), (8, 4));
    assert!(!image.is_placeholder());
    assert_eq!(image.map_name(), Some("deck.png"));
    assert!(registry.is_live(image.handle_id().unwrap()));

    drop(image);
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn decode_garbage_is_unavailable_and_leaks_nothing() {
    let registry = HandleRegistry::new();
    let err = decode_image(b"definitely not a png", "SITE", "deck.png", &registry).unwrap_err();
    assert_eq!(err.error_code(), "E_IMAGE_UNAVAILABLE");
    assert!(err.to_string().contains("SITE/deck.png"));
    assert_eq!(registry.live_count(), 0);
}
