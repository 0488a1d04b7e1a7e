use image::{GrayImage, Luma, Rgb, RgbImage};
use stylecam_vision::composite::composite;
use stylecam_vision::segmentation::{letterbox, unletterbox};
use stylecam_vision::{MaskMode, Zoom};

/// A face mask computed on the zoomed frame lines up with the zoomed frame.
#[test]
fn mask_follows_zoomed_frame() {
    let frame = RgbImage::from_fn(320, 240, |x, _| {
        if x < 160 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });

    let mut zoom = Zoom::default();
    zoom.zoom_in();
    zoom.zoom_in();
    zoom.focus(0, 120, 320, 240);
    let zoomed = zoom.apply(&frame);
    assert_eq!(zoomed.dimensions(), (320, 240));
    // focused on the left edge: the crop is clamped to x = 0
    assert_eq!(zoom.crop_rect(320, 240).x, 0);

    // "segment" the bright half through the letterbox round trip
    let (canvas, placement) = letterbox(&zoomed, 256);
    let square = GrayImage::from_fn(256, 256, |x, y| {
        Luma([if canvas.get_pixel(x, y).0[0] > 127 { 255 } else { 0 }])
    });
    let mask = unletterbox(&square, placement, 320, 240);

    let stylized = RgbImage::from_pixel(320, 240, Rgb([0, 255, 0]));
    let out = composite(&zoomed, &stylized, &mask, MaskMode::StyleFace).unwrap();
    assert_eq!(out.get_pixel(5, 120), &Rgb([0, 255, 0]));
    assert_eq!(out.get_pixel(315, 120), &Rgb([0, 0, 0]));

    let out = composite(&zoomed, &stylized, &mask, MaskMode::StyleBackground).unwrap();
    assert_eq!(out.get_pixel(5, 120), &Rgb([255, 255, 255]));
    assert_eq!(out.get_pixel(315, 120), &Rgb([0, 255, 0]));
}
