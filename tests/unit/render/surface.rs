use super::*;

const RED: PremulRgba8 = [255, 0, 0, 255];

fn opaque_count(s: &Surface) -> usize {
    s.data.chunks_exact(4).filter(|px| px[3] == 255).count()
}

#[test]
fn fill_quad_identity_covers_exact_pixels() {
    let mut s = Surface::new(8, 8);
    let area = s.fill_quad(
        Affine::translate((2.0, 3.0)),
        Vec2::new(4.0, 2.0),
        RED,
        1.0,
        s.bounds(),
    );
    assert_eq!(area, IntRect::new(2, 3, 6, 5));
    assert_eq!(opaque_count(&s), 8);
    assert_eq!(s.pixel(2, 3), RED);
    assert_eq!(s.pixel(1, 3), [0, 0, 0, 0]);
}

#[test]
fn fill_quad_respects_clip_and_bounds() {
    let mut s = Surface::new(8, 8);
    let area = s.fill_quad(
        Affine::translate((-2.0, -2.0)),
        Vec2::new(20.0, 20.0),
        RED,
        1.0,
        IntRect::new(0, 0, 3, 8),
    );
    assert_eq!(area, IntRect::new(0, 0, 3, 8));
    assert_eq!(opaque_count(&s), 24);
}

#[test]
fn singular_matrix_draws_nothing() {
    let mut s = Surface::new(8, 8);
    let area = s.fill_quad(
        Affine::scale_non_uniform(0.0, 1.0),
        Vec2::new(4.0, 4.0),
        RED,
        1.0,
        s.bounds(),
    );
    assert!(area.is_empty());
    assert_eq!(opaque_count(&s), 0);
}

#[test]
fn scaled_bitmap_samples_nearest() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&RED);
    bytes.extend_from_slice(&[0, 0, 255, 255]);
    let bm = Bitmap::new(2, 1, bytes).unwrap();

    let mut s = Surface::new(4, 2);
    let area = s.draw_bitmap(Affine::scale(2.0), &bm, 1.0, s.bounds());
    assert_eq!(area, IntRect::new(0, 0, 4, 2));
    assert_eq!(s.pixel(1, 1), RED);
    assert_eq!(s.pixel(2, 0), [0, 0, 255, 255]);
}

#[test]
fn composite_from_only_touches_area() {
    let mut layer = Surface::new(4, 4);
    layer.fill_quad(Affine::IDENTITY, Vec2::new(4.0, 4.0), RED, 1.0, layer.bounds());

    let mut dst = Surface::new(4, 4);
    dst.composite_from(&layer, 1.0, IntRect::new(0, 0, 2, 4))
        .unwrap();
    assert_eq!(opaque_count(&dst), 8);
    assert_eq!(dst.pixel(3, 0), [0, 0, 0, 0]);
}

#[test]
fn composite_from_rejects_mismatched_sizes() {
    let layer = Surface::new(2, 2);
    let mut dst = Surface::new(4, 4);
    assert!(dst.composite_from(&layer, 1.0, dst.bounds()).is_err());
}
