use super::*;

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    let src = [200, 200, 200, 200];
    assert_eq!(over(dst, src, 0.0), dst);
}

#[test]
fn over_src_alpha_0_is_noop() {
    let dst = [10, 20, 30, 40];
    let src = [255, 255, 255, 0];
    assert_eq!(over(dst, src, 1.0), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn over_dst_transparent_returns_scaled_src() {
    let dst = [0, 0, 0, 0];
    let src = [100, 110, 120, 200];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn tint_endpoints() {
    let red = [255, 0, 0, 255];
    let blue = [0, 0, 255, 255];
    assert_eq!(tint(red, blue, 0.0), red);
    assert_eq!(tint(red, blue, 1.0), blue);
    assert_eq!(tint([0, 0, 0, 0], blue, 1.0), [0, 0, 0, 0]);
}

#[test]
fn tint_keeps_premultiplied_invariant() {
    let half = [100, 20, 0, 128];
    let out = tint(half, [255, 255, 255, 255], 0.5);
    assert_eq!(out[3], 128);
    assert!(out[..3].iter().all(|&c| c <= 128));
}
