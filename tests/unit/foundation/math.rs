use super::*;

#[test]
fn fnv_is_stable_across_split_writes() {
    let mut a = Fnv1a64::new_default();
    a.write_bytes(b"errl-scene");
    let mut b = Fnv1a64::new_default();
    b.write_bytes(b"errl");
    b.write_bytes(b"-scene");
    assert_eq!(a.finish(), b.finish());

    let mut c = Fnv1a64::new_default();
    c.write_u64(7);
    assert_ne!(c.finish(), Fnv1a64::OFFSET_BASIS);
}

#[test]
fn premultiply_then_unpremultiply_restores_opaque_and_zeroes_transparent() {
    let mut px = vec![200, 100, 50, 255, 200, 100, 50, 0];
    premultiply_rgba8_in_place(&mut px);
    assert_eq!(&px[..4], &[200, 100, 50, 255]);
    assert_eq!(&px[4..], &[0, 0, 0, 0]);
    unpremultiply_rgba8_in_place(&mut px);
    assert_eq!(&px[..4], &[200, 100, 50, 255]);
}

#[test]
fn unpremultiply_half_alpha() {
    let mut px = vec![64, 32, 0, 128];
    unpremultiply_rgba8_in_place(&mut px);
    assert_eq!(px, vec![128, 64, 0, 128]);
}

#[test]
fn white_tint_is_identity_and_black_tint_darkens() {
    let src = vec![120, 60, 30, 200];
    assert_eq!(tint_rgba8_premul(&src, [255, 255, 255, 255]), src);
    assert_eq!(tint_rgba8_premul(&src, [0, 0, 0, 255]), vec![0, 0, 0, 200]);
}
