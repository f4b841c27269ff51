use super::*;

fn frame(data: Vec<u8>) -> FrameRGBA {
    FrameRGBA {
        width: 2,
        height: 1,
        data,
        premultiplied: true,
    }
}

#[test]
fn pixel_reads_row_major() {
    let f = frame(vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(f.pixel(0, 0), Some([1, 2, 3, 4]));
    assert_eq!(f.pixel(1, 0), Some([5, 6, 7, 8]));
    assert_eq!(f.pixel(2, 0), None);
    assert_eq!(f.pixel(0, 1), None);
}

#[test]
fn fingerprint_tracks_pixels_and_size() {
    let a = frame(vec![0; 8]);
    let b = frame(vec![0; 8]);
    assert_eq!(a.fingerprint(), b.fingerprint());

    let c = frame(vec![0, 0, 0, 1, 0, 0, 0, 0]);
    assert_ne!(a.fingerprint(), c.fingerprint());

    let d = FrameRGBA {
        width: 1,
        height: 2,
        ..a.clone()
    };
    assert_ne!(a.fingerprint(), d.fingerprint());
}

#[test]
fn straight_alpha_copy_unpremultiplies() {
    let f = frame(vec![64, 32, 0, 128, 10, 20, 30, 255]);
    assert_eq!(f.to_straight_rgba(), vec![128, 64, 0, 128, 10, 20, 30, 255]);

    let straight = FrameRGBA {
        premultiplied: false,
        ..f.clone()
    };
    assert_eq!(straight.to_straight_rgba(), f.data);
}
