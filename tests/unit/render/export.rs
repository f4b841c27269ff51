use std::sync::Arc;

use base64::Engine as _;

use super::*;
use crate::assets::registry::{AssetRecord, StaticAssetRegistry};
use crate::assets::source::AssetSource;
use crate::render::cpu::RendererOpts;
use crate::scene::model::{EntityTransform, create_base_scene};

struct OneFile(Vec<u8>);

impl AssetSource for OneFile {
    fn fetch(&self, _file_path: &str) -> SceneResult<Vec<u8>> {
        Ok(self.0.clone())
    }
}

fn svg_dot() -> Vec<u8> {
    concat!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">"##,
        r##"<rect width="10" height="10" fill="#00ff00"/></svg>"##,
    )
    .as_bytes()
    .to_vec()
}

fn renderer() -> SceneRenderer {
    let registry = StaticAssetRegistry::new([AssetRecord::new("dot", "dot.svg")]);
    let opts = RendererOpts {
        logical_unit: 32.0,
        loader_threads: Some(1),
        ..RendererOpts::default()
    };
    SceneRenderer::new(Arc::new(registry), Arc::new(OneFile(svg_dot())), opts).unwrap()
}

fn scene() -> ErrlScene {
    let mut scene = create_base_scene("export", Some("dot"));
    scene.entities[0].transform = EntityTransform::at(960.0, 540.0).with_scale(4.0);
    scene
}

fn small_opts() -> ImageExportOpts {
    ImageExportOpts {
        width: 192,
        height: 108,
        ..ImageExportOpts::default()
    }
}

#[test]
fn export_waits_for_assets_without_mounting() {
    let mut r = renderer();
    let (frame, report) = r.render_frame(&scene(), 0.0, &small_opts()).unwrap();
    assert!(!r.is_mounted());
    assert!(report.is_complete());
    assert_eq!(report.cached, 1);
    assert_eq!((frame.width, frame.height), (192, 108));
    assert_eq!(frame.pixel(96, 54), Some([0, 255, 0, 255]));
}

#[test]
fn zero_wait_exports_placeholders() {
    let mut r = renderer();
    let opts = ImageExportOpts {
        asset_wait: Duration::ZERO,
        ..small_opts()
    };
    let (_, report) = r.render_frame(&scene(), 0.0, &opts).unwrap();
    assert_eq!(report.placeholders, 1);
}

#[test]
fn export_leaves_mounted_surface_alone() {
    let mut r = renderer();
    r.mount(SurfaceSize::new(40, 30).unwrap()).unwrap();
    r.render_frame(&scene(), 0.0, &small_opts()).unwrap();
    assert_eq!(r.surface_size(), Some(SurfaceSize::new(40, 30).unwrap()));
    assert_eq!(r.snapshot().unwrap().width, 40);
}

#[test]
fn transparent_export_has_clear_corners() {
    let mut r = renderer();
    let opts = ImageExportOpts {
        transparent_bg: true,
        ..small_opts()
    };
    let (frame, _) = r.render_frame(&scene(), 0.0, &opts).unwrap();
    assert_eq!(frame.pixel(0, 0), Some([0, 0, 0, 0]));
}

#[test]
fn data_url_holds_a_png() {
    let mut r = renderer();
    let url = r.render_to_image(&scene(), 0.0, &small_opts()).unwrap();
    let b64 = url.strip_prefix("data:image/png;base64,").unwrap();
    let bytes = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (192, 108));
}

#[test]
fn rejects_zero_sized_export() {
    let mut r = renderer();
    let opts = ImageExportOpts {
        width: 0,
        ..small_opts()
    };
    assert!(r.render_frame(&scene(), 0.0, &opts).is_err());
}
