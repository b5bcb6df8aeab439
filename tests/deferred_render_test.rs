#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
mod gpu {
    use enjon::{
        DebugView, TargetKey,
        data_structures::{light::DirectionalLight, renderable::Renderable},
        resources::{CUBE_MESH, DEFAULT_MATERIAL},
        targets::GBufferChannel,
    };

    use crate::common::{Harness, VIEWPORT, pixel_at, pixels};

    #[tokio::test]
    async fn empty_scene_on_black_composites_to_black() {
        let mut h = Harness::new().await.unwrap();
        h.render().unwrap();

        let composite = pixels(&h.renderer.read_target(&h.device, &h.queue, TargetKey::Composite).unwrap());
        assert_eq!(composite.len(), (VIEWPORT.0 * VIEWPORT.1) as usize);
        assert!(composite.iter().all(|p| *p == [0, 0, 0, 255]));
        assert!(h.presented().unwrap().iter().all(|p| *p == [0, 0, 0, 255]));
    }

    #[tokio::test]
    async fn uniform_background_stays_uniform_through_bloom_and_fxaa() {
        let mut h = Harness::new().await.unwrap();
        h.settings.background = wgpu::Color::WHITE;
        h.render().unwrap();

        let presented = h.presented().unwrap();
        let first = presented[0];
        assert!(first[0] > 150, "tone mapped white too dark: {first:?}");
        assert_eq!(first[0], first[1]);
        assert_eq!(first[1], first[2]);
        for p in &presented {
            for c in 0..3 {
                assert!(p[c].abs_diff(first[c]) <= 2, "{p:?} differs from {first:?}");
            }
        }
    }

    #[tokio::test]
    async fn lit_cube_is_brighter_than_the_background() {
        let mut h = Harness::new().await.unwrap();
        let cube = Renderable::new(h.assets.mesh(CUBE_MESH), h.assets.material(DEFAULT_MATERIAL));
        h.scene.add_renderable(cube);
        h.scene.add_directional_light(DirectionalLight::new(
            cgmath::Vector3::new(0.0, 0.0, -1.0),
            cgmath::Vector3::new(1.0, 1.0, 1.0),
            2.0,
        ));
        h.render().unwrap();

        let presented = h.presented().unwrap();
        let (w, h_) = VIEWPORT;
        let centre = pixel_at(&presented, w, w / 2, h_ / 2);
        let corner = pixel_at(&presented, w, 0, 0);
        assert!(centre[0] > corner[0] + 40, "centre {centre:?} corner {corner:?}");

        let position = h.renderer.gbuffer().texture(GBufferChannel::Position);
        assert_eq!(position.size(), VIEWPORT);
    }

    #[tokio::test]
    async fn debug_view_presents_the_selected_gbuffer_channel() {
        let mut h = Harness::new().await.unwrap();
        h.settings.background = wgpu::Color::RED;
        h.settings.debug_view = DebugView::GBuffer(GBufferChannel::Albedo);
        h.render().unwrap();

        assert!(h.presented().unwrap().iter().all(|p| *p == [255, 0, 0, 255]));
    }

    #[tokio::test]
    async fn disabled_cascades_and_fxaa_still_render() {
        let mut h = Harness::new().await.unwrap();
        h.settings.fxaa.enabled = false;
        enjon::cvars::apply_script(&mut h.settings, "blur_iter_small 0\nblur_iter_large 0").unwrap();
        h.render().unwrap();
        h.render().unwrap();

        assert!(h.presented().unwrap().iter().all(|p| *p == [0, 0, 0, 255]));
    }

    #[tokio::test]
    async fn resize_reallocates_every_target_with_the_same_layout() {
        let mut h = Harness::new().await.unwrap();
        let before: Vec<_> = (0..h.renderer.gbuffer().attachment_count())
            .map(|i| h.renderer.gbuffer().texture_at(i).clone())
            .collect();
        let lighting_before = h.renderer.target(TargetKey::Lighting).unwrap().texture().id;

        h.renderer.resize(&h.device, 128, 96);

        let gbuffer = h.renderer.gbuffer();
        assert_eq!(gbuffer.attachment_count(), before.len());
        assert_eq!(gbuffer.resolution(), (128, 96));
        for (i, old) in before.iter().enumerate() {
            let new = gbuffer.texture_at(i);
            assert_eq!(new.format, old.format);
            assert_ne!(new.id, old.id);
            assert_eq!(new.size(), (128, 96));
        }
        let lighting = h.renderer.target(TargetKey::Lighting).unwrap();
        assert_ne!(lighting.texture().id, lighting_before);
        assert_eq!(lighting.dimensions(), (128, 96));
        let luminance = h.renderer.target(TargetKey::Luminance).unwrap();
        assert_eq!(luminance.dimensions(), (64, 48));
    }

    #[tokio::test]
    async fn gbuffer_and_backbuffer_cannot_be_read_as_targets() {
        let mut h = Harness::new().await.unwrap();
        assert!(h.renderer.read_target(&h.device, &h.queue, TargetKey::GBuffer).is_err());
        assert!(h.renderer.read_target(&h.device, &h.queue, TargetKey::Backbuffer).is_err());
    }
}
