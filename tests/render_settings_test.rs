use enjon::{
    DebugView, FramePlan, PassKind, RenderSettings, TargetKey, cvars,
    renderer::BlurDirection,
    settings::{Cascade, MAX_BLUR_ITERATIONS},
};

fn blurs_of(plan: &FramePlan, cascade: Cascade) -> usize {
    plan.count(|k| matches!(k, PassKind::Blur { cascade: c, .. } if *c == cascade))
}

#[test]
fn default_settings_plan_the_full_pipeline() {
    let plan = FramePlan::build(&RenderSettings::default());
    plan.validate().unwrap();

    let kinds: Vec<_> = plan
        .steps()
        .iter()
        .filter(|s| !matches!(s.kind, PassKind::Blur { .. }))
        .map(|s| s.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            PassKind::GBuffer,
            PassKind::Lighting,
            PassKind::Luminance,
            PassKind::Composite,
            PassKind::Fxaa,
            PassKind::Present,
        ]
    );
    assert_eq!(plan.presented(), TargetKey::Fxaa);
    assert!(plan.steps().iter().all(|s| s.clear));
}

#[test]
fn script_reshapes_the_frame() {
    let mut settings = RenderSettings::default();
    let applied = cvars::apply_script(
        &mut settings,
        "# no large bloom, no anti-aliasing\nblur_iter_large 0\nblur_iter_small 1\nfxaa_enabled off\n",
    )
    .unwrap();
    assert_eq!(applied, 3);

    let plan = FramePlan::build(&settings);
    plan.validate().unwrap();
    assert_eq!(blurs_of(&plan, Cascade::Small), 2);
    assert_eq!(blurs_of(&plan, Cascade::Large), 0);
    assert_eq!(plan.cascade_output(Cascade::Large), plan.cascade_output(Cascade::Medium));
    assert_eq!(plan.count(|k| *k == PassKind::Fxaa), 0);
    assert_eq!(plan.final_image(), TargetKey::Composite);
    assert_eq!(plan.presented(), TargetKey::Composite);
}

#[test]
fn iteration_counts_are_clamped_before_planning() {
    let mut settings = RenderSettings::default();
    cvars::apply_script(&mut settings, "blur_iter_medium 1000").unwrap();

    let plan = FramePlan::build(&settings);
    assert_eq!(blurs_of(&plan, Cascade::Medium), 2 * MAX_BLUR_ITERATIONS as usize);
    plan.validate().unwrap();
}

#[test]
fn bloom_debug_view_presents_the_cascade_output() {
    let mut settings = RenderSettings::default();
    settings.debug_view = DebugView::Bloom(Cascade::Medium);

    let plan = FramePlan::build(&settings);
    assert_eq!(
        plan.presented(),
        TargetKey::Blur(Cascade::Medium, BlurDirection::Vertical)
    );
    // the final image is still produced
    assert_eq!(plan.count(|k| *k == PassKind::Composite), 1);
}

#[test]
fn scripts_fail_on_unknown_variables_and_keep_earlier_lines() {
    let mut settings = RenderSettings::default();
    let err = cvars::apply_script(&mut settings, "exposure 2.5\nbloom_colour 1").unwrap_err();
    assert!(format!("{err:#}").contains("line 2"));
    assert_eq!(cvars::get(&settings, "exposure").unwrap(), 2.5);
}

#[test]
fn script_files_are_applied() {
    let path = std::env::temp_dir().join(format!("enjon-cvars-{}.txt", std::process::id()));
    std::fs::write(&path, "gamma 1.8\nsaturation 0.5\n").unwrap();

    let mut settings = RenderSettings::default();
    let applied = cvars::apply_file(&mut settings, &path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(applied, 2);
    assert_eq!(settings.tone_map.gamma, 1.8);
    assert_eq!(settings.tone_map.saturation, 0.5);
    assert!(cvars::apply_file(&mut settings, &path).is_err());
}
