use titan::graphics::headless::{Command, HeadlessBackend};
use titan::graphics::texture::{LutData, LutPreset};
use titan::graphics::{ColorCorrect, FramebufferHandle, PostEffect, PostEffectChain, RenderBackend, TextureBinding};

fn chain_of(backend: &mut HeadlessBackend, n: usize) -> PostEffectChain {
    let mut chain = PostEffectChain::new();
    chain.init(backend, 320, 180).unwrap();
    for _ in 0..n {
        chain.push(backend, Box::new(ColorCorrect::new())).unwrap();
    }
    chain
}

/// (target, colour input at slot 0) of every recorded draw, in order.
fn draw_edges(backend: &HeadlessBackend) -> Vec<(Option<FramebufferHandle>, Option<FramebufferHandle>)> {
    backend
        .draws()
        .map(|c| match c {
            Command::Draw { target, textures, .. } => {
                let input = textures.iter().find_map(|(slot, b)| match (slot, b) {
                    (0, TextureBinding::Color { framebuffer, .. }) => Some(*framebuffer),
                    _ => None,
                });
                (*target, input)
            }
            Command::Clear { .. } => unreachable!(),
        })
        .collect()
}

#[test]
fn each_effect_reads_the_previous_output() {
    let mut backend = HeadlessBackend::new(320, 180);
    let mut chain = chain_of(&mut backend, 3);
    chain.render(&mut backend, |_| {});

    let primary = chain.primary().output();
    let outputs: Vec<Option<FramebufferHandle>> = chain.effects().map(|e| e.output()).collect();

    assert_eq!(
        draw_edges(&backend),
        vec![
            (outputs[0], primary),
            (outputs[1], outputs[0]),
            (outputs[2], outputs[1]),
            (None, outputs[2]),
        ]
    );
    assert!(backend.violations().is_empty(), "{:?}", backend.violations());
}

#[test]
fn disabled_effects_are_skipped() {
    let mut backend = HeadlessBackend::new(320, 180);
    let mut chain = chain_of(&mut backend, 2);
    chain.get_mut::<ColorCorrect>().unwrap().set_should_apply(false);
    chain.render(&mut backend, |_| {});

    let primary = chain.primary().output();
    let second = chain.effects().nth(1).and_then(|e| e.output());
    assert_eq!(draw_edges(&backend), vec![(second, primary), (None, second)]);
}

#[test]
fn reshape_then_render_draws_at_the_new_size() {
    let mut backend = HeadlessBackend::new(320, 180);
    let mut chain = chain_of(&mut backend, 2);
    let before = backend.live_handles();

    chain.reshape(&mut backend, 640, 360).unwrap();
    backend.resize_surface(640, 360);
    assert_eq!(backend.live_handles(), before);
    for effect in chain.effects() {
        let fb = effect.output().unwrap();
        assert_eq!(backend.framebuffer_size(fb), Some((640, 360)));
    }

    chain.render(&mut backend, |_| {});
    let sizes: Vec<(u32, u32)> = backend
        .draws()
        .map(|c| match c {
            Command::Draw { target_size, .. } => *target_size,
            Command::Clear { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(sizes.len(), 3);
    assert!(sizes.iter().all(|&s| s == (640, 360)), "{sizes:?}");

    chain.reshape(&mut backend, 0, 360).unwrap();
    let fb = chain.primary().output().unwrap();
    assert_eq!(backend.framebuffer_size(fb), Some((640, 360)));
}

#[test]
fn unload_twice_is_harmless() {
    let mut backend = HeadlessBackend::new(320, 180);
    let mut chain = chain_of(&mut backend, 2);
    assert!(backend.live_handles() > 0);

    chain.unload(&mut backend);
    assert_eq!(backend.live_handles(), 0);
    chain.unload(&mut backend);
    assert_eq!(backend.live_handles(), 0);
    assert!(!chain.is_init());

    chain.render(&mut backend, |_| {});
    assert_eq!(backend.draws().count(), 0);
}

#[test]
fn graded_frames_leave_nothing_bound() {
    let mut backend = HeadlessBackend::new(320, 180);
    let mut chain = chain_of(&mut backend, 1);
    let lut = backend.upload_lut(&LutData::preset(LutPreset::Cool, 8));
    chain.get_mut::<ColorCorrect>().unwrap().set_cube(Some(lut));

    for _ in 0..3 {
        backend.begin_frame().unwrap();
        chain.render(&mut backend, |_| {});
        backend.end_frame();
    }
    assert_eq!(backend.frames_completed(), 3);
    assert!(backend.violations().is_empty(), "{:?}", backend.violations());
    assert!(backend.bound_shader().is_none());
    assert!(backend.bound_framebuffer().is_none());
    assert_eq!(backend.bound_textures().count(), 0);
}
