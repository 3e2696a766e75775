use image::Rgba32FImage;

use crate::{
    AnyPostProcess, BasicEffect, BasicPostProcess, ChainDesc, DualEffect, DualPostProcess, Effect,
    EffectParameters, GpuChain, GpuContext, GpuContextOptions, PostProcess, PostProcessError,
    RenderTargetState, SourceTexture, StepDesc, ToneMapEffect, ToneMapPostProcess,
    chain::{SOURCE, SOURCE2},
    reference,
};

const SIZE: u32 = 32;
/// GPU bilinear filtering works with reduced sub-texel precision.
const TOLERANCE: f32 = 2.0e-2;

fn create_context() -> Option<GpuContext> {
    GpuContext::new_blocking(&GpuContextOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        force_fallback_adapter: true,
        pipeline_cache: false,
    })
    .ok()
}

fn test_image(width: u32, height: u32) -> Rgba32FImage {
    let mut image = Rgba32FImage::from_fn(width, height, |x, y| {
        let u = x as f32 / (width - 1) as f32;
        let v = y as f32 / (height - 1) as f32;
        image::Rgba([u * 2.0, v, 0.5 + 0.5 * (u * 6.0).sin(), 0.5 + 0.5 * v])
    });
    // Match what an Rgba16Float upload stores.
    reference::quantize(&mut image, wgpu::TextureFormat::Rgba16Float).expect("f16 is supported");
    image
}

fn assert_images_close(actual: &Rgba32FImage, expected: &Rgba32FImage, label: &str) {
    assert_eq!(actual.dimensions(), expected.dimensions(), "{label}");
    let worst = actual
        .pixels()
        .zip(expected.pixels())
        .flat_map(|(a, e)| a.0.into_iter().zip(e.0).map(|(a, e)| (a - e).abs()))
        .fold(0.0f32, f32::max);
    assert!(worst < TOLERANCE, "{label}: max difference {worst}");
}

fn run_on_gpu(
    gpu: &GpuContext,
    effect: Effect,
    parameters: &EffectParameters,
    sources: &[&Rgba32FImage],
    size: (u32, u32),
    format: wgpu::TextureFormat,
) -> Rgba32FImage {
    let textures: Vec<_> = sources
        .iter()
        .map(|image| {
            gpu.upload(image, wgpu::TextureFormat::Rgba16Float)
                .expect("upload should succeed")
        })
        .collect();
    let target = gpu.create_target(size.0, size.1, format).expect("target size is valid");

    let mut pass = AnyPostProcess::new(gpu.library(), RenderTargetState::new(format), effect);
    pass.set_parameters(parameters);
    pass.set_sources(
        SourceTexture::from_texture(&textures[0]),
        textures.get(1).map(SourceTexture::from_texture),
    );
    gpu.render(&mut pass, &target).expect("render should succeed");
    gpu.read_texture(&target).expect("readback should succeed")
}

fn expected(
    effect: Effect,
    parameters: &EffectParameters,
    sources: &[&Rgba32FImage],
    size: (u32, u32),
    format: wgpu::TextureFormat,
) -> Rgba32FImage {
    let mut image = reference::render(effect, parameters, sources, size)
        .expect("reference render should succeed");
    reference::quantize(&mut image, format).expect("format is supported");
    image
}

#[test]
fn basic_effects_match_reference() {
    let Some(gpu) = create_context() else {
        return;
    };
    let source = test_image(SIZE, SIZE);
    let mut parameters = EffectParameters::default();
    parameters.basic.bloom_size = 2.0;
    let format = wgpu::TextureFormat::Rgba16Float;

    for effect in BasicEffect::ALL {
        let extent = (SIZE as f32 * effect.output_scale()) as u32;
        let effect = Effect::Basic(effect);
        let actual = run_on_gpu(&gpu, effect, &parameters, &[&source], (extent, extent), format);
        let wanted = expected(effect, &parameters, &[&source], (extent, extent), format);
        assert_images_close(&actual, &wanted, effect.as_str());
    }
}

#[test]
fn vertical_bloom_blur_matches_reference() {
    let Some(gpu) = create_context() else {
        return;
    };
    let source = test_image(SIZE, SIZE / 2);
    let mut parameters = EffectParameters::default();
    parameters.basic.bloom_horizontal = false;
    parameters.basic.bloom_size = 3.0;
    parameters.basic.bloom_brightness = 1.5;
    let effect = Effect::Basic(BasicEffect::BloomBlur);
    let format = wgpu::TextureFormat::Rgba16Float;
    let size = (SIZE, SIZE / 2);

    let actual = run_on_gpu(&gpu, effect, &parameters, &[&source], size, format);
    let wanted = expected(effect, &parameters, &[&source], size, format);
    assert_images_close(&actual, &wanted, "bloom_blur");
}

#[test]
fn dual_effects_match_reference() {
    let Some(gpu) = create_context() else {
        return;
    };
    let first = test_image(SIZE, SIZE);
    let mut second = test_image(SIZE, SIZE);
    image::imageops::flip_horizontal_in_place(&mut second);
    let mut parameters = EffectParameters::default();
    parameters.dual.merge_weight1 = 0.75;
    parameters.dual.merge_weight2 = 0.25;
    parameters.dual.bloom_saturation = 0.5;
    let format = wgpu::TextureFormat::Rgba16Float;

    for effect in DualEffect::ALL {
        let effect = Effect::Dual(effect);
        let sources = [&first, &second];
        let actual = run_on_gpu(&gpu, effect, &parameters, &sources, (SIZE, SIZE), format);
        let wanted = expected(effect, &parameters, &sources, (SIZE, SIZE), format);
        assert_images_close(&actual, &wanted, effect.as_str());
    }
}

#[test]
fn tone_map_effects_match_reference() {
    let Some(gpu) = create_context() else {
        return;
    };
    let source = test_image(SIZE, SIZE);
    let mut parameters = EffectParameters::default();
    parameters.tone_map.exposure = 0.5;
    parameters.tone_map.paper_white_nits = 300.0;

    for effect in ToneMapEffect::ALL {
        // Compare in float; the preferred formats are checked separately.
        let format = wgpu::TextureFormat::Rgba16Float;
        let effect = Effect::ToneMap(effect);
        let actual = run_on_gpu(&gpu, effect, &parameters, &[&source], (SIZE, SIZE), format);
        let wanted = expected(effect, &parameters, &[&source], (SIZE, SIZE), format);
        assert_images_close(&actual, &wanted, effect.as_str());
    }
}

#[test]
fn tone_map_renders_into_preferred_formats() {
    let Some(gpu) = create_context() else {
        return;
    };
    let source = test_image(SIZE, SIZE);
    let parameters = EffectParameters::default();

    for effect in [ToneMapEffect::Filmic, ToneMapEffect::Hdr10Filmic] {
        let format = effect.preferred_format();
        let effect = Effect::ToneMap(effect);
        let actual = run_on_gpu(&gpu, effect, &parameters, &[&source], (SIZE, SIZE), format);
        let wanted = expected(effect, &parameters, &[&source], (SIZE, SIZE), format);
        assert_images_close(&actual, &wanted, effect.as_str());
    }
}

#[test]
fn process_without_source_fails() {
    let Some(gpu) = create_context() else {
        return;
    };
    let target = gpu
        .create_target(4, 4, wgpu::TextureFormat::Rgba8Unorm)
        .expect("target size is valid");
    let state = RenderTargetState::new(wgpu::TextureFormat::Rgba8Unorm);

    let mut basic = BasicPostProcess::with_library(gpu.library(), state, BasicEffect::Copy);
    assert!(matches!(
        gpu.render(&mut basic, &target),
        Err(PostProcessError::MissingSource { effect: "copy" })
    ));

    let source = gpu
        .upload(&test_image(4, 4), wgpu::TextureFormat::Rgba16Float)
        .expect("upload should succeed");
    let mut dual = DualPostProcess::with_library(gpu.library(), state, DualEffect::Merge);
    dual.set_source_texture(SourceTexture::from_texture(&source));
    assert!(matches!(
        gpu.render(&mut dual, &target),
        Err(PostProcessError::MissingSecondSource { effect: "merge" })
    ));

    let mut tone_map =
        ToneMapPostProcess::with_library(gpu.library(), state, ToneMapEffect::Reinhard);
    assert!(matches!(
        gpu.render(&mut tone_map, &target),
        Err(PostProcessError::MissingSource { effect: "reinhard" })
    ));
}

#[test]
fn textures_outside_device_limits_are_rejected() {
    let Some(gpu) = create_context() else {
        return;
    };
    let format = wgpu::TextureFormat::Rgba16Float;
    let max = gpu.device().limits().max_texture_dimension_2d;
    assert!(matches!(
        gpu.create_target(max + 1, 1, format),
        Err(PostProcessError::InvalidSize { .. })
    ));
    assert!(matches!(
        gpu.create_target(0, 4, format),
        Err(PostProcessError::InvalidSize { width: 0, height: 4 })
    ));
    assert!(matches!(
        gpu.upload(&Rgba32FImage::new(0, 0), format),
        Err(PostProcessError::InvalidSize { width: 0, height: 0 })
    ));

    let source = gpu.upload(&test_image(8, 8), format).expect("upload should succeed");
    let desc = ChainDesc::new(vec![StepDesc::new("big", BasicEffect::Copy).scale(1e9)]);
    let mut chain = GpuChain::new(gpu.library(), desc, format).expect("chain is valid");
    assert!(matches!(
        chain.run(gpu.queue(), &[(SOURCE, SourceTexture::from_texture(&source))]),
        Err(PostProcessError::InvalidSize { .. })
    ));
}

#[test]
fn unsized_source_fails_for_sampling_effects() {
    let Some(gpu) = create_context() else {
        return;
    };
    let texture = gpu
        .upload(&test_image(8, 8), wgpu::TextureFormat::Rgba16Float)
        .expect("upload should succeed");
    let target = gpu
        .create_target(4, 4, wgpu::TextureFormat::Rgba16Float)
        .expect("target size is valid");
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let mut pass = BasicPostProcess::with_library(
        gpu.library(),
        RenderTargetState::new(wgpu::TextureFormat::Rgba16Float),
        BasicEffect::DownScale2x2,
    );
    pass.set_source_texture(SourceTexture::new(view.clone()));
    assert!(matches!(
        gpu.render(&mut pass, &target),
        Err(PostProcessError::MissingSourceSize { effect: "down_scale_2x2" })
    ));

    pass.set_source_texture(SourceTexture::new(view).with_size(8, 8));
    assert!(gpu.render(&mut pass, &target).is_ok());
}

#[test]
fn setters_take_effect_on_the_next_process() {
    let Some(gpu) = create_context() else {
        return;
    };
    let source_image = Rgba32FImage::from_pixel(4, 4, image::Rgba([0.6, 0.6, 0.6, 1.0]));
    let source = gpu
        .upload(&source_image, wgpu::TextureFormat::Rgba16Float)
        .expect("upload should succeed");
    let format = wgpu::TextureFormat::Rgba16Float;
    let target = gpu.create_target(4, 4, format).expect("target size is valid");

    let mut pass =
        BasicPostProcess::with_library(gpu.library(), format.into(), BasicEffect::BloomExtract);
    pass.set_source_texture(SourceTexture::from_texture(&source));
    gpu.render(&mut pass, &target).expect("render should succeed");
    let default_threshold = gpu.read_texture(&target).expect("readback should succeed");

    pass.set_bloom_extract_parameter(0.5);
    gpu.render(&mut pass, &target).expect("render should succeed");
    let raised_threshold = gpu.read_texture(&target).expect("readback should succeed");

    // (0.6 - 0.25) / 0.75 and (0.6 - 0.5) / 0.5
    assert!((default_threshold.get_pixel(1, 1).0[0] - 0.4667).abs() < 1e-2);
    assert!((raised_threshold.get_pixel(1, 1).0[0] - 0.2).abs() < 1e-2);
}

#[test]
fn pass_recorded_twice_in_one_encoder_keeps_each_draws_constants() {
    let Some(gpu) = create_context() else {
        return;
    };
    let stripes = Rgba32FImage::from_fn(SIZE, SIZE, |x, _| {
        let value = if x % 2 == 0 { 1.0 } else { 0.0 };
        image::Rgba([value, value, value, 1.0])
    });
    let format = wgpu::TextureFormat::Rgba16Float;
    let texture = gpu.upload(&stripes, format).expect("upload should succeed");
    let horizontal_target = gpu.create_target(SIZE, SIZE, format).expect("target size is valid");
    let vertical_target = gpu.create_target(SIZE, SIZE, format).expect("target size is valid");

    let mut pass = BasicPostProcess::with_library(
        gpu.library(),
        RenderTargetState::new(format),
        BasicEffect::BloomBlur,
    );
    pass.set_source_texture(SourceTexture::from_texture(&texture));

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Repeated Pass Encoder"),
        });
    for (target, horizontal) in [(&horizontal_target, true), (&vertical_target, false)] {
        pass.set_bloom_blur_parameters(horizontal, 2.0, 1.0);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        pass.process_to_view(gpu.queue(), &mut encoder, &view)
            .expect("process should succeed");
    }
    gpu.queue().submit(Some(encoder.finish()));

    for (target, horizontal) in [(&horizontal_target, true), (&vertical_target, false)] {
        let mut parameters = EffectParameters::default();
        parameters.basic.bloom_horizontal = horizontal;
        parameters.basic.bloom_size = 2.0;
        parameters.basic.bloom_brightness = 1.0;
        let wanted = expected(
            Effect::Basic(BasicEffect::BloomBlur),
            &parameters,
            &[&stripes],
            (SIZE, SIZE),
            format,
        );
        let actual = gpu.read_texture(target).expect("readback should succeed");
        let label = if horizontal { "horizontal draw" } else { "vertical draw" };
        assert_images_close(&actual, &wanted, label);
    }
}

#[test]
fn pipelines_are_shared_per_effect_and_target() {
    let Some(gpu) = create_context() else {
        return;
    };
    let library = gpu.library();
    let before = library.cached_pipeline_count();
    let srgb = RenderTargetState::new(wgpu::TextureFormat::Rgba8UnormSrgb);

    let _a = ToneMapPostProcess::with_library(library, srgb, ToneMapEffect::Filmic);
    let _b = ToneMapPostProcess::with_library(library, srgb, ToneMapEffect::Filmic);
    assert_eq!(library.cached_pipeline_count(), before + 1);

    let _c = ToneMapPostProcess::with_library(
        library,
        RenderTargetState::new(wgpu::TextureFormat::Rgba16Float),
        ToneMapEffect::Filmic,
    );
    assert_eq!(library.cached_pipeline_count(), before + 2);
}

#[test]
fn gpu_chain_matches_reference_chain() {
    let Some(gpu) = create_context() else {
        return;
    };
    let source = test_image(SIZE, SIZE);
    let chain = ChainDesc::bloom(&Default::default()).with_tone_map(ToneMapEffect::Reinhard, 0.0);
    let format = wgpu::TextureFormat::Rgba16Float;

    let texture = gpu.upload(&source, format).expect("upload should succeed");
    let mut gpu_chain =
        GpuChain::new(gpu.library(), chain.clone(), format).expect("chain is valid");
    let output = gpu_chain
        .run(gpu.queue(), &[(SOURCE, SourceTexture::from_texture(&texture))])
        .expect("chain should run");
    let actual = gpu.read_texture(&output).expect("readback should succeed");

    let wanted =
        reference::run_chain(&chain, &[(SOURCE, &source)], format).expect("chain should run");
    assert_images_close(&actual, &wanted, "bloom chain");
}

#[test]
fn gpu_chain_reads_a_second_source() {
    let Some(gpu) = create_context() else {
        return;
    };
    let first = test_image(SIZE, SIZE);
    let second = Rgba32FImage::from_pixel(SIZE / 2, SIZE / 2, image::Rgba([0.0, 1.0, 0.0, 1.0]));
    let chain = ChainDesc::new(vec![StepDesc::new("mix", DualEffect::Merge).input2(SOURCE2)]);
    let format = wgpu::TextureFormat::Rgba16Float;

    let first_texture = gpu.upload(&first, format).expect("upload should succeed");
    let second_texture = gpu.upload(&second, format).expect("upload should succeed");
    let mut gpu_chain =
        GpuChain::new(gpu.library(), chain.clone(), format).expect("chain is valid");
    let output = gpu_chain
        .run(
            gpu.queue(),
            &[
                (SOURCE, SourceTexture::from_texture(&first_texture)),
                (SOURCE2, SourceTexture::from_texture(&second_texture)),
            ],
        )
        .expect("chain should run");
    let actual = gpu.read_texture(&output).expect("readback should succeed");

    let wanted = reference::run_chain(&chain, &[(SOURCE, &first), (SOURCE2, &second)], format)
        .expect("chain should run");
    assert_images_close(&actual, &wanted, "merge chain");
}

#[test]
fn srgb_targets_read_back_as_linear() {
    let Some(gpu) = create_context() else {
        return;
    };
    let source = Rgba32FImage::from_pixel(2, 2, image::Rgba([0.2, 0.5, 0.8, 1.0]));
    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let actual = run_on_gpu(
        &gpu,
        Effect::Basic(BasicEffect::Copy),
        &EffectParameters::default(),
        &[&source],
        (2, 2),
        format,
    );
    for pixel in actual.pixels() {
        for (channel, wanted) in pixel.0.iter().zip([0.2, 0.5, 0.8, 1.0]) {
            assert!((channel - wanted).abs() < 1e-2, "{:?}", pixel.0);
        }
    }
}
