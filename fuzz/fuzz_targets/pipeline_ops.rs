#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use bitmap_ops::{
    FittingMode, ImageAttributes, PixelBuffer, PixelFormat, SamplingMode, ScalingConfig,
};
use libfuzzer_sys::fuzz_target;
use std::borrow::Cow;

#[derive(Arbitrary, Debug)]
struct AttributeSeed {
    format: u8,
    width: u16,
    height: u16,
    stride_gap: u8,
    request_width: u16,
    request_height: u16,
    fitting: u8,
    sampling: u8,
    max_texture_size: u16,
}

const FORMATS: [PixelFormat; 9] = [
    PixelFormat::L8,
    PixelFormat::A8,
    PixelFormat::LA88,
    PixelFormat::RGB565,
    PixelFormat::RGB888,
    PixelFormat::RGBA8888,
    PixelFormat::BGRA8888,
    PixelFormat::RGBA4444,
    PixelFormat::RGBA5551,
];

const FITTING_MODES: [FittingMode; 4] = [
    FittingMode::ShrinkToFit,
    FittingMode::ScaleToFill,
    FittingMode::FitWidth,
    FittingMode::FitHeight,
];

const SAMPLING_MODES: [SamplingMode; 7] = [
    SamplingMode::Box,
    SamplingMode::Nearest,
    SamplingMode::Linear,
    SamplingMode::BoxThenNearest,
    SamplingMode::BoxThenLinear,
    SamplingMode::NoFilter,
    SamplingMode::Lanczos,
];

fn build_bitmap(seed: &AttributeSeed, data: &[u8]) -> Option<PixelBuffer> {
    let format = FORMATS[seed.format as usize % FORMATS.len()];
    // Keep allocations small enough for the fuzzer to stay fast
    let width = seed.width as u32 % 257;
    let height = seed.height as u32 % 257;
    let stride = width + seed.stride_gap as u32 % 8;
    let len = (stride * height) as usize * format.bytes_per_pixel();
    let pixels = (0..len)
        .map(|i| data.get(i % data.len().max(1)).copied().unwrap_or(0))
        .collect();
    PixelBuffer::from_raw_with_stride(width, height, stride, format, pixels).ok()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seed = match AttributeSeed::arbitrary(&mut unstructured) {
        Ok(seed) => seed,
        Err(_) => return,
    };
    let Some(bitmap) = build_bitmap(&seed, data) else {
        return;
    };

    let attributes = ImageAttributes::new()
        .with_size(seed.request_width % 1024, seed.request_height % 1024)
        .with_fitting_mode(FITTING_MODES[seed.fitting as usize % FITTING_MODES.len()])
        .with_sampling_mode(SAMPLING_MODES[seed.sampling as usize % SAMPLING_MODES.len()]);
    let config = ScalingConfig::with_max_texture_size(seed.max_texture_size.max(1) as u32);

    // Errors are fine; we're interested only in panics or memory issues.
    let _ = attributes.apply_with_config(Cow::Borrowed(&bitmap), &config);
    let _ = attributes.apply_with_config(Cow::Owned(bitmap), &config);
});
