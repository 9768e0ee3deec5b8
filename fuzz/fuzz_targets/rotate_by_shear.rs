#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use bitmap_ops::{horizontal_shear, rotate_by_shear};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct RotationSeed {
    width: u8,
    height: u8,
    stride_gap: u8,
    pixel_size: u8,
    radians: f32,
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let seed = match RotationSeed::arbitrary(&mut unstructured) {
        Ok(seed) => seed,
        Err(_) => return,
    };

    let width = seed.width as u32 % 96;
    let height = seed.height as u32 % 96;
    let stride = width + seed.stride_gap as u32 % 4;
    // 0 and 5 are invalid on purpose: they must be rejected, not panic
    let pixel_size = seed.pixel_size as u32 % 6;
    let len = (stride * height * pixel_size.max(1)) as usize;
    let pixels: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();

    if let Ok(rotated) = rotate_by_shear(&pixels, width, height, stride, pixel_size, seed.radians) {
        assert_eq!(
            rotated.pixels.len(),
            (rotated.width * rotated.height * pixel_size) as usize
        );
    }
    let _ = horizontal_shear(&pixels, width, height, stride, pixel_size, seed.radians);
});
