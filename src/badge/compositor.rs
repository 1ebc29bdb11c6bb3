//! # 合成模块
//!
//! ## 设计思路
//!
//! 合成是纯函数：输入 `(original, badge, output_size)`，输出固定边长的正方形 PNG。
//! 不修改任何输入，同样的输入总是得到同样的字节。
//!
//! ## 实现思路
//!
//! 1. 以短边为边长，在原图中心取正方形区域（奇数差值时允许半像素偏移）
//! 2. 将该区域等比缩放到 `output_size × output_size`
//! 3. 徽章拉伸到同样尺寸（已是该尺寸时跳过），按 source-over 覆盖在最上层
//! 4. 编码为 PNG
//!
//! 缩放优先走 `fast_image_resize`（支持亚像素裁剪），失败时回退 `image::imageops`。

use bytes::Bytes;
use fast_image_resize as fr;
use image::{ImageBuffer, Rgba, RgbaImage, imageops};

use super::pipeline::encode_png;
use super::source::RasterImage;
use super::{BadgeError, ResizeQuality};

/// 原图中心正方形裁剪区域。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    /// 左上角横坐标，可能为半像素。
    pub x: f64,
    /// 左上角纵坐标，可能为半像素。
    pub y: f64,
    /// 正方形边长，等于原图短边。
    pub size: u32,
}

impl CropRegion {
    /// 计算居中裁剪区域。
    pub fn centered(width: u32, height: u32) -> Self {
        let size = width.min(height);
        Self {
            x: (width - size) as f64 / 2.0,
            y: (height - size) as f64 / 2.0,
            size,
        }
    }

    /// 原图本身就是正方形，无需裁剪。
    pub fn is_full_frame(&self, width: u32, height: u32) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.size == width && self.size == height
    }
}

/// 合成结果（已编码）。
#[derive(Debug, Clone)]
pub struct CompositeResult {
    /// 合成后的 PNG 字节。
    pub png: Bytes,
    /// 不含徽章的裁剪原图 PNG，用于对比预览。
    pub original_png: Bytes,
    /// 输出边长。
    pub output_size: u32,
    /// 实际使用的裁剪区域。
    pub crop: CropRegion,
    /// 原图尺寸。
    pub source_dimensions: (u32, u32),
}

/// 合成并编码：裁剪缩放原图 + 覆盖徽章 → PNG。
pub fn compose(
    original: &RasterImage,
    badge: &RasterImage,
    output_size: u32,
    quality: ResizeQuality,
) -> Result<CompositeResult, BadgeError> {
    let cropped = render_cropped_pixels(original, output_size, quality)?;
    let original_png = encode_png(&cropped)?;

    let mut canvas = cropped;
    let stretched = stretch_badge(badge, output_size, quality)?;
    overlay_badge(&mut canvas, stretched.pixels());
    let png = encode_png(&canvas)?;

    Ok(CompositeResult {
        png,
        original_png,
        output_size,
        crop: CropRegion::centered(original.width(), original.height()),
        source_dimensions: original.dimensions(),
    })
}

/// 像素级合成，不做编码。
pub fn compose_pixels(
    original: &RasterImage,
    badge: &RasterImage,
    output_size: u32,
    quality: ResizeQuality,
) -> Result<RgbaImage, BadgeError> {
    let mut canvas = render_cropped_pixels(original, output_size, quality)?;
    let stretched = stretch_badge(badge, output_size, quality)?;
    overlay_badge(&mut canvas, stretched.pixels());
    Ok(canvas)
}

/// 仅裁剪并缩放原图（不含徽章）。
pub fn render_cropped_pixels(
    original: &RasterImage,
    output_size: u32,
    quality: ResizeQuality,
) -> Result<RgbaImage, BadgeError> {
    if output_size == 0 {
        return Err(BadgeError::InvalidConfig("output_size 必须大于 0".to_string()));
    }

    let (width, height) = original.dimensions();
    let crop = CropRegion::centered(width, height);
    let crop_size = crop.size as f64;

    resize_region(
        original.pixels(),
        (crop.x, crop.y, crop_size, crop_size),
        (output_size, output_size),
        quality,
    )
}

/// 将徽章拉伸到 `output_size × output_size`；尺寸已匹配时直接复用。
pub fn stretch_badge(
    badge: &RasterImage,
    output_size: u32,
    quality: ResizeQuality,
) -> Result<RasterImage, BadgeError> {
    if output_size == 0 {
        return Err(BadgeError::InvalidConfig("output_size 必须大于 0".to_string()));
    }
    if badge.dimensions() == (output_size, output_size) {
        return Ok(badge.clone());
    }

    let (width, height) = badge.dimensions();
    log::info!(
        "🧩 徽章拉伸：{}x{} -> {}x{}",
        width,
        height,
        output_size,
        output_size
    );

    let stretched = resize_region(
        badge.pixels(),
        (0.0, 0.0, width as f64, height as f64),
        (output_size, output_size),
        quality,
    )?;

    RasterImage::from_rgba(stretched)
        .ok_or_else(|| BadgeError::InvalidConfig("徽章拉伸结果为空".to_string()))
}

/// 按 source-over 将徽章覆盖到画布上，两者尺寸必须一致。
pub fn overlay_badge(canvas: &mut RgbaImage, badge: &RgbaImage) {
    debug_assert_eq!(canvas.dimensions(), badge.dimensions());

    for (dst, src) in canvas.pixels_mut().zip(badge.pixels()) {
        *dst = alpha_blend(*dst, *src);
    }
}

/// src over dst。完全不透明的徽章像素原样替换，完全透明的不做改动。
fn alpha_blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }

    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let inv = 1.0 / out_a;
    let channel = |i: usize| {
        ((src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) * inv)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// 从 `src` 中取 `(left, top, width, height)` 区域缩放到 `target`。
fn resize_region(
    src: &RgbaImage,
    region: (f64, f64, f64, f64),
    target: (u32, u32),
    quality: ResizeQuality,
) -> Result<RgbaImage, BadgeError> {
    match resize_with_fast_image_resize(src, region, target, quality) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::imageops：{}", err);
            Ok(resize_with_imageops(src, region, target, quality))
        }
    }
}

fn resize_with_fast_image_resize(
    src: &RgbaImage,
    (left, top, width, height): (f64, f64, f64, f64),
    (target_width, target_height): (u32, u32),
    quality: ResizeQuality,
) -> Result<RgbaImage, BadgeError> {
    let (src_width, src_height) = src.dimensions();

    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        src.as_raw().clone(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| BadgeError::ResourceLimit(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(quality.fast_filter()))
        .crop(left, top, width, height);

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| BadgeError::ResourceLimit(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| {
            BadgeError::ResourceLimit("fast_image_resize 输出缓冲长度异常".to_string())
        })
}

/// 回退路径：裁剪坐标取整后用 `image` 缩放。
fn resize_with_imageops(
    src: &RgbaImage,
    (left, top, width, height): (f64, f64, f64, f64),
    (target_width, target_height): (u32, u32),
    quality: ResizeQuality,
) -> RgbaImage {
    let x = left.round() as u32;
    let y = top.round() as u32;
    let w = (width.round() as u32).clamp(1, src.width().saturating_sub(x).max(1));
    let h = (height.round() as u32).clamp(1, src.height().saturating_sub(y).max(1));

    let cropped = imageops::crop_imm(src, x, y, w, h).to_image();
    imageops::resize(&cropped, target_width, target_height, quality.image_filter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RasterImage {
        RasterImage::from_rgba(ImageBuffer::from_pixel(width, height, Rgba(color)))
            .expect("valid raster")
    }

    /// 卷积缩放允许 ±1 的取整误差。
    fn assert_close(actual: [u8; 4], expected: [u8; 4]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!(a.abs_diff(*e) <= 1, "actual {:?} expected {:?}", actual, expected);
        }
    }

    /// 左半红、右半蓝的横图，用于检验裁剪位置。
    fn halves(width: u32, height: u32) -> RasterImage {
        RasterImage::from_rgba(ImageBuffer::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        }))
        .expect("valid raster")
    }

    /// 外圈不透明、中心透明的圆环徽章。
    fn ring_badge(size: u32) -> RasterImage {
        let center = size as f64 / 2.0;
        let inner = size as f64 * 0.35;
        RasterImage::from_rgba(ImageBuffer::from_fn(size, size, |x, y| {
            let dx = x as f64 + 0.5 - center;
            let dy = y as f64 + 0.5 - center;
            if (dx * dx + dy * dy).sqrt() < inner {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([20, 200, 120, 255])
            }
        }))
        .expect("valid raster")
    }

    #[test]
    fn crop_region_landscape_portrait_square() {
        assert_eq!(
            CropRegion::centered(1600, 900),
            CropRegion { x: 350.0, y: 0.0, size: 900 }
        );
        assert_eq!(
            CropRegion::centered(500, 900),
            CropRegion { x: 0.0, y: 200.0, size: 500 }
        );

        let square = CropRegion::centered(600, 600);
        assert_eq!(square, CropRegion { x: 0.0, y: 0.0, size: 600 });
        assert!(square.is_full_frame(600, 600));
    }

    #[test]
    fn crop_region_allows_half_pixel_offset() {
        let crop = CropRegion::centered(901, 900);
        assert_eq!(crop.x, 0.5);
        assert_eq!(crop.y, 0.0);
        assert_eq!(crop.size, 900);
    }

    #[test]
    fn output_is_square_for_various_inputs() {
        let badge = solid(800, 800, [0, 0, 0, 0]);

        for (w, h) in [(1200, 800), (500, 900), (600, 600), (1, 3)] {
            let original = solid(w, h, [9, 9, 9, 255]);
            let out = compose_pixels(&original, &badge, 800, ResizeQuality::Balanced)
                .expect("compose should succeed");
            assert_eq!(out.dimensions(), (800, 800), "input {}x{}", w, h);
        }
    }

    #[test]
    fn landscape_crop_keeps_center_and_drops_edges() {
        // 1600x900：左 350 像素全红的区域被裁掉之外，中心 900 正方形左半红右半蓝
        let original = halves(1600, 900);
        let badge = solid(64, 64, [0, 0, 0, 0]);

        let out = compose_pixels(&original, &badge, 100, ResizeQuality::Balanced).expect("compose");

        assert_close(out.get_pixel(10, 50).0, [255, 0, 0, 255]);
        assert_close(out.get_pixel(90, 50).0, [0, 0, 255, 255]);
    }

    #[test]
    fn opaque_badge_pixels_win_and_transparent_center_shows_photo() {
        let original = solid(1600, 900, [200, 100, 50, 255]);
        let badge = ring_badge(800);

        let out = compose_pixels(&original, &badge, 800, ResizeQuality::Balanced).expect("compose");

        assert_eq!(out.get_pixel(0, 0).0, [20, 200, 120, 255]);
        assert_eq!(out.get_pixel(799, 799).0, [20, 200, 120, 255]);
        assert_close(out.get_pixel(400, 400).0, [200, 100, 50, 255]);

        for (x, y, pixel) in badge.pixels().enumerate_pixels() {
            if pixel[3] == 255 {
                assert_eq!(out.get_pixel(x, y), pixel);
            }
        }
    }

    #[test]
    fn badge_is_stretched_to_output_size() {
        let original = solid(300, 300, [1, 2, 3, 255]);
        let badge = solid(10, 20, [250, 0, 0, 255]);

        let out = compose_pixels(&original, &badge, 50, ResizeQuality::Speed).expect("compose");

        assert_eq!(out.dimensions(), (50, 50));
        for pixel in out.pixels() {
            assert_close(pixel.0, [250, 0, 0, 255]);
        }
    }

    #[test]
    fn compose_is_deterministic_and_does_not_touch_inputs() {
        let original = halves(1600, 900);
        let badge = ring_badge(800);
        let before = original.pixels().clone();

        let first = compose(&original, &badge, 800, ResizeQuality::Balanced).expect("compose");
        let second = compose(&original, &badge, 800, ResizeQuality::Balanced).expect("compose");

        assert_eq!(first.png, second.png);
        assert_eq!(first.original_png, second.original_png);
        assert_eq!(original.pixels(), &before);
        assert_eq!(first.crop, CropRegion { x: 350.0, y: 0.0, size: 900 });
        assert_eq!(first.source_dimensions, (1600, 900));

        let decoded = image::load_from_memory(&first.png).expect("decode result").to_rgba8();
        assert_eq!(decoded.dimensions(), (800, 800));
    }

    #[test]
    fn zero_output_size_is_rejected() {
        let original = solid(4, 4, [0, 0, 0, 255]);
        let badge = solid(4, 4, [0, 0, 0, 0]);

        let result = compose(&original, &badge, 0, ResizeQuality::Balanced);
        assert!(matches!(result, Err(BadgeError::InvalidConfig(_))));
    }

    #[test]
    fn alpha_blend_mixes_partial_alpha() {
        let blended = alpha_blend(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 128]));
        assert_eq!(blended[3], 255);
        assert!((127..=129).contains(&blended[0]));

        assert_eq!(alpha_blend(Rgba([1, 2, 3, 4]), Rgba([9, 9, 9, 0])).0, [1, 2, 3, 4]);
        assert_eq!(alpha_blend(Rgba([1, 2, 3, 0]), Rgba([9, 9, 9, 10])).0, [9, 9, 9, 10]);
    }

    #[test]
    fn imageops_fallback_matches_output_shape() {
        let src = halves(1600, 900);
        let out = resize_with_imageops(
            src.pixels(),
            (350.0, 0.0, 900.0, 900.0),
            (80, 80),
            ResizeQuality::Balanced,
        );

        assert_eq!(out.dimensions(), (80, 80));
        assert_close(out.get_pixel(5, 40).0, [255, 0, 0, 255]);
        assert_close(out.get_pixel(75, 40).0, [0, 0, 255, 255]);
    }

    proptest! {
        #[test]
        fn crop_region_is_centered_and_in_bounds(width in 1u32..5000, height in 1u32..5000) {
            let crop = CropRegion::centered(width, height);

            prop_assert_eq!(crop.size, width.min(height));
            prop_assert!(crop.x >= 0.0 && crop.y >= 0.0);
            prop_assert!(crop.x + crop.size as f64 <= width as f64);
            prop_assert!(crop.y + crop.size as f64 <= height as f64);
            // 两侧排除的像素相等
            prop_assert_eq!(crop.x * 2.0, (width - crop.size) as f64);
            prop_assert_eq!(crop.y * 2.0, (height - crop.size) as f64);
            prop_assert!(crop.x == 0.0 || crop.y == 0.0);
        }

        #[test]
        fn composite_is_always_output_square(
            width in 1u32..120,
            height in 1u32..120,
            output in 1u32..64,
        ) {
            let original = solid(width, height, [10, 20, 30, 255]);
            let badge = solid(7, 5, [0, 0, 0, 0]);

            let out = compose_pixels(&original, &badge, output, ResizeQuality::Speed)
                .expect("compose");
            prop_assert_eq!(out.dimensions(), (output, output));
        }
    }
}
