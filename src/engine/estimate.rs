// src/engine/estimate.rs
//
// Byte-deficit to pixel-deficit projection used by the scale lever.

/// Project the dimensions an encode of `width` x `height` needs to shrink to
/// so that `current_size` bytes fall to roughly `target_size`.
///
/// Bytes-per-pixel is taken from the current encode. The longer axis is then
/// stepped down one pixel at a time, with the shorter axis recomputed from
/// the aspect ratio, until the cumulative pixel reduction covers the deficit.
/// Degenerate inputs (zero area, non-finite values, or no overshoot) return
/// the input dimensions unchanged.
pub fn estimate_new_dimensions(
    current_size: u64,
    target_size: u64,
    width: f64,
    height: f64,
) -> (f64, f64) {
    let area = width * height;
    if current_size <= target_size
        || !area.is_finite()
        || width <= 0.0
        || height <= 0.0
        || current_size == 0
    {
        return (width, height);
    }

    let bytes_per_pixel = current_size as f64 / area;
    let pixel_deficit = (current_size - target_size) as f64 / bytes_per_pixel;

    let landscape = width >= height;
    let (long, short) = if landscape {
        (width, height)
    } else {
        (height, width)
    };
    let aspect = short / long;

    let mut new_long = long;
    let mut new_short = short;
    while new_long > 1.0 {
        new_long -= 1.0;
        new_short = new_long * aspect;
        if area - new_long * new_short >= pixel_deficit {
            break;
        }
    }

    if landscape {
        (new_long, new_short)
    } else {
        (new_short, new_long)
    }
}
