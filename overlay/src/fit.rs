//! Font auto-fit: the largest size at which the text fits the window.
use largetype_core::Padding;

/// Smallest size the search will ever return
pub const MIN_FONT_SIZE: f32 = 12.0;

/// Fixed top and bottom margin
pub const VERTICAL_INSET: f32 = 60.0;

/// Anything that can report the rendered extent of text at a given size
pub trait TextMeasure {
    /// Returns (width, height) in pixels
    fn measure(&mut self, text: &str, font_size: f32) -> (f32, f32);
}

/// Measures in logical units through a measurer that works in buffer pixels
pub struct Scaled<'a, M: ?Sized> {
    inner: &'a mut M,
    scale: f32,
}

impl<'a, M: TextMeasure + ?Sized> Scaled<'a, M> {
    /// Non-positive or non-finite scales are treated as 1
    pub fn new(inner: &'a mut M, scale: f32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self { inner, scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

impl<M: TextMeasure + ?Sized> TextMeasure for Scaled<'_, M> {
    fn measure(&mut self, text: &str, font_size: f32) -> (f32, f32) {
        let (width, height) = self.inner.measure(text, font_size * self.scale);
        (width / self.scale, height / self.scale)
    }
}

/// Area the text may occupy inside a window of the given size
pub fn available_area(window_width: f32, window_height: f32, padding: Padding) -> (f32, f32) {
    let width = window_width - 2.0 * padding.inset(window_width);
    let height = window_height - 2.0 * VERTICAL_INSET;
    (width, height)
}

/// Binary search for the largest whole-pixel size whose measured extent
/// fits within `max_width` x `max_height`. Never below [`MIN_FONT_SIZE`].
///
/// The upper bound is never tested itself, so the result is strictly less
/// than `min(max_width, max_height)` whenever that exceeds the floor.
pub fn fit_font_size<M: TextMeasure + ?Sized>(
    measurer: &mut M,
    text: &str,
    max_width: f32,
    max_height: f32,
) -> f32 {
    let mut low = MIN_FONT_SIZE;
    let mut high = max_width.min(max_height).floor();
    let mut best = MIN_FONT_SIZE;

    while high - low > 1.0 {
        let mid = ((low + high) / 2.0).floor();
        let (width, height) = measurer.measure(text, mid);
        if width <= max_width && height <= max_height {
            best = mid;
            low = mid;
        } else {
            high = mid;
        }
    }

    best.max(MIN_FONT_SIZE)
}

/// The size actually used: the fit, capped by an explicit request
pub fn final_font_size<M: TextMeasure + ?Sized>(
    measurer: &mut M,
    text: &str,
    window_width: f32,
    window_height: f32,
    padding: Padding,
    requested: Option<f32>,
) -> f32 {
    let (max_width, max_height) = available_area(window_width, window_height, padding);
    let fit = fit_font_size(measurer, text, max_width, max_height);
    let size = match requested {
        Some(requested) => requested.min(fit),
        None => fit,
    };
    tracing::debug!(fit, ?requested, size, "Resolved font size");
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use largetype_core::PaddingUnit;

    /// Monospace-like measurer: each char is 0.6em wide, one line is 1.2em tall
    struct FakeMeasure {
        calls: usize,
    }

    impl TextMeasure for FakeMeasure {
        fn measure(&mut self, text: &str, font_size: f32) -> (f32, f32) {
            self.calls += 1;
            let chars = text.chars().count() as f32;
            (chars * font_size * 0.6, font_size * 1.2)
        }
    }

    fn fake() -> FakeMeasure {
        FakeMeasure { calls: 0 }
    }

    #[test]
    fn fits_width_bound_text() {
        let mut m = fake();
        let size = fit_font_size(&mut m, "0123456789", 1000.0, 1000.0);
        // 10 chars * 0.6 * size <= 1000  =>  size <= 166.6
        assert_eq!(size, 166.0);
        let (w, h) = m.measure("0123456789", size);
        assert!(w <= 1000.0 && h <= 1000.0);
    }

    #[test]
    fn fits_height_bound_text() {
        let mut m = fake();
        let size = fit_font_size(&mut m, "a", 2000.0, 600.0);
        // 1.2 * size <= 600  =>  size <= 500
        assert_eq!(size, 500.0);
    }

    #[test]
    fn never_returns_below_floor() {
        let mut m = fake();
        let long = "x".repeat(10_000);
        assert_eq!(fit_font_size(&mut m, &long, 800.0, 600.0), MIN_FONT_SIZE);
        // Degenerate area
        assert_eq!(fit_font_size(&mut m, "hi", 5.0, 5.0), MIN_FONT_SIZE);
        assert_eq!(fit_font_size(&mut m, "hi", -40.0, 600.0), MIN_FONT_SIZE);
    }

    #[test]
    fn upper_bound_is_exclusive() {
        // Everything fits; result stays just under min(width, height)
        struct Tiny;
        impl TextMeasure for Tiny {
            fn measure(&mut self, _: &str, _: f32) -> (f32, f32) {
                (1.0, 1.0)
            }
        }
        assert_eq!(fit_font_size(&mut Tiny, "x", 400.0, 300.0), 299.0);
    }

    #[test]
    fn longer_text_never_gets_larger() {
        let mut m = fake();
        let mut previous = f32::MAX;
        for n in 1..40 {
            let text = "w".repeat(n);
            let size = fit_font_size(&mut m, &text, 1920.0, 960.0);
            assert!(size <= previous, "size grew at {n} chars");
            previous = size;
        }
    }

    #[test]
    fn larger_area_never_gets_smaller() {
        let mut m = fake();
        let mut previous = 0.0;
        for width in (0..3000).step_by(7) {
            let size = fit_font_size(&mut m, "hello world", width as f32, 700.0);
            assert!(size >= previous, "size shrank at width {width}");
            previous = size;
        }

        let mut previous = 0.0;
        for height in (0..2000).step_by(5) {
            let size = fit_font_size(&mut m, "hi", 2400.0, height as f32);
            assert!(size >= previous, "size shrank at height {height}");
            previous = size;
        }
    }

    #[test]
    fn scaled_measure_fits_in_logical_units() {
        let pad = Padding {
            value: 40.0,
            unit: PaddingUnit::Px,
        };
        let mut plain = fake();
        let logical = final_font_size(&mut plain, "retina", 1440.0, 900.0, pad, None);

        let mut inner = fake();
        let mut scaled = Scaled::new(&mut inner, 2.0);
        assert_eq!(
            final_font_size(&mut scaled, "retina", 1440.0, 900.0, pad, None),
            logical
        );
        // Inner measurer sees buffer-pixel sizes
        assert_eq!(scaled.measure("ab", 10.0), (12.0, 12.0));
        assert_eq!(Scaled::new(&mut inner, 0.0).scale(), 1.0);
        assert_eq!(Scaled::new(&mut inner, f32::NAN).scale(), 1.0);
    }

    #[test]
    fn search_is_logarithmic() {
        let mut m = fake();
        fit_font_size(&mut m, "hello", 4000.0, 4000.0);
        assert!(m.calls <= 13, "took {} measurements", m.calls);
    }

    #[test]
    fn available_area_uses_padding_and_fixed_vertical_inset() {
        let pct = Padding {
            value: 5.0,
            unit: PaddingUnit::Percent,
        };
        assert_eq!(available_area(1920.0, 1080.0, pct), (1728.0, 960.0));

        let px = Padding {
            value: 40.0,
            unit: PaddingUnit::Px,
        };
        assert_eq!(available_area(1000.0, 800.0, px), (920.0, 680.0));
    }

    #[test]
    fn requested_size_caps_fit() {
        let mut m = fake();
        let pad = Padding::default();
        let fit = final_font_size(&mut m, "hello", 1920.0, 1080.0, pad, None);
        assert!(fit > 48.0);
        assert_eq!(
            final_font_size(&mut m, "hello", 1920.0, 1080.0, pad, Some(48.0)),
            48.0
        );
        // A request above the fit is ignored
        assert_eq!(
            final_font_size(&mut m, "hello", 1920.0, 1080.0, pad, Some(10_000.0)),
            fit
        );
    }
}
