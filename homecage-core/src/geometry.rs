use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Contact position in physical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Drawable screen size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn short_side(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }
}

/// Axis-aligned rectangle. The right and bottom edges are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of the given size whose center is `(cx, cy)`.
    pub fn centered(cx: i32, cy: i32, width: i32, height: i32) -> Self {
        Self::new(cx - width / 2, cy - height / 2, width, height)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, p: Point) -> bool {
        !self.is_empty() && p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grows the rectangle by `margin` pixels on all four edges, saturating at the `i32` range.
    pub fn inflate(&self, margin: u32) -> Rect {
        let m = i32::try_from(margin).unwrap_or(i32::MAX);
        Rect::new(
            self.x.saturating_sub(m),
            self.y.saturating_sub(m),
            self.width.saturating_add(m.saturating_mul(2)),
            self.height.saturating_add(m.saturating_mul(2)),
        )
    }

    /// Whether `p` lies inside the rectangle grown by `margin` on every edge.
    ///
    /// Evaluated in `i64`, so any margin is exact.
    pub fn contains_inflated(&self, p: Point, margin: u32) -> bool {
        if self.is_empty() {
            return false;
        }
        let m = i64::from(margin);
        let (x, y) = (i64::from(p.x), i64::from(p.y));
        let left = i64::from(self.x) - m;
        let top = i64::from(self.y) - m;
        let right = i64::from(self.x) + i64::from(self.width) + m;
        let bottom = i64::from(self.y) + i64::from(self.height) + m;
        x >= left && x < right && y >= top && y < bottom
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right > x && bottom > y {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }
}

/// How an image or plate dimension is specified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeSpec {
    Square(u32),
    Rect { width: u32, height: u32 },
    /// Square side as a fraction of the short screen side.
    ScreenFraction(f32),
}

impl SizeSpec {
    fn resolve(&self, screen: Extent, min_side: u32) -> (i32, i32) {
        let min_side = min_side.max(1) as i32;
        match *self {
            SizeSpec::Square(px) => {
                let side = (px as i32).max(min_side);
                (side, side)
            }
            SizeSpec::Rect { width, height } => {
                ((width as i32).max(min_side), (height as i32).max(min_side))
            }
            SizeSpec::ScreenFraction(frac) => {
                let side = ((screen.short_side() as f32 * frac) as i32).max(min_side);
                (side, side)
            }
        }
    }

    fn validate(&self) -> Result<(), LayoutError> {
        match *self {
            SizeSpec::ScreenFraction(frac) if !(frac > 0.0 && frac <= 1.0) => {
                Err(LayoutError::InvalidFraction(frac))
            }
            SizeSpec::Square(0) | SizeSpec::Rect { width: 0, .. } | SizeSpec::Rect { height: 0, .. } => {
                Err(LayoutError::ZeroSize)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arrangement {
    #[default]
    Pair,
    Single,
}

impl Arrangement {
    pub fn as_str(self) -> &'static str {
        match self {
            Arrangement::Pair => "pair",
            Arrangement::Single => "single",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Fixed,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub arrangement: Arrangement,
    pub placement: Placement,
    pub image_size: SizeSpec,
    /// Defaults to the image size; never smaller than it.
    pub plate_size: Option<SizeSpec>,
    /// Horizontal distance from the screen center to each plate center.
    pub center_offset_px: u32,
    pub edge_margin_px: u32,
    pub min_side_px: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            arrangement: Arrangement::Pair,
            placement: Placement::Fixed,
            image_size: SizeSpec::Square(240),
            plate_size: None,
            center_offset_px: 300,
            edge_margin_px: 16,
            min_side_px: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("screen fraction must be in (0, 1], got {0}")]
    InvalidFraction(f32),
    #[error("image and plate sizes must be at least one pixel")]
    ZeroSize,
    #[error("random placement is only supported for a single plate")]
    RandomPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Center,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Center => "center",
        }
    }
}

/// One tolerance plate and the image drawn on it. `plate` always contains `image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plate {
    pub side: Side,
    pub image: Rect,
    pub plate: Rect,
}

/// Plates for the current trial, in hit-test order (left before right).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateLayout {
    arrangement: Arrangement,
    plates: Vec<Plate>,
}

impl PlateLayout {
    pub fn arrangement(&self) -> Arrangement {
        self.arrangement
    }

    pub fn plates(&self) -> &[Plate] {
        &self.plates
    }

    pub fn plate(&self, side: Side) -> Option<&Plate> {
        self.plates.iter().find(|p| p.side == side)
    }

    /// Plate reported in the `left_*` log columns.
    pub fn primary(&self) -> Option<&Plate> {
        self.plate(Side::Left).or_else(|| self.plate(Side::Center))
    }
}

/// Computes plate and image rectangles from the screen extent.
#[derive(Debug, Clone)]
pub struct GeometryLayout {
    config: LayoutConfig,
}

impl GeometryLayout {
    pub fn new(config: LayoutConfig) -> Result<Self, LayoutError> {
        config.image_size.validate()?;
        if let Some(plate) = &config.plate_size {
            plate.validate()?;
        }
        if config.arrangement == Arrangement::Pair && config.placement == Placement::Random {
            return Err(LayoutError::RandomPair);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Image and plate sizes for `screen`, with the plate clamped to at least the image.
    pub fn sizes(&self, screen: Extent) -> ((i32, i32), (i32, i32)) {
        let min_side = self.config.min_side_px;
        let (iw, ih) = self.config.image_size.resolve(screen, min_side);
        let plate = match self.config.plate_size {
            None => (iw, ih),
            Some(SizeSpec::Rect { width, height }) => {
                (iw.max(width as i32), ih.max(height as i32))
            }
            Some(square) => {
                let (side, _) = square.resolve(screen, min_side);
                let side = side.max(iw).max(ih);
                (side, side)
            }
        };
        ((iw, ih), plate)
    }

    /// Center offset actually applied on `screen`, clamped so plates stay inside the edge margin.
    pub fn effective_offset(&self, screen: Extent) -> i32 {
        let (_, (pw, _)) = self.sizes(screen);
        let max_offset =
            (screen.width as i32 / 2 - pw / 2 - self.config.edge_margin_px as i32).max(0);
        (self.config.center_offset_px as i32).min(max_offset)
    }

    /// True when the configured center offset does not fit on `screen`.
    pub fn offset_clamped(&self, screen: Extent) -> bool {
        self.config.arrangement == Arrangement::Pair
            && self.effective_offset(screen) < self.config.center_offset_px as i32
    }

    pub fn place<R: Rng + ?Sized>(&self, screen: Extent, rng: &mut R) -> PlateLayout {
        let ((iw, ih), (pw, ph)) = self.sizes(screen);
        let cx = screen.width as i32 / 2;
        let cy = screen.height as i32 / 2;

        let plates = match (self.config.arrangement, self.config.placement) {
            (Arrangement::Pair, _) => {
                let offset = self.effective_offset(screen);
                [(Side::Left, cx - offset), (Side::Right, cx + offset)]
                    .into_iter()
                    .map(|(side, x)| Plate {
                        side,
                        image: Rect::centered(x, cy, iw, ih),
                        plate: Rect::centered(x, cy, pw, ph),
                    })
                    .collect()
            }
            (Arrangement::Single, Placement::Fixed) => vec![Plate {
                side: Side::Center,
                image: Rect::centered(cx, cy, iw, ih),
                plate: Rect::centered(cx, cy, pw, ph),
            }],
            (Arrangement::Single, Placement::Random) => {
                let plate = random_rect(screen, pw, ph, rng);
                let center = plate.center();
                let image = Rect::centered(center.x, center.y, iw.min(plate.width), ih.min(plate.height));
                vec![Plate {
                    side: Side::Center,
                    image,
                    plate,
                }]
            }
        };

        PlateLayout {
            arrangement: self.config.arrangement,
            plates,
        }
    }
}

/// Uniform on-screen position; keeps a vertical margin of up to half the side when it fits.
fn random_rect<R: Rng + ?Sized>(screen: Extent, width: i32, height: i32, rng: &mut R) -> Rect {
    let sw = screen.width as i32;
    let sh = screen.height as i32;
    let w = width.min(sw).max(1);
    let h = height.min(sh).max(1);

    let x_max = sw - w;
    let x = if x_max >= 0 { rng.random_range(0..=x_max) } else { 0 };

    let m = (h / 2).min(((sh - h) / 2).max(0));
    let (y_min, y_max) = (m, sh - h - m);
    let y = if y_max >= y_min {
        rng.random_range(y_min..=y_max)
    } else {
        ((sh - h) / 2).max(0)
    };

    Rect::new(x, y, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SCREEN: Extent = Extent::new(1280, 720);

    #[test]
    fn rect_inflate_and_contains() {
        let r = Rect::new(10, 10, 20, 20);
        assert!(r.contains(Point::new(10, 10)));
        assert!(!r.contains(Point::new(30, 10)));
        let grown = r.inflate(5);
        assert_eq!(grown, Rect::new(5, 5, 30, 30));
        assert!(grown.contains(Point::new(34, 34)));
        assert!(grown.contains_rect(&r));
    }

    #[test]
    fn huge_margins_saturate() {
        let r = Rect::new(10, 10, 20, 20);
        let grown = r.inflate(u32::MAX);
        assert_eq!(grown.x, 10 - i32::MAX);
        assert_eq!(grown.width, i32::MAX);

        assert!(r.contains_inflated(Point::new(29, 29), 0));
        assert!(!r.contains_inflated(Point::new(30, 10), 0));
        assert!(r.contains_inflated(Point::new(34, 34), 5));
        assert!(r.contains_inflated(Point::new(i32::MAX, i32::MIN), u32::MAX));
        assert!(!Rect::new(0, 0, 0, 5).contains_inflated(Point::new(0, 0), 10));
    }

    #[test]
    fn rect_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersect(&Rect::new(5, 5, 10, 10)), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.intersect(&Rect::new(10, 0, 5, 5)), None);
    }

    #[test]
    fn pair_layout_is_symmetric_about_center() {
        let geometry = GeometryLayout::new(LayoutConfig::default()).unwrap();
        let layout = geometry.place(SCREEN, &mut StdRng::seed_from_u64(1));
        let left = layout.plate(Side::Left).unwrap();
        let right = layout.plate(Side::Right).unwrap();
        assert_eq!(left.plate, Rect::new(220, 240, 240, 240));
        assert_eq!(right.plate, Rect::new(820, 240, 240, 240));
        assert_eq!(left.image, left.plate);
    }

    #[test]
    fn plate_never_smaller_than_image() {
        let config = LayoutConfig {
            image_size: SizeSpec::Rect {
                width: 200,
                height: 300,
            },
            plate_size: Some(SizeSpec::Square(250)),
            ..LayoutConfig::default()
        };
        let geometry = GeometryLayout::new(config).unwrap();
        let layout = geometry.place(SCREEN, &mut StdRng::seed_from_u64(1));
        for plate in layout.plates() {
            assert_eq!(plate.plate.width, 300);
            assert!(plate.plate.contains_rect(&plate.image));
        }
    }

    #[test]
    fn center_offset_is_clamped_to_screen() {
        let config = LayoutConfig {
            center_offset_px: 2000,
            ..LayoutConfig::default()
        };
        let geometry = GeometryLayout::new(config).unwrap();
        assert!(geometry.offset_clamped(SCREEN));
        assert_eq!(geometry.effective_offset(SCREEN), 640 - 120 - 16);
        let layout = geometry.place(SCREEN, &mut StdRng::seed_from_u64(1));
        for plate in layout.plates() {
            assert!(SCREEN.bounds().contains_rect(&plate.plate));
        }
    }

    #[test]
    fn screen_fraction_uses_short_side() {
        let config = LayoutConfig {
            arrangement: Arrangement::Single,
            image_size: SizeSpec::ScreenFraction(0.5),
            ..LayoutConfig::default()
        };
        let geometry = GeometryLayout::new(config).unwrap();
        assert_eq!(geometry.sizes(SCREEN).0, (360, 360));
    }

    #[test]
    fn random_single_plate_stays_on_screen() {
        let config = LayoutConfig {
            arrangement: Arrangement::Single,
            placement: Placement::Random,
            ..LayoutConfig::default()
        };
        let geometry = GeometryLayout::new(config).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let layout = geometry.place(SCREEN, &mut rng);
            let plate = layout.plate(Side::Center).unwrap();
            assert!(SCREEN.bounds().contains_rect(&plate.plate));
            assert!(plate.plate.contains_rect(&plate.image));
        }
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let random_pair = LayoutConfig {
            placement: Placement::Random,
            ..LayoutConfig::default()
        };
        assert_eq!(GeometryLayout::new(random_pair).unwrap_err(), LayoutError::RandomPair);

        let bad_fraction = LayoutConfig {
            image_size: SizeSpec::ScreenFraction(1.5),
            ..LayoutConfig::default()
        };
        assert!(matches!(
            GeometryLayout::new(bad_fraction),
            Err(LayoutError::InvalidFraction(_))
        ));
    }
}
