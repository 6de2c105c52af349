use crate::geometry::{PlateLayout, Point, Rect, Side};

/// Where a contact landed relative to one plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Core,
    Margin,
    Miss,
}

impl Zone {
    /// Classifies `p` against `plate` grown by `margin` pixels on every edge.
    pub fn of(p: Point, plate: &Rect, margin: u32) -> Zone {
        if plate.contains(p) {
            Zone::Core
        } else if margin > 0 && plate.contains_inflated(p, margin) {
            Zone::Margin
        } else {
            Zone::Miss
        }
    }
}

/// Resolved classification of a contact against the whole layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitArea {
    Core(Side),
    Margin(Side),
    Outside,
}

impl HitArea {
    /// Per-plate zones, in layout order.
    pub fn zones(
        p: Point,
        layout: &PlateLayout,
        margin: u32,
    ) -> impl Iterator<Item = (Side, Zone)> + '_ {
        layout
            .plates()
            .iter()
            .map(move |plate| (plate.side, Zone::of(p, &plate.plate, margin)))
    }

    /// Picks one side for `p`.
    ///
    /// Overlapping tolerance regions are resolved left-first: the first plate whose core
    /// contains the point wins, otherwise the first plate whose margin contains it.
    pub fn resolve(p: Point, layout: &PlateLayout, margin: u32) -> HitArea {
        let mut first_margin = None;
        for (side, zone) in Self::zones(p, layout, margin) {
            match zone {
                Zone::Core => return HitArea::Core(side),
                Zone::Margin if first_margin.is_none() => first_margin = Some(side),
                _ => {}
            }
        }
        first_margin.map_or(HitArea::Outside, HitArea::Margin)
    }

    pub fn side(&self) -> Option<Side> {
        match *self {
            HitArea::Core(side) | HitArea::Margin(side) => Some(side),
            HitArea::Outside => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        !matches!(self, HitArea::Outside)
    }

    pub fn label(&self) -> &'static str {
        match *self {
            HitArea::Core(Side::Left) => "left_core",
            HitArea::Core(Side::Right) => "right_core",
            HitArea::Core(Side::Center) => "center_core",
            HitArea::Margin(Side::Left) => "left_margin",
            HitArea::Margin(Side::Right) => "right_margin",
            HitArea::Margin(Side::Center) => "center_margin",
            HitArea::Outside => "outside",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Extent, GeometryLayout, LayoutConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn layout(offset: u32) -> PlateLayout {
        let config = LayoutConfig {
            center_offset_px: offset,
            ..LayoutConfig::default()
        };
        GeometryLayout::new(config)
            .unwrap()
            .place(Extent::new(1280, 720), &mut StdRng::seed_from_u64(0))
    }

    #[test]
    fn classifies_core_margin_and_outside() {
        let layout = layout(300);
        // left plate spans x 220..460, y 240..480
        for margin in [0, 1, 10, 40] {
            assert_eq!(
                HitArea::resolve(Point::new(340, 360), &layout, margin),
                HitArea::Core(Side::Left)
            );
            assert_eq!(
                HitArea::resolve(Point::new(10, 10), &layout, margin),
                HitArea::Outside
            );
        }
        assert_eq!(
            HitArea::resolve(Point::new(215, 360), &layout, 10),
            HitArea::Margin(Side::Left)
        );
        assert_eq!(
            HitArea::resolve(Point::new(215, 360), &layout, 0),
            HitArea::Outside
        );
        assert_eq!(
            HitArea::resolve(Point::new(1065, 300), &layout, 10),
            HitArea::Margin(Side::Right)
        );
    }

    #[test]
    fn zero_margin_never_yields_margin_zone() {
        let plate = Rect::new(0, 0, 10, 10);
        for x in -5..15 {
            for y in -5..15 {
                assert_ne!(Zone::of(Point::new(x, y), &plate, 0), Zone::Margin);
            }
        }
    }

    #[test]
    fn overlapping_margins_prefer_left() {
        // plates 240 wide at offset 130 leave a 20px gap between them
        let layout = layout(130);
        let gap = Point::new(640, 360);
        assert_eq!(HitArea::resolve(gap, &layout, 0), HitArea::Outside);
        assert_eq!(HitArea::resolve(gap, &layout, 50), HitArea::Margin(Side::Left));
    }

    #[test]
    fn huge_margin_covers_whole_screen() {
        let layout = layout(300);
        for margin in [1_500_000_000, u32::MAX] {
            for p in [Point::new(10, 10), Point::new(1270, 710), Point::new(-5_000, 90_000)] {
                assert_eq!(HitArea::resolve(p, &layout, margin), HitArea::Margin(Side::Left));
            }
            assert_eq!(
                HitArea::resolve(Point::new(940, 360), &layout, margin),
                HitArea::Core(Side::Right)
            );
        }
    }

    #[test]
    fn core_beats_earlier_margin() {
        let layout = layout(130);
        // inside the right core but also within the left plate's inflated region
        let p = Point::new(655, 360);
        assert_eq!(HitArea::resolve(p, &layout, 50), HitArea::Core(Side::Right));
        let zones: Vec<_> = HitArea::zones(p, &layout, 50).collect();
        assert_eq!(zones, vec![(Side::Left, Zone::Margin), (Side::Right, Zone::Core)]);
    }
}
