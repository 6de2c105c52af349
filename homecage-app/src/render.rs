use anyhow::{Result, anyhow};
use homecage_core::{PlateLayout, Rect};
use homecage_timing::Timer;
use std::time::Duration;
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Stroke, Transform};

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub plate: Color,
    pub image: Color,
    pub outline: Color,
}

impl Palette {
    pub fn new(background: [u8; 3], plate: [u8; 3]) -> Self {
        let rgb = |[r, g, b]: [u8; 3]| Color::from_rgba8(r, g, b, 255);
        // image placeholder is drawn a step lighter than its plate
        let lighter = plate.map(|c| c.saturating_add(64));
        Self {
            background: rgb(background),
            plate: rgb(plate),
            image: rgb(lighter),
            outline: Color::from_rgba8(255, 64, 64, 255),
        }
    }
}

/// What the current frame shows. The renderer holds no trial state of its own.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub stimulus_on: bool,
    pub layout: &'a PlateLayout,
    pub has_images: bool,
    pub hit_margin_px: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
}

pub struct FrameRenderer {
    canvas: Pixmap,
    palette: Palette,
    show_box: bool,
}

fn skia_rect(r: &Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(r.x as f32, r.y as f32, r.width as f32, r.height as f32)
}

impl FrameRenderer {
    pub fn new(width: u32, height: u32, palette: Palette, show_box: bool) -> Result<Self> {
        let canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate {width}x{height} canvas"))?;
        Ok(Self {
            canvas,
            palette,
            show_box,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate {width}x{height} canvas"))?;
        Ok(())
    }

    /// Redraws the whole canvas and copies it into `frame_buffer` (RGBA8, same extent).
    pub fn render_frame<T: Timer<Timestamp = u64>>(
        &mut self,
        view: FrameView<'_>,
        frame_buffer: &mut [u8],
        timer: &T,
    ) -> Result<FrameStats> {
        let t = timer.now();
        self.draw(view);
        let draw = timer.elapsed(t);

        let t = timer.now();
        let data = self.canvas.data();
        if frame_buffer.len() != data.len() {
            return Err(anyhow!(
                "frame buffer is {} bytes, canvas is {}",
                frame_buffer.len(),
                data.len()
            ));
        }
        // every colour is opaque, so premultiplied and straight RGBA agree
        frame_buffer.copy_from_slice(data);
        let copy = timer.elapsed(t);

        Ok(FrameStats {
            draw,
            copy,
            total: draw + copy,
        })
    }

    fn draw(&mut self, view: FrameView<'_>) {
        self.canvas.fill(self.palette.background);
        if !view.stimulus_on {
            return;
        }

        let mut paint = Paint::default();
        for plate in view.layout.plates() {
            if let Some(r) = skia_rect(&plate.plate) {
                paint.set_color(self.palette.plate);
                self.canvas.fill_rect(r, &paint, Transform::identity(), None);
            }
            if view.has_images {
                if let Some(r) = skia_rect(&plate.image) {
                    paint.set_color(self.palette.image);
                    self.canvas.fill_rect(r, &paint, Transform::identity(), None);
                }
            }
            if self.show_box {
                self.outline(&plate.plate);
                if view.hit_margin_px > 0 {
                    self.outline(&plate.plate.inflate(view.hit_margin_px));
                }
            }
        }
    }

    fn outline(&mut self, rect: &Rect) {
        let Some(path) = skia_rect(rect).map(PathBuilder::from_rect) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(self.palette.outline);
        let stroke = Stroke {
            width: 2.0,
            ..Stroke::default()
        };
        self.canvas
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}
