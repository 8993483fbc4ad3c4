use std::fmt::Write as _;

use crate::canvas::scene::{ChartCanvas, Mark};
use crate::foundation::core::{HOURS_PER_DAY, Point, Rect, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::{FrameRGBA, over_in_place};

/// Raster size and chrome colours of captured frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterOpts {
    pub width: u32,
    pub height: u32,
    /// Figure colour behind and around the plot area.
    pub face: Rgba8,
    /// Axis frame and text colour.
    pub ink: Rgba8,
}

impl Default for RasterOpts {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            face: Rgba8::grey(0),
            ink: Rgba8::grey(255),
        }
    }
}

/// Pixel-space plot area plus the data ranges it shows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PlotFrame {
    pub(crate) area: Rect,
    pub(crate) y_range: (f64, f64),
    pub(crate) scale: f64,
}

impl PlotFrame {
    pub(crate) fn new(opts: &RasterOpts, y_range: (f64, f64)) -> ReelResult<Self> {
        let scale = f64::from(opts.height) / 1080.0;
        let area = Rect::new(
            96.0 * scale,
            88.0 * scale,
            f64::from(opts.width) - 48.0 * scale,
            f64::from(opts.height) - 72.0 * scale,
        );
        if area.width() < 1.0 || area.height() < 1.0 {
            return Err(ReelError::render(format!(
                "raster {}x{} leaves no room for the plot",
                opts.width, opts.height
            )));
        }
        Ok(Self {
            area,
            y_range,
            scale,
        })
    }

    /// Chart units (hours, degrees) to pixels.
    pub(crate) fn to_px(&self, p: Point) -> Point {
        let (lo, hi) = self.y_range;
        Point::new(
            self.area.x0 + p.x / HOURS_PER_DAY * self.area.width(),
            self.area.y1 - (p.y - lo) / (hi - lo) * self.area.height(),
        )
    }

    pub(crate) fn rect_to_px(&self, r: Rect) -> Rect {
        Rect::from_points(
            self.to_px(Point::new(r.x0, r.y0)),
            self.to_px(Point::new(r.x1, r.y1)),
        )
    }

    /// Altitudes that get a grid line and a label.
    pub(crate) fn y_ticks(&self) -> Vec<f64> {
        let (lo, hi) = self.y_range;
        let step = if hi - lo > 60.0 { 10.0 } else { 5.0 };
        let mut out = Vec::new();
        let mut y = (lo / step).ceil() * step;
        while y <= hi {
            out.push(y);
            y += step;
        }
        out
    }
}

/// CPU rasterizer for [`ChartCanvas`]: `vello_cpu` paints marks, `resvg` paints text on top.
pub struct ChartRasterizer {
    opts: RasterOpts,
    ctx: Option<vello_cpu::RenderContext>,
    svg_opts: Option<usvg::Options<'static>>,
}

impl ChartRasterizer {
    pub fn new(opts: RasterOpts) -> Self {
        Self {
            opts,
            ctx: None,
            svg_opts: None,
        }
    }

    #[tracing::instrument(level = "trace", skip_all)]
    pub fn render(&mut self, canvas: &ChartCanvas) -> ReelResult<FrameRGBA> {
        let width: u16 = self
            .opts
            .width
            .try_into()
            .map_err(|_| ReelError::render("frame width exceeds u16"))?;
        let height: u16 = self
            .opts
            .height
            .try_into()
            .map_err(|_| ReelError::render("frame height exceeds u16"))?;
        let plot = PlotFrame::new(&self.opts, canvas.y_range())?;

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            _ => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        paint_marks(&mut ctx, &self.opts, &plot, canvas);
        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);
        self.ctx = Some(ctx);

        let mut data = pixmap.data_as_u8_slice().to_vec();
        let text = self.rasterize_text(&plot, canvas)?;
        over_in_place(&mut data, &text)?;

        Ok(FrameRGBA {
            width: self.opts.width,
            height: self.opts.height,
            data,
            premultiplied: true,
        })
    }

    fn rasterize_text(&mut self, plot: &PlotFrame, canvas: &ChartCanvas) -> ReelResult<Vec<u8>> {
        let svg = text_overlay_svg(&self.opts, plot, canvas);
        let opts = self.svg_opts.get_or_insert_with(|| {
            let mut opts = usvg::Options::default();
            opts.fontdb_mut().load_system_fonts();
            opts
        });
        let tree = usvg::Tree::from_str(&svg, opts)
            .map_err(|e| ReelError::render(format!("text overlay: {e}")))?;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(self.opts.width, self.opts.height)
            .ok_or_else(|| ReelError::render("failed to allocate text pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );
        Ok(pixmap.data().to_vec())
    }
}

fn set_color(ctx: &mut vello_cpu::RenderContext, c: Rgba8) {
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn polyline_to_cpu(points: impl IntoIterator<Item = Point>) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for (i, p) in points.into_iter().enumerate() {
        let p = vello_cpu::kurbo::Point::new(p.x, p.y);
        if i == 0 {
            out.move_to(p);
        } else {
            out.line_to(p);
        }
    }
    out
}

fn stroke_px(ctx: &mut vello_cpu::RenderContext, from: Point, to: Point, width: f64, c: Rgba8) {
    set_color(ctx, c);
    ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
    ctx.stroke_path(&polyline_to_cpu([from, to]));
}

fn paint_marks(
    ctx: &mut vello_cpu::RenderContext,
    opts: &RasterOpts,
    plot: &PlotFrame,
    canvas: &ChartCanvas,
) {
    let full = Rect::new(0.0, 0.0, f64::from(opts.width), f64::from(opts.height));
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    set_color(ctx, opts.face);
    ctx.fill_rect(&rect_to_cpu(full));

    let (lo, hi) = plot.y_range;
    for (_, mark) in canvas.marks_in_paint_order() {
        if !mark.is_visible() {
            continue;
        }
        match mark {
            Mark::Rect(r) => {
                if r.extent.width() <= 0.0 {
                    continue;
                }
                let px = plot.rect_to_px(r.extent.to_rect()).intersect(plot.area);
                if px.width() > 0.0 && px.height() > 0.0 {
                    set_color(ctx, r.color);
                    ctx.fill_rect(&rect_to_cpu(px));
                }
            }
            Mark::Grid(g) => {
                let w = plot.scale.max(0.5);
                for hour in 0..=HOURS_PER_DAY as u32 {
                    let x = f64::from(hour);
                    stroke_px(
                        ctx,
                        plot.to_px(Point::new(x, lo)),
                        plot.to_px(Point::new(x, hi)),
                        w,
                        g.color,
                    );
                }
                for y in plot.y_ticks() {
                    stroke_px(
                        ctx,
                        plot.to_px(Point::new(0.0, y)),
                        plot.to_px(Point::new(HOURS_PER_DAY, y)),
                        w,
                        g.color,
                    );
                }
            }
            Mark::Guide(g) => {
                if g.y < lo || g.y > hi {
                    continue;
                }
                stroke_px(
                    ctx,
                    plot.to_px(Point::new(0.0, g.y)),
                    plot.to_px(Point::new(HOURS_PER_DAY, g.y)),
                    2.0 * plot.scale,
                    g.color,
                );
            }
            Mark::Lines(batch) => {
                for (i, path) in batch.paths.iter().enumerate() {
                    if path.len() < 2 {
                        continue;
                    }
                    let color = batch.colors.get(i).copied().unwrap_or(opts.ink);
                    let width = batch.widths.get(i).copied().unwrap_or(1.0) * plot.scale;
                    set_color(ctx, color);
                    ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width.max(0.5)));
                    ctx.stroke_path(&polyline_to_cpu(path.iter().map(|p| plot.to_px(*p))));
                }
            }
        }
    }

    // Everything outside the plot area is chrome: mask spill-over, then frame the axes.
    set_color(ctx, opts.face);
    let a = plot.area;
    for margin in [
        Rect::new(0.0, 0.0, full.x1, a.y0),
        Rect::new(0.0, a.y1, full.x1, full.y1),
        Rect::new(0.0, a.y0, a.x0, a.y1),
        Rect::new(a.x1, a.y0, full.x1, a.y1),
    ] {
        ctx.fill_rect(&rect_to_cpu(margin));
    }
    set_color(ctx, opts.ink);
    ctx.set_stroke(vello_cpu::kurbo::Stroke::new((1.5 * plot.scale).max(1.0)));
    ctx.stroke_path(&polyline_to_cpu([
        Point::new(a.x0, a.y0),
        Point::new(a.x1, a.y0),
        Point::new(a.x1, a.y1),
        Point::new(a.x0, a.y1),
        Point::new(a.x0, a.y0),
    ]));
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

pub(crate) fn text_overlay_svg(opts: &RasterOpts, plot: &PlotFrame, canvas: &ChartCanvas) -> String {
    let s = plot.scale;
    let ink = opts.ink.to_svg_hex();
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" font-family="sans-serif" fill="{ink}">"#,
        opts.width, opts.height
    );
    let _ = write!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" font-size="{:.1}" text-anchor="middle">{}</text>"#,
        plot.area.center().x,
        plot.area.y0 - 28.0 * s,
        32.0 * s,
        xml_escape(canvas.title())
    );
    for (i, label) in canvas.tick_labels().iter().enumerate() {
        let p = plot.to_px(Point::new(i as f64, plot.y_range.0));
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="{:.1}" text-anchor="middle">{}</text>"#,
            p.x,
            p.y + 30.0 * s,
            18.0 * s,
            xml_escape(label)
        );
    }
    for y in plot.y_ticks() {
        let p = plot.to_px(Point::new(0.0, y));
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="{:.1}" text-anchor="end">{y}</text>"#,
            p.x - 10.0 * s,
            p.y + 6.0 * s,
            18.0 * s,
        );
    }
    svg.push_str("</svg>");
    svg
}
