//! Offscreen helix renderer.
//!
//! The scene never changes: a helix inside the `[-limit, limit]^3` box, seen from a fixed
//! elevation. Only the azimuth moves from frame to frame.
//!
//! All drawing goes into a [`RenderSurface`], a single pixel buffer that is cleared and
//! redrawn on every call instead of being reallocated. The surface is owned by the caller
//! (the driver loop) and lent out as `&mut`, so there is exactly one writer at a time.

use plotters::prelude::*;

use crate::config::RenderCfg;
use crate::error::EngineError;
use crate::frame::Frame;

/// Point in scene space. `z` is the helix axis and points up on screen.
pub type Point3 = (f64, f64, f64);

/// Reusable RGB8 drawing buffer.
#[derive(Debug)]
pub struct RenderSurface {
    width: u32,
    height: u32,
    buf: Vec<u8>,
    frames_drawn: u64,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            buf: vec![0u8; (width as usize) * (height as usize) * 3],
            frames_drawn: 0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of frames drawn into this surface so far.
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    fn ensure_size(&mut self, width: u32, height: u32) {
        let bytes = (width as usize) * (height as usize) * 3;
        self.width = width;
        self.height = height;
        if self.buf.len() != bytes {
            self.buf.resize(bytes, 0);
        }
    }
}

/// `n` evenly spaced values from `start` to `end`, both inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// One full turn of a unit circle swept linearly along `z` from `-1` to `1`.
pub fn helix_points(samples: usize) -> Vec<Point3> {
    let theta = linspace(0.0, std::f64::consts::TAU, samples);
    let z = linspace(-1.0, 1.0, samples);
    theta
        .iter()
        .zip(z.iter())
        .map(|(&t, &z)| (t.sin(), t.cos(), z))
        .collect()
}

fn cube_edges(limit: f64) -> Vec<[Point3; 2]> {
    let l = limit;
    let corners = [
        (-l, -l, -l),
        (l, -l, -l),
        (l, l, -l),
        (-l, l, -l),
        (-l, -l, l),
        (l, -l, l),
        (l, l, l),
        (-l, l, l),
    ];
    const EDGES: [(usize, usize); 12] = [
        (0, 1), (1, 2), (2, 3), (3, 0),
        (4, 5), (5, 6), (6, 7), (7, 4),
        (0, 4), (1, 5), (2, 6), (3, 7),
    ];
    EDGES.iter().map(|&(a, b)| [corners[a], corners[b]]).collect()
}

// plotters is y-up; the scene is z-up.
fn to_chart(p: Point3) -> Point3 {
    (p.0, p.2, p.1)
}

fn render_err<E: std::fmt::Debug>(e: E) -> EngineError {
    EngineError::Render(format!("{:?}", e))
}

/// Produces one frame per azimuth. A pure function of the azimuth plus the fixed
/// [`RenderCfg`].
#[derive(Debug, Clone)]
pub struct FrameGenerator {
    cfg: RenderCfg,
    helix: Vec<Point3>,
    box_edges: Vec<[Point3; 2]>,
}

impl FrameGenerator {
    pub fn new(cfg: RenderCfg) -> Self {
        let helix = helix_points(cfg.samples);
        let box_edges = if cfg.draw_box { cube_edges(cfg.axis_limit) } else { Vec::new() };
        Self { cfg, helix, box_edges }
    }

    pub fn cfg(&self) -> &RenderCfg {
        &self.cfg
    }

    pub fn helix(&self) -> &[Point3] {
        &self.helix
    }

    /// Output dimensions; identical for every call.
    pub fn frame_size(&self) -> (u32, u32) {
        self.cfg.pixel_size()
    }

    /// A surface sized for this generator.
    pub fn new_surface(&self) -> RenderSurface {
        let (w, h) = self.frame_size();
        RenderSurface::new(w, h)
    }

    /// Clear `surface`, draw the scene at `azimuth_deg` and copy the result out as a frame.
    pub fn generate(&self, surface: &mut RenderSurface, azimuth_deg: f64) -> Result<Frame, EngineError> {
        let (w, h) = self.frame_size();
        surface.ensure_size(w, h);

        let [br, bg, bb] = self.cfg.background;
        let [cr, cg, cb] = self.cfg.curve_color;
        let limit = self.cfg.axis_limit.abs().max(f64::EPSILON);
        let pitch = self.cfg.elevation_deg.to_radians();
        let yaw = azimuth_deg.rem_euclid(360.0).to_radians();
        let margin = (w.min(h) / 25).max(1) as i32;

        {
            let root = BitMapBackend::with_buffer(&mut surface.buf, (w, h)).into_drawing_area();
            root.fill(&RGBColor(br, bg, bb)).map_err(render_err)?;

            let mut chart = ChartBuilder::on(&root)
                .margin(margin)
                .build_cartesian_3d(-limit..limit, -limit..limit, -limit..limit)
                .map_err(render_err)?;

            chart.with_projection(|mut pb| {
                pb.pitch = pitch;
                pb.yaw = yaw;
                pb.scale = 0.8;
                pb.into_matrix()
            });

            if !self.box_edges.is_empty() {
                let style = RGBColor(190, 190, 190).stroke_width(1);
                chart
                    .draw_series(self.box_edges.iter().map(|[a, b]| {
                        PathElement::new(vec![to_chart(*a), to_chart(*b)], style)
                    }))
                    .map_err(render_err)?;
            }

            chart
                .draw_series(LineSeries::new(
                    self.helix.iter().map(|&p| to_chart(p)),
                    RGBColor(cr, cg, cb).stroke_width(self.cfg.line_width.max(1)),
                ))
                .map_err(render_err)?;

            root.present().map_err(render_err)?;
        }

        surface.frames_drawn += 1;
        Frame::from_rgb(w, h, surface.buf.clone())
    }
}
