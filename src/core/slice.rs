// Copyright @yucwang 2026

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::error::{Result, VolumeError};
use crate::core::volume::Volume;
use crate::math::constants::{Float, Vector3f};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceAxis {
    X,
    Y,
    Z,
}

impl SliceAxis {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "x" => Ok(SliceAxis::X),
            "y" => Ok(SliceAxis::Y),
            "z" => Ok(SliceAxis::Z),
            other => Err(VolumeError::Format(format!("unknown slice axis '{}'", other))),
        }
    }

    /// (normal, image horizontal, image vertical) axis indices.
    fn frame(&self) -> (usize, usize, usize) {
        match self {
            SliceAxis::X => (0, 1, 2),
            SliceAxis::Y => (1, 0, 2),
            SliceAxis::Z => (2, 0, 1),
        }
    }
}

/// An axis-aligned cut through the volume bounds. `position` runs from 0
/// at the lower face to 1 at the upper face; `resolution` is the width
/// of the image in pixels.
#[derive(Clone, Copy, Debug)]
pub struct SliceRequest {
    pub axis: SliceAxis,
    pub position: Float,
    pub resolution: usize,
}

pub struct Slice {
    pub width: usize,
    pub height: usize,
    /// Row-major, row 0 at the top; misses are NaN.
    pub values: Vec<Float>,
}

impl Slice {
    /// Min and max over the samples that hit the volume.
    pub fn value_range(&self) -> Option<(Float, Float)> {
        self.values.iter().filter(|v| !v.is_nan()).fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Sample a slice of a committed volume on `threads` workers
/// (0 picks the available parallelism).
pub fn sample_slice(volume: &dyn Volume, request: &SliceRequest, threads: usize, show_progress: bool) -> Result<Slice> {
    let bbox = volume
        .bbox()
        .ok_or_else(|| VolumeError::Format(format!("{} has no bounds to slice", volume.base().label())))?;
    if request.resolution == 0 {
        return Err(VolumeError::Format("slice resolution must be positive".to_string()));
    }

    let (n, u, v) = request.axis.frame();
    let extent = bbox.diagnal();
    let width = request.resolution;
    let height = if extent[u] > 0.0 {
        ((width as Float) * extent[v] / extent[u]).round().max(1.0) as usize
    } else {
        width
    };
    let depth = bbox.p_min[n] + request.position.clamp(0.0, 1.0) * extent[n];
    log::info!("Sampling {}x{} slice of {} at {:?} = {}.",
               width, height, volume.base().label(), request.axis, depth);

    let point_at = |x: usize, y: usize| -> Vector3f {
        let mut p = Vector3f::zeros();
        p[n] = depth;
        p[u] = bbox.p_min[u] + (x as Float + 0.5) / width as Float * extent[u];
        p[v] = bbox.p_max[v] - (y as Float + 0.5) / height as Float * extent[v];
        p
    };

    let rows_per_block = 16usize;
    let total_blocks = (height + rows_per_block - 1) / rows_per_block;

    let progress = if show_progress {
        let bar = ProgressBar::new(total_blocks as u64);
        bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} blocks")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let thread_count = match threads {
        0 => thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        t => t,
    };
    let next_block = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel::<(usize, Vec<Float>)>();
    let mut values = vec![0.0 as Float; width * height];

    thread::scope(|scope| {
        for _ in 0..thread_count {
            let next_block = Arc::clone(&next_block);
            let tx = tx.clone();
            let point_at = &point_at;
            scope.spawn(move || {
                loop {
                    let block_index = next_block.fetch_add(1, Ordering::Relaxed);
                    if block_index >= total_blocks {
                        break;
                    }

                    let y0 = block_index * rows_per_block;
                    let y1 = (y0 + rows_per_block).min(height);
                    let mut points = Vec::with_capacity((y1 - y0) * width);
                    for y in y0..y1 {
                        for x in 0..width {
                            points.push(point_at(x, y));
                        }
                    }
                    let mut block = vec![0.0 as Float; points.len()];
                    volume.compute_samples(&mut block, &points);
                    if tx.send((y0, block)).is_err() {
                        break;
                    }
                }
            });
        }

        drop(tx);
        for _ in 0..total_blocks {
            if let Ok((y0, block)) = rx.recv() {
                values[y0 * width..y0 * width + block.len()].copy_from_slice(&block);
                progress.inc(1);
            }
        }
    });
    progress.finish_and_clear();

    Ok(Slice { width, height, values })
}
