use std::{cmp::Reverse, fmt, io::Read};

use image::RgbaImage;
use ureq::Agent;

use crate::{error::Error, util::default_ureq_agent_builder};

// Pixel budget for clustering; covers are sampled down to this many points.
const MAX_SAMPLES: usize = 6_000;

const CLUSTERS: usize = 3;

const MAX_ITERATIONS: usize = 10;

// Minimum squared RGB distance for two clusters to count as distinct colors.
const DISTINCT_THRESHOLD: f32 = 400.0;

/// Decoded cover artwork.
pub struct CoverImage {
    pixels: RgbaImage,
}

impl CoverImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Backdrop colors of a cover, most populous cluster first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub primary: Rgb,
    pub secondary: Rgb,
}

/// Artwork seam of the sync controller.  Implementations run on the worker
/// pool; neither call may touch shared state.
pub trait ImagePipeline: Send + Sync {
    /// Download and decode the artwork at `url`.
    fn load_image(&self, url: &str) -> Result<CoverImage, Error>;

    /// Cluster the artwork into backdrop colors.  `None` when the image is
    /// too uniform to yield two distinct ones.
    fn extract_palette(&self, image: &CoverImage) -> Option<Palette>;
}

pub struct ArtworkFetcher {
    agent: Agent,
}

impl ArtworkFetcher {
    pub fn new(proxy_url: Option<&str>) -> Self {
        Self {
            agent: default_ureq_agent_builder(proxy_url).build().into(),
        }
    }
}

impl ImagePipeline for ArtworkFetcher {
    fn load_image(&self, url: &str) -> Result<CoverImage, Error> {
        let response = self.agent.get(url).call()?;
        let mut body = Vec::new();
        response.into_body().into_reader().read_to_end(&mut body)?;

        let decoded =
            image::load_from_memory(&body).map_err(|err| Error::ParseError(err.to_string()))?;
        Ok(CoverImage::new(decoded.to_rgba8()))
    }

    fn extract_palette(&self, image: &CoverImage) -> Option<Palette> {
        dominant_colors(image.pixels())
    }
}

#[derive(Clone, Copy)]
struct Cluster {
    centroid: [f32; 3],
    count: usize,
}

fn dominant_colors(image: &RgbaImage) -> Option<Palette> {
    let samples = sample_pixels(image, MAX_SAMPLES);
    if samples.len() < 2 {
        return None;
    }

    let mut clusters = kmeans_clusters(&samples, CLUSTERS.min(samples.len()), MAX_ITERATIONS);
    clusters.sort_by_key(|cluster| Reverse(cluster.count));

    let mut distinct: Vec<Rgb> = Vec::new();
    for cluster in clusters {
        if cluster.count == 0 {
            continue;
        }
        let color = color_from_centroid(cluster.centroid);
        if distinct
            .iter()
            .all(|&existing| color_distance_sq(existing, color) > DISTINCT_THRESHOLD)
        {
            distinct.push(color);
        }
    }

    match distinct.as_slice() {
        [primary, secondary, ..] => Some(Palette {
            primary: *primary,
            secondary: *secondary,
        }),
        _ => None,
    }
}

fn sample_pixels(image: &RgbaImage, max_samples: usize) -> Vec<[f32; 3]> {
    let total = image.pixels().len();
    if total == 0 || max_samples == 0 {
        return Vec::new();
    }

    let step = (total / max_samples).max(1);
    let mut samples = Vec::with_capacity(max_samples.min(total));

    for pixel in image.pixels().step_by(step) {
        // Skip transparent padding.
        if pixel.0[3] < 16 {
            continue;
        }
        samples.push([pixel.0[0] as f32, pixel.0[1] as f32, pixel.0[2] as f32]);
        if samples.len() >= max_samples {
            break;
        }
    }

    samples
}

fn kmeans_clusters(samples: &[[f32; 3]], k: usize, max_iterations: usize) -> Vec<Cluster> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }

    // Seed the centroids evenly across the sample sequence.
    let mut centroids = Vec::with_capacity(k);
    for i in 0..k {
        let index = ((i * samples.len()) / k).min(samples.len() - 1);
        centroids.push(samples[index]);
    }

    let mut assignments = vec![0usize; samples.len()];

    for iteration in 0..max_iterations {
        let mut sums = vec![[0f32; 3]; k];
        let mut counts = vec![0usize; k];

        for (sample_index, sample) in samples.iter().enumerate() {
            let mut best = 0;
            let mut best_distance = f32::MAX;
            for (centroid_index, centroid) in centroids.iter().enumerate() {
                let distance = squared_distance(sample, centroid);
                if distance < best_distance {
                    best_distance = distance;
                    best = centroid_index;
                }
            }

            assignments[sample_index] = best;
            for channel in 0..3 {
                sums[best][channel] += sample[channel];
            }
            counts[best] += 1;
        }

        let mut changed = false;
        for i in 0..k {
            if counts[i] == 0 {
                // Reseed starved clusters instead of letting them die.
                centroids[i] = samples[(i + iteration) % samples.len()];
                changed = true;
                continue;
            }
            let moved = [
                sums[i][0] / counts[i] as f32,
                sums[i][1] / counts[i] as f32,
                sums[i][2] / counts[i] as f32,
            ];
            if squared_distance(&centroids[i], &moved) > 1e-2 {
                changed = true;
            }
            centroids[i] = moved;
        }

        if !changed {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for &assignment in &assignments {
        counts[assignment] += 1;
    }

    centroids
        .into_iter()
        .enumerate()
        .map(|(index, centroid)| Cluster {
            centroid,
            count: counts[index],
        })
        .collect()
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn color_from_centroid(centroid: [f32; 3]) -> Rgb {
    Rgb::new(
        centroid[0].clamp(0.0, 255.0).round() as u8,
        centroid[1].clamp(0.0, 255.0).round() as u8,
        centroid[2].clamp(0.0, 255.0).round() as u8,
    )
}

fn color_distance_sq(a: Rgb, b: Rgb) -> f32 {
    let dr = a.r as f32 - b.r as f32;
    let dg = a.g as f32 - b.g as f32;
    let db = a.b as f32 - b.b as f32;
    dr * dr + dg * dg + db * db
}
