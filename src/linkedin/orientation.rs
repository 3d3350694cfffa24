// src/linkedin/orientation.rs
//! Best-effort orientation guess for puzzle images.
//!
//! Edges come from a Sobel pass over the grayscale image. The largest
//! 8-connected edge component is taken as the subject, and its centre of mass
//! relative to the horizontal midline decides the answer.

use base64::Engine;
use image::GrayImage;
use std::fmt;
use tracing::debug;

/// Gradient magnitude (|gx| + |gy|) above which a pixel counts as an edge
const EDGE_THRESHOLD: i32 = 160;
/// Components smaller than this are noise
const MIN_COMPONENT_PIXELS: usize = 8;
/// Centroids this close to the midline (fraction of height) are undecided
const MIDLINE_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Up,
    Down,
    Unknown,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown => "unknown",
        })
    }
}

/// Decoded payload of a `data:image/...;base64,` URL
pub fn decode_data_url(src: &str) -> Option<Vec<u8>> {
    let rest = src.trim().strip_prefix("data:image")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()
}

pub fn orientation_from_data_url(src: &str) -> Orientation {
    match decode_data_url(src) {
        Some(bytes) => detect_orientation(&bytes),
        None => Orientation::Unknown,
    }
}

pub fn detect_orientation(bytes: &[u8]) -> Orientation {
    match image::load_from_memory(bytes) {
        Ok(img) => classify(&img.to_luma8()),
        Err(e) => {
            debug!("Could not decode puzzle image: {}", e);
            Orientation::Unknown
        }
    }
}

fn classify(gray: &GrayImage) -> Orientation {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return Orientation::Unknown;
    }

    let edges = edge_mask(gray);
    let Some(component) = largest_component(&edges, width as usize, height as usize) else {
        return Orientation::Unknown;
    };
    if component.len() < MIN_COMPONENT_PIXELS {
        return Orientation::Unknown;
    }

    let centroid_y =
        component.iter().map(|&(_, y)| y as f64).sum::<f64>() / component.len() as f64;
    let midline = (height as f64 - 1.0) / 2.0;
    let tolerance = height as f64 * MIDLINE_TOLERANCE;

    if centroid_y < midline - tolerance {
        Orientation::Up
    } else if centroid_y > midline + tolerance {
        Orientation::Down
    } else {
        Orientation::Unknown
    }
}

fn edge_mask(gray: &GrayImage) -> Vec<bool> {
    let (width, height) = gray.dimensions();
    let px = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as i32;
    let mut mask = vec![false; (width * height) as usize];

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = (px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2 * px(x, y - 1) + px(x + 1, y - 1));
            mask[(y * width + x) as usize] = gx.abs() + gy.abs() > EDGE_THRESHOLD;
        }
    }
    mask
}

fn largest_component(mask: &[bool], width: usize, height: usize) -> Option<Vec<(usize, usize)>> {
    let mut visited = vec![false; mask.len()];
    let mut best: Option<Vec<(usize, usize)>> = None;

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        visited[start] = true;
        let mut stack = vec![start];
        let mut pixels = Vec::new();

        while let Some(index) = stack.pop() {
            let (x, y) = (index % width, index / width);
            pixels.push((x, y));

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let neighbour = ny as usize * width + nx as usize;
                    if mask[neighbour] && !visited[neighbour] {
                        visited[neighbour] = true;
                        stack.push(neighbour);
                    }
                }
            }
        }

        if best.as_ref().map_or(true, |b| pixels.len() > b.len()) {
            best = Some(pixels);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Luma};
    use std::io::Cursor;

    /// White canvas with a black block spanning rows `top..bottom`
    fn block_image(top: u32, bottom: u32) -> GrayImage {
        GrayImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (top..bottom).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    fn png_data_url(img: GrayImage) -> String {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buffer.into_inner())
        )
    }

    #[test]
    fn test_subject_above_midline_is_up() {
        assert_eq!(classify(&block_image(3, 13)), Orientation::Up);
    }

    #[test]
    fn test_subject_below_midline_is_down() {
        assert_eq!(classify(&block_image(27, 37)), Orientation::Down);
    }

    #[test]
    fn test_blank_or_centred_is_unknown() {
        assert_eq!(
            classify(&GrayImage::from_pixel(40, 40, Luma([255]))),
            Orientation::Unknown
        );
        assert_eq!(classify(&block_image(10, 30)), Orientation::Unknown);
    }

    #[test]
    fn test_data_url_round_trip_through_decoder() {
        assert_eq!(
            orientation_from_data_url(&png_data_url(block_image(3, 13))),
            Orientation::Up
        );
        assert_eq!(
            orientation_from_data_url("https://static.example.com/puzzle.png"),
            Orientation::Unknown
        );
        assert_eq!(
            orientation_from_data_url("data:image/png;base64,not-base64!"),
            Orientation::Unknown
        );
    }
}
