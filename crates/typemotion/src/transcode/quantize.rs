//! Per-frame palette quantization.
//!
//! Frames with few distinct colors keep them exactly; everything else goes
//! through NeuQuant, the same quantizer the `gif` crate uses internally.
//! Alpha is ignored: sampled video frames are opaque.

use crate::error::{TranscodeError, TranscodeResult};
use color_quant::NeuQuant;
use std::collections::HashMap;

/// A frame reduced to palette indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFrame {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// One palette index per pixel, row-major
    pub indices: Vec<u8>,
    /// Palette as packed RGB triplets
    pub palette: Vec<u8>,
}

impl IndexedFrame {
    /// Number of palette entries
    #[must_use]
    pub fn palette_len(&self) -> usize {
        self.palette.len() / 3
    }

    /// RGB color of palette entry `index`
    #[must_use]
    pub fn color(&self, index: u8) -> Option<[u8; 3]> {
        let start = usize::from(index) * 3;
        self.palette
            .get(start..start + 3)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
    }
}

/// Quantize one RGBA frame to at most `max_colors` colors.
///
/// `sample_factor` is handed to NeuQuant (1 = slowest/best, 30 = fastest).
pub fn quantize_frame(
    rgba: &[u8],
    width: u16,
    height: u16,
    max_colors: usize,
    sample_factor: i32,
) -> TranscodeResult<IndexedFrame> {
    let pixel_count = usize::from(width) * usize::from(height);
    if pixel_count == 0 {
        return Err(TranscodeError::encode("frame has no pixels"));
    }
    if rgba.len() != pixel_count * 4 {
        return Err(TranscodeError::encode(format!(
            "frame buffer is {} bytes, expected {} for {width}x{height} RGBA",
            rgba.len(),
            pixel_count * 4
        )));
    }
    if !(2..=256).contains(&max_colors) {
        return Err(TranscodeError::encode(format!(
            "palette bound {max_colors} outside 2..=256"
        )));
    }

    let (indices, palette) = match exact_palette(rgba, max_colors) {
        Some(exact) => exact,
        None => neuquant_palette(rgba, max_colors, sample_factor),
    };

    Ok(IndexedFrame {
        width,
        height,
        indices,
        palette,
    })
}

/// Index every pixel against its own distinct colors, or `None` if there are
/// more than `max_colors` of them.
fn exact_palette(rgba: &[u8], max_colors: usize) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut lookup: HashMap<[u8; 3], u8> = HashMap::new();
    let mut palette = Vec::new();
    let mut indices = Vec::with_capacity(rgba.len() / 4);

    for pixel in rgba.chunks_exact(4) {
        let rgb = [pixel[0], pixel[1], pixel[2]];
        let index = match lookup.get(&rgb) {
            Some(&index) => index,
            None => {
                if lookup.len() == max_colors {
                    return None;
                }
                let index = lookup.len() as u8;
                lookup.insert(rgb, index);
                palette.extend_from_slice(&rgb);
                index
            }
        };
        indices.push(index);
    }

    Some((indices, palette))
}

fn neuquant_palette(rgba: &[u8], max_colors: usize, sample_factor: i32) -> (Vec<u8>, Vec<u8>) {
    let opaque: Vec<u8> = rgba
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2], 255])
        .collect();

    let quantizer = NeuQuant::new(sample_factor.clamp(1, 30), max_colors, &opaque);
    let indices = opaque
        .chunks_exact(4)
        .map(|pixel| quantizer.index_of(pixel) as u8)
        .collect();

    (indices, quantizer.color_map_rgb())
}
