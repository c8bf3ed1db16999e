//! PDF serialisation: composed pages + rasters → one PDF byte buffer.
//!
//! Each placement becomes one image XObject positioned in page
//! millimetres. printpdf measures from the bottom-left corner, while the
//! compositor measures from the top, so the y coordinate is flipped here
//! and nowhere else.
//!
//! Rasters are drawn at the DPI that maps their pixel width onto the
//! placement width; the height follows from the aspect ratio the
//! compositor already used.

use crate::error::ExportError;
use crate::pipeline::compose::{Document, Placement};
use crate::pipeline::stage::RasterBlock;
use image::{imageops, RgbImage, RgbaImage};
use printpdf::{
    ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument,
    PdfLayerReference, Px,
};
use std::io::BufWriter;
use tracing::debug;

const MM_PER_INCH: f32 = 25.4;

/// Serialise `document` into PDF bytes.
///
/// `rasters[i]` must be the raster of block `i`. CPU-bound: call it on the
/// blocking pool.
pub fn serialize_pdf(
    document: &Document,
    rasters: &[RasterBlock],
    title: &str,
) -> Result<Vec<u8>, ExportError> {
    if document.pages.is_empty() {
        return Err(ExportError::SerializationFailed(
            "document has no pages".into(),
        ));
    }

    let g = document.geometry;
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(g.width_mm), Mm(g.height_mm), "Layer 1");

    for page in &document.pages {
        let layer = if page.index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (p, l) = doc.add_page(
                Mm(g.width_mm),
                Mm(g.height_mm),
                format!("Page {}, Layer 1", page.index + 1),
            );
            doc.get_page(p).get_layer(l)
        };

        for placement in &page.placements {
            let raster = rasters.get(placement.block).ok_or_else(|| {
                ExportError::Internal(format!(
                    "no raster for block {} on page {}",
                    placement.block,
                    page.index + 1
                ))
            })?;
            draw_placement(&layer, placement, raster, g.height_mm)?;
        }
        debug!(
            "Serialised page {} ({} placements)",
            page.index + 1,
            page.placements.len()
        );
    }

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer)
        .map_err(|e| ExportError::SerializationFailed(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| ExportError::SerializationFailed(e.to_string()))
}

fn draw_placement(
    layer: &PdfLayerReference,
    placement: &Placement,
    raster: &RasterBlock,
    page_height_mm: f32,
) -> Result<(), ExportError> {
    let pixels = visible_rows(placement, raster)?;
    let (width, height) = pixels.dimensions();
    let dpi = width as f32 * MM_PER_INCH / placement.width_mm;

    let image = Image::from(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: pixels.into_raw(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    let placed_height_mm = height as f32 * MM_PER_INCH / dpi;
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(placement.x_mm)),
            translate_y: Some(Mm(page_height_mm - placement.y_mm - placed_height_mm)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    Ok(())
}

/// The raster rows this placement shows, flattened to RGB.
fn visible_rows(placement: &Placement, raster: &RasterBlock) -> Result<RgbImage, ExportError> {
    let image = &raster.image;
    let Some(slice) = placement.slice else {
        return Ok(to_rgb(image));
    };

    let scale = image.height() as f32 / raster.height_px.max(1) as f32;
    let top = ((slice.top_px * scale).round() as u32).min(image.height().saturating_sub(1));
    let rows = ((slice.height_px * scale).round() as u32)
        .max(1)
        .min(image.height() - top);
    if rows == 0 {
        return Err(ExportError::Internal(format!(
            "empty slice of block {}",
            placement.block
        )));
    }
    let cropped = imageops::crop_imm(image, 0, top, image.width(), rows).to_image();
    Ok(to_rgb(&cropped))
}

/// Drop alpha. Rasters are painted on an opaque white background.
fn to_rgb(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        image::Rgb([r, g, b])
    })
}
