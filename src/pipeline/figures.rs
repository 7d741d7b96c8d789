//! Run-scoped storage for extracted images.
//!
//! docx-rs embeds pictures from PNG bytes, so every decoded image is written
//! once as a PNG into a private temporary directory and read back during
//! reassembly. The directory belongs to the [`FigureStore`] and is removed
//! when the store is dropped, whether the run succeeded or not.

use crate::content::FigureRef;
use crate::error::Pdf2DocxError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// One stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    /// 1-based figure number, as in `[FIGURE_n]`.
    pub index: usize,
    /// Page the image was found on.
    pub page: usize,
    pub path: PathBuf,
    pub width_px: u32,
    pub height_px: u32,
}

impl Figure {
    /// Height for a given display width, keeping the aspect ratio.
    pub fn scaled_height(&self, width: f32) -> f32 {
        if self.width_px == 0 {
            return width;
        }
        width * self.height_px as f32 / self.width_px as f32
    }

    pub fn read_png(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// Numbered PNG files in a temporary directory.
#[derive(Debug)]
pub struct FigureStore {
    dir: TempDir,
    figures: Vec<Figure>,
}

impl FigureStore {
    pub fn new() -> Result<Self, Pdf2DocxError> {
        let dir = tempfile::Builder::new()
            .prefix("pdf2docx-figures-")
            .tempdir()
            .map_err(|e| Pdf2DocxError::Internal(format!("figure directory: {e}")))?;
        Ok(Self {
            dir,
            figures: Vec::new(),
        })
    }

    /// Save `img` as the next figure.
    ///
    /// Nothing is numbered if the write fails, so figure numbers stay
    /// contiguous.
    pub fn insert(&mut self, page: usize, img: &DynamicImage) -> Result<FigureRef, image::ImageError> {
        let index = self.figures.len() + 1;
        let path = self.dir.path().join(format!("figure_{index:03}.png"));
        img.save_with_format(&path, image::ImageFormat::Png)?;
        debug!(
            "Saved figure {} from page {} ({}x{} px)",
            index,
            page,
            img.width(),
            img.height()
        );
        self.figures.push(Figure {
            index,
            page,
            path,
            width_px: img.width(),
            height_px: img.height(),
        });
        Ok(FigureRef(index))
    }

    pub fn get(&self, r: FigureRef) -> Option<&Figure> {
        r.0.checked_sub(1).and_then(|i| self.figures.get(i))
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Figure> {
        self.figures.iter()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
