// src/frame.rs
//
// Grayscale frame handed to the flow estimator. The estimator keeps the
// previous frame alive between calls, so the frame owns its pixels.

use anyhow::{bail, Result};

/// Row-major 8-bit single-channel frame: pixel at (x, y) = data[y * width + x]
#[derive(Clone, PartialEq)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl std::fmt::Debug for GrayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrayFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl GrayFrame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    /// Uniform frame, mostly useful as a placeholder in tests
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self::new(vec![value; width * height], width, height)
    }

    /// Convert from RGB packed bytes (3 bytes per pixel)
    pub fn from_rgb(rgb: &[u8], width: usize, height: usize) -> Self {
        Self::from_packed(rgb, width, height, [0, 1, 2])
    }

    /// Convert from BGR packed bytes, the layout OpenCV decodes into
    pub fn from_bgr(bgr: &[u8], width: usize, height: usize) -> Self {
        Self::from_packed(bgr, width, height, [2, 1, 0])
    }

    fn from_packed(bytes: &[u8], width: usize, height: usize, order: [usize; 3]) -> Self {
        let mut gray = Vec::with_capacity(width * height);
        for pixel in bytes.chunks_exact(3) {
            // ITU-R BT.601 luma
            let g = 0.299 * pixel[order[0]] as f32
                + 0.587 * pixel[order[1]] as f32
                + 0.114 * pixel[order[2]] as f32;
            gray.push(g.round().min(255.0) as u8);
        }
        Self::new(gray, width, height)
    }

    pub fn ensure_valid(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("empty frame ({}x{})", self.width, self.height);
        }
        if self.data.len() != self.width * self.height {
            bail!(
                "frame buffer holds {} bytes, expected {}x{}={}",
                self.data.len(),
                self.width,
                self.height,
                self.width * self.height
            );
        }
        Ok(())
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Larger of the two dimensions; several thresholds scale with it
    pub fn scale(&self) -> usize {
        self.width.max(self.height)
    }
}

#[cfg(feature = "opencv")]
mod mat {
    use super::GrayFrame;
    use anyhow::{bail, Result};
    use opencv::{core::Mat, imgproc, prelude::*};

    impl GrayFrame {
        /// Copy an 8-bit Mat (1 or 3 channel BGR) into a grayscale frame
        pub fn from_mat(mat: &Mat) -> Result<Self> {
            let gray = match mat.channels() {
                1 => mat.try_clone()?,
                3 => {
                    let mut gray = Mat::default();
                    imgproc::cvt_color(mat, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
                    gray
                }
                n => bail!("unsupported channel count {}", n),
            };
            let gray = if gray.is_continuous() {
                gray
            } else {
                gray.try_clone()?
            };
            let data = gray.data_bytes()?.to_vec();
            Ok(Self::new(data, gray.cols() as usize, gray.rows() as usize))
        }

        /// Owned single-channel Mat view of this frame for OpenCV routines
        pub fn to_mat(&self) -> Result<Mat> {
            self.ensure_valid()?;
            let flat = Mat::from_slice(&self.data)?;
            let mat = flat.reshape(1, self.height as i32)?.try_clone()?;
            Ok(mat)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_and_rgb_agree() {
        let rgb = vec![200u8, 100, 50, 0, 0, 0];
        let bgr = vec![50u8, 100, 200, 0, 0, 0];
        let a = GrayFrame::from_rgb(&rgb, 2, 1);
        let b = GrayFrame::from_bgr(&bgr, 2, 1);
        assert_eq!(a.data, b.data);
        assert_eq!(a.pixel(1, 0), 0);
    }

    #[test]
    fn test_ensure_valid_rejects_mismatch() {
        let frame = GrayFrame {
            data: vec![0; 10],
            width: 4,
            height: 4,
        };
        assert!(frame.ensure_valid().is_err());
        assert!(GrayFrame::filled(4, 4, 0).ensure_valid().is_ok());
    }
}
