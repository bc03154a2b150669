use crate::common::{Config, FaceAuthError, Result};
use crate::core::detector::FaceBox;
use crate::core::onnx::load_session;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

pub type Embedding = Vec<f32>;

pub struct FaceRecognizer {
    session: Session,
    _environment: Arc<Environment>,
    input_size: u32,
    normalization_mean: f32,
    normalization_std: f32,
}

impl FaceRecognizer {
    pub fn new(config: &Config, models_base: &Path) -> Result<Self> {
        let model_path = crate::common::paths::resolve_model_path(&config.models.recognizer_path, models_base);
        let (session, environment) =
            load_session("face_recognizer", &model_path, config.performance.optimization_level)?;

        Ok(Self {
            session,
            _environment: environment,
            input_size: config.recognizer.input_size,
            normalization_mean: config.recognizer.normalization_mean,
            normalization_std: config.recognizer.normalization_std,
        })
    }

    pub fn get_embedding(&self, image: &DynamicImage, face: &FaceBox) -> Result<Embedding> {
        let face_img = crop_face(image, face, 1.0);
        let resized = face_img.resize_exact(self.input_size, self.input_size, FilterType::Triangle);

        let input_array = self.preprocess_face(&resized);
        let cow_array = CowArray::from(input_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;

        let embedding = outputs
            .first()
            .ok_or_else(|| FaceAuthError::Model("Recognizer produced no outputs".into()))?
            .try_extract::<f32>()?
            .view()
            .to_owned()
            .into_raw_vec();
        Ok(embedding)
    }

    fn preprocess_face(&self, img: &DynamicImage) -> Array4<f32> {
        let rgb = img.to_rgb8();
        let size = self.input_size as usize;
        let mut array = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                array[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - self.normalization_mean) / self.normalization_std;
            }
        }

        array
    }
}

/// Crops `face` scaled by `scale` around its center, clamped to the image.
pub fn crop_face(image: &DynamicImage, face: &FaceBox, scale: f32) -> DynamicImage {
    let (img_w, img_h) = (image.width() as f32, image.height() as f32);
    let cx = (face.x1 + face.x2) / 2.0;
    let cy = (face.y1 + face.y2) / 2.0;
    let half_w = face.width().max(1.0) * scale / 2.0;
    let half_h = face.height().max(1.0) * scale / 2.0;

    let x1 = (cx - half_w).clamp(0.0, (img_w - 1.0).max(0.0));
    let y1 = (cy - half_h).clamp(0.0, (img_h - 1.0).max(0.0));
    let x2 = (cx + half_w).clamp(x1 + 1.0, img_w.max(x1 + 1.0));
    let y2 = (cy + half_h).clamp(y1 + 1.0, img_h.max(y1 + 1.0));

    image.crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_stays_inside_the_image() {
        let image = DynamicImage::new_rgb8(100, 80);
        let face = FaceBox { x1: 70.0, y1: 50.0, x2: 110.0, y2: 90.0, confidence: 0.9 };

        let crop = crop_face(&image, &face, 2.7);
        assert!(crop.width() >= 1 && crop.width() <= 100);
        assert!(crop.height() >= 1 && crop.height() <= 80);
    }

    #[test]
    fn unit_scale_crop_matches_box() {
        let image = DynamicImage::new_rgb8(200, 200);
        let face = FaceBox { x1: 20.0, y1: 40.0, x2: 80.0, y2: 120.0, confidence: 0.9 };

        let crop = crop_face(&image, &face, 1.0);
        assert_eq!((crop.width(), crop.height()), (60, 80));
    }
}
