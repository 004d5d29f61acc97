use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use time::{Date, Month, OffsetDateTime};

use crate::detection::{ClassNames, DetectionOutput, Detector, RawDetection};

pub(crate) const CLASS_NAMES: [&str; 4] =
    ["Caries", "Deep Caries", "Impacted", "Periapical Lesion"];

pub(crate) fn write_xray(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        let value = ((x * 7 + y * 3) % 256) as u8;
        image::Rgb([value, value, value])
    });
    let path = dir.join(name);
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("write test image");
    path
}

pub(crate) fn write_train_dir(root: &Path, classes: &[&str]) -> PathBuf {
    let train = root.join("train");
    for class in classes {
        fs::create_dir_all(train.join(class)).expect("create class dir");
    }
    train
}

/// 2025-03-14 09:30:05 UTC
pub(crate) fn fixed_now() -> OffsetDateTime {
    Date::from_calendar_date(2025, Month::March, 14)
        .expect("valid date")
        .with_hms(9, 30, 5)
        .expect("valid time")
        .assume_utc()
}

pub(crate) struct FakeDetector {
    boxes: Vec<(usize, [f32; 4])>,
    calls: Cell<usize>,
}

impl FakeDetector {
    pub(crate) fn new(boxes: Vec<(usize, [f32; 4])>) -> Self {
        Self {
            boxes,
            calls: Cell::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Detector for FakeDetector {
    fn detect(&self, _image_path: &Path) -> Result<DetectionOutput> {
        self.calls.set(self.calls.get() + 1);
        Ok(DetectionOutput {
            names: ClassNames::List(CLASS_NAMES.iter().map(|name| name.to_string()).collect()),
            boxes: self
                .boxes
                .iter()
                .map(|(class_id, xyxy)| RawDetection {
                    class_id: *class_id,
                    confidence: 1.0,
                    xyxy: *xyxy,
                })
                .collect(),
        })
    }
}
