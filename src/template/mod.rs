//! Template sources: the built-in catalog, uploaded images and third-party
//! catalog records.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{BoxBounds, SurfaceSize};
use crate::loader::{FetchMode, ImageFetcher};

/// Assumed native size for catalog records that do not report dimensions.
pub const DEFAULT_CATALOG_SIZE: SurfaceSize = SurfaceSize::new(600, 600);
const BOX_MARGIN_RATIO: f64 = 0.04;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBoxSpec {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub default_text: String,
}

impl TextBoxSpec {
    pub fn new(bounds: BoxBounds, default_text: impl Into<String>) -> Self {
        Self {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            default_text: default_text.into(),
        }
    }

    pub const fn bounds(&self) -> BoxBounds {
        BoxBounds::new(self.x, self.y, self.width, self.height)
    }
}

/// A base image plus its default text box placements, in native bitmap space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub source_url: String,
    pub text_boxes: Vec<TextBoxSpec>,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("uploaded file is not a readable image: {0}")]
    UnreadableUpload(#[source] image::ImageError),
    #[error("uploaded image has an unsupported format")]
    UnknownFormat,
    #[error("catalog fetch failed for {url}: {reason}")]
    CatalogFetch { url: String, reason: String },
    #[error("catalog response from {url} is not valid json: {source}")]
    CatalogParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Record shape returned by third-party template catalog APIs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    /// URL of the blank template image.
    pub blank: String,
    /// Number of text lines the template expects.
    pub lines: u32,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl Template {
    /// Builds a template from an uploaded image, embedding it as a data URL.
    pub fn from_upload(name: impl Into<String>, bytes: &[u8]) -> Result<Self, TemplateError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|err| TemplateError::UnreadableUpload(image::ImageError::IoError(err)))?;
        let format = reader.format().ok_or(TemplateError::UnknownFormat)?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(TemplateError::UnreadableUpload)?;
        let mime = format.to_mime_type();
        let data_url = format!(
            "data:{mime};base64,{}",
            general_purpose::STANDARD.encode(bytes)
        );
        let name = name.into();
        let id = format!("upload-{}", slug(&name));
        tracing::debug!(%id, width, height, mime, "template created from upload");

        Ok(Self {
            id,
            name,
            source_url: data_url,
            text_boxes: top_bottom_boxes(SurfaceSize::new(width, height)),
        })
    }

    /// Maps a third-party catalog record into a template, spreading `lines`
    /// boxes evenly from top to bottom.
    pub fn from_catalog_record(record: &CatalogRecord) -> Self {
        let size = match (record.width, record.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => {
                SurfaceSize::new(width, height)
            }
            _ => DEFAULT_CATALOG_SIZE,
        };
        let text_boxes = match record.lines {
            0 => Vec::new(),
            2 => top_bottom_boxes(size),
            lines => evenly_spaced_boxes(size, lines),
        };
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            source_url: record.blank.clone(),
            text_boxes,
        }
    }
}

/// Downloads a catalog (a json array of [`CatalogRecord`]) and maps it into templates.
pub fn fetch_catalog<F: ImageFetcher + ?Sized>(
    fetcher: &F,
    url: &str,
) -> Result<Vec<Template>, TemplateError> {
    let bytes = fetcher
        .fetch(url, FetchMode::Anonymous)
        .map_err(|err| TemplateError::CatalogFetch {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
    let records: Vec<CatalogRecord> =
        serde_json::from_slice(&bytes).map_err(|source| TemplateError::CatalogParse {
            url: url.to_string(),
            source,
        })?;
    tracing::info!(url, count = records.len(), "fetched template catalog");
    Ok(records.iter().map(Template::from_catalog_record).collect())
}

/// Templates shipped with the engine.
pub fn builtin_catalog() -> Vec<Template> {
    let classic = |id: &str, name: &str, url: &str, size: SurfaceSize| Template {
        id: id.to_string(),
        name: name.to_string(),
        source_url: url.to_string(),
        text_boxes: top_bottom_boxes(size),
    };
    vec![
        classic(
            "one-does-not-simply",
            "One Does Not Simply",
            "https://i.imgflip.com/1bij.jpg",
            SurfaceSize::new(568, 335),
        ),
        classic(
            "success-kid",
            "Success Kid",
            "https://i.imgflip.com/1bhk.jpg",
            SurfaceSize::new(500, 500),
        ),
        Template {
            id: "drake".to_string(),
            name: "Drake Hotline Bling".to_string(),
            source_url: "https://i.imgflip.com/30b1gx.jpg".to_string(),
            text_boxes: vec![
                TextBoxSpec::new(BoxBounds::new(600, 20, 580, 560), "Top text"),
                TextBoxSpec::new(BoxBounds::new(600, 620, 580, 560), "Bottom text"),
            ],
        },
    ]
}

fn top_bottom_boxes(size: SurfaceSize) -> Vec<TextBoxSpec> {
    let margin = (f64::from(size.width.min(size.height)) * BOX_MARGIN_RATIO).round() as u32;
    let width = size.width.saturating_sub(margin * 2).max(1);
    let height = (size.height / 4).max(1);
    let margin_i32 = i32::try_from(margin).unwrap_or(0);
    let bottom_y = size
        .height_i32()
        .saturating_sub(i32::try_from(height).unwrap_or(0))
        .saturating_sub(margin_i32)
        .max(0);
    vec![
        TextBoxSpec::new(
            BoxBounds::new(margin_i32, margin_i32, width, height),
            "Top text",
        ),
        TextBoxSpec::new(
            BoxBounds::new(margin_i32, bottom_y, width, height),
            "Bottom text",
        ),
    ]
}

fn evenly_spaced_boxes(size: SurfaceSize, lines: u32) -> Vec<TextBoxSpec> {
    let slot_height = (size.height / lines).max(1);
    let margin = (f64::from(size.width) * BOX_MARGIN_RATIO).round() as u32;
    let width = size.width.saturating_sub(margin * 2).max(1);
    (0..lines)
        .map(|index| {
            let y = i32::try_from(index * slot_height).unwrap_or(i32::MAX);
            TextBoxSpec::new(
                BoxBounds::new(i32::try_from(margin).unwrap_or(0), y, width, slot_height),
                format!("Text {}", index + 1),
            )
        })
        .collect()
}

fn slug(name: &str) -> String {
    let slug = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FetchError;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn upload_becomes_data_url_template_with_native_sized_boxes() {
        let template = Template::from_upload("My Cat!", &png_bytes(400, 200)).unwrap();
        assert_eq!(template.id, "upload-my-cat");
        assert!(template.source_url.starts_with("data:image/png;base64,"));
        assert_eq!(template.text_boxes.len(), 2);
        let bottom = template.text_boxes[1].bounds();
        assert!(bottom.bottom() <= 200);
        assert!(bottom.right() <= 400);
    }

    #[test]
    fn upload_rejects_non_images() {
        let err = Template::from_upload("notes", b"just some text").unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnknownFormat | TemplateError::UnreadableUpload(_)
        ));
    }

    #[test]
    fn catalog_record_with_two_lines_maps_to_top_and_bottom() {
        let record: CatalogRecord = serde_json::from_str(
            r#"{"id":"fry","name":"Futurama Fry","blank":"https://example.test/fry.png","lines":2}"#,
        )
        .unwrap();
        let template = Template::from_catalog_record(&record);
        assert_eq!(template.source_url, "https://example.test/fry.png");
        assert_eq!(template.text_boxes.len(), 2);
        assert!(template.text_boxes[0].y < template.text_boxes[1].y);
    }

    #[test]
    fn catalog_record_spreads_many_lines_evenly() {
        let record = CatalogRecord {
            id: "grid".to_string(),
            name: "Grid".to_string(),
            blank: "https://example.test/grid.png".to_string(),
            lines: 4,
            width: Some(400),
            height: Some(800),
        };
        let template = Template::from_catalog_record(&record);
        let ys = template
            .text_boxes
            .iter()
            .map(|slot| slot.y)
            .collect::<Vec<_>>();
        assert_eq!(ys, vec![0, 200, 400, 600]);
    }

    struct StaticFetcher(&'static str);

    impl ImageFetcher for StaticFetcher {
        fn fetch(&self, _url: &str, _mode: FetchMode) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    #[test]
    fn fetch_catalog_maps_every_record() {
        let fetcher = StaticFetcher(
            r#"[{"id":"a","name":"A","blank":"https://x.test/a.png","lines":1},
                {"id":"b","name":"B","blank":"https://x.test/b.png","lines":3}]"#,
        );
        let templates = fetch_catalog(&fetcher, "https://x.test/templates").unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[1].text_boxes.len(), 3);
    }

    #[test]
    fn fetch_catalog_reports_invalid_json() {
        let err = fetch_catalog(&StaticFetcher("<html>"), "https://x.test/t").unwrap_err();
        assert!(matches!(err, TemplateError::CatalogParse { .. }));
    }

    #[test]
    fn builtin_catalog_boxes_have_area() {
        for template in builtin_catalog() {
            assert!(!template.text_boxes.is_empty(), "{}", template.id);
            for slot in &template.text_boxes {
                assert!(slot.width > 0 && slot.height > 0);
            }
        }
    }
}
