//! JSON-lines annotation file parsing.

use crate::{common::*, record::AnnotationRecord};

/// One line of the annotation file.
#[derive(Debug, Clone, Deserialize)]
struct AnnotationLine {
    image_path: String,
    bounding_box_annotations: Vec<BoxAnnotation>,
}

/// One bounding box of an annotation line, normalized to `[0, 1]`.
#[derive(Debug, Clone, Deserialize)]
struct BoxAnnotation {
    annotation_label: String,
    y_min_normalized: f64,
    x_min_normalized: f64,
    y_max_normalized: f64,
    x_max_normalized: f64,
}

/// Index-aligned image paths, label names and boxes of an annotation file.
///
/// The i-th label list and the i-th box list belong to the i-th image path.
/// Boxes are stored as `[y_min, x_min, y_max, x_max]` in ratio units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub image_paths: Vec<PathBuf>,
    pub labels: Vec<Vec<String>>,
    pub boxes: Vec<Vec<[f64; 4]>>,
}

impl Annotations {
    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    pub fn from_records(records: Vec<AnnotationRecord>) -> Self {
        let (image_paths, labels, boxes) = records
            .into_iter()
            .map(|record| {
                let AnnotationRecord {
                    image_path,
                    labels,
                    boxes,
                } = record;
                (image_path, labels, boxes)
            })
            .unzip_n_vec();

        Self {
            image_paths,
            labels,
            boxes,
        }
    }

    /// Zip the parallel sequences into one record per image.
    pub fn into_records(self) -> Result<Vec<AnnotationRecord>> {
        let Self {
            image_paths,
            labels,
            boxes,
        } = self;
        ensure!(
            image_paths.len() == labels.len() && labels.len() == boxes.len(),
            "annotation sequences are not aligned: {} paths, {} label lists, {} box lists",
            image_paths.len(),
            labels.len(),
            boxes.len()
        );

        izip!(image_paths, labels, boxes)
            .map(|(image_path, labels, boxes)| -> Result<_> {
                ensure!(
                    labels.len() == boxes.len(),
                    "'{}' has {} labels but {} boxes",
                    image_path.display(),
                    labels.len(),
                    boxes.len()
                );
                Ok(AnnotationRecord {
                    image_path,
                    labels,
                    boxes,
                })
            })
            .try_collect()
    }
}

/// Load a JSON-lines annotation file, keeping only annotations whose label
/// belongs to `vocabulary`.
pub fn load_annotations(path: impl AsRef<Path>, vocabulary: &Vocabulary) -> Result<Annotations> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open annotation file '{}'", path.display()))?;
    let annotations = parse_annotations(BufReader::new(file), vocabulary)
        .with_context(|| format!("failed to parse annotation file '{}'", path.display()))?;
    info!(
        "loaded {} annotated images from '{}'",
        annotations.len(),
        path.display()
    );
    Ok(annotations)
}

/// Parse JSON-lines annotations from a reader.
///
/// Every non-blank line yields exactly one entry, even if none of its
/// annotations survives the vocabulary filter. A line that cannot be decoded
/// aborts the whole parse.
pub fn parse_annotations<R>(reader: R, vocabulary: &Vocabulary) -> Result<Annotations>
where
    R: BufRead,
{
    let mut num_dropped = 0;

    let records: Vec<_> = reader
        .lines()
        .enumerate()
        .map(|(index, line)| -> Result<_> {
            let line_no = index + 1;
            let line = line.with_context(|| format!("failed to read line {}", line_no))?;
            if line.trim().is_empty() {
                return Ok(None);
            }

            let AnnotationLine {
                image_path,
                bounding_box_annotations,
            } = serde_json::from_str(&line)
                .with_context(|| format!("malformed annotation at line {}", line_no))?;

            let (labels, boxes): (Vec<_>, Vec<_>) = bounding_box_annotations
                .into_iter()
                .filter(|annotation| {
                    let keep = vocabulary.contains(&annotation.annotation_label);
                    if !keep {
                        num_dropped += 1;
                    }
                    keep
                })
                .map(|annotation| {
                    let BoxAnnotation {
                        annotation_label,
                        y_min_normalized,
                        x_min_normalized,
                        y_max_normalized,
                        x_max_normalized,
                    } = annotation;
                    let coords = [
                        y_min_normalized,
                        x_min_normalized,
                        y_max_normalized,
                        x_max_normalized,
                    ];
                    (annotation_label, coords)
                })
                .unzip();

            Ok(Some(AnnotationRecord {
                image_path: PathBuf::from(image_path),
                labels,
                boxes,
            }))
        })
        .filter_map(|result| result.transpose())
        .try_collect()?;

    if num_dropped > 0 {
        debug!(
            "dropped {} annotations with labels outside of the vocabulary",
            num_dropped
        );
    }

    Ok(Annotations::from_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write as _};

    fn vocabulary() -> Vocabulary {
        Vocabulary::new(["orange_triangle", "blue_star"]).unwrap()
    }

    const TWO_IMAGES: &str = r#"{"image_path": "a.jpg", "bounding_box_annotations": [{"annotation_label": "blue_star", "y_min_normalized": 0.1, "x_min_normalized": 0.2, "y_max_normalized": 0.3, "x_max_normalized": 0.4}, {"annotation_label": "red_circle", "y_min_normalized": 0.5, "x_min_normalized": 0.5, "y_max_normalized": 0.6, "x_max_normalized": 0.6}]}
{"image_path": "b.jpg", "bounding_box_annotations": []}
"#;

    #[test]
    fn parse_filters_labels_and_keeps_alignment() {
        let annotations = parse_annotations(Cursor::new(TWO_IMAGES), &vocabulary()).unwrap();

        assert_eq!(
            annotations.image_paths,
            vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")]
        );
        assert_eq!(
            annotations.labels,
            vec![vec!["blue_star".to_string()], vec![]]
        );
        assert_eq!(annotations.boxes, vec![vec![[0.1, 0.2, 0.3, 0.4]], vec![]]);
    }

    #[test]
    fn parse_is_deterministic() {
        let lhs = parse_annotations(Cursor::new(TWO_IMAGES), &vocabulary()).unwrap();
        let rhs = parse_annotations(Cursor::new(TWO_IMAGES), &vocabulary()).unwrap();
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn parse_rejects_malformed_line() {
        let text = format!("{}not json\n", TWO_IMAGES);
        let err = parse_annotations(Cursor::new(text), &vocabulary()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn parse_rejects_missing_keys() {
        let text = r#"{"image_path": "a.jpg", "bounding_box_annotations": [{"annotation_label": "blue_star", "y_min_normalized": 0.1}]}"#;
        assert!(parse_annotations(Cursor::new(text), &vocabulary()).is_err());

        let text = r#"{"bounding_box_annotations": []}"#;
        assert!(parse_annotations(Cursor::new(text), &vocabulary()).is_err());
    }

    #[test]
    fn parse_empty_input() {
        let annotations = parse_annotations(Cursor::new(""), &vocabulary()).unwrap();
        assert!(annotations.is_empty());
        assert!(annotations.into_records().unwrap().is_empty());
    }

    #[test]
    fn parse_skips_blank_lines() {
        let text = format!("\n{}\n\n", TWO_IMAGES);
        let annotations = parse_annotations(Cursor::new(text), &vocabulary()).unwrap();
        assert_eq!(annotations.len(), 2);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_IMAGES.as_bytes()).unwrap();
        file.flush().unwrap();

        let annotations = load_annotations(file.path(), &vocabulary()).unwrap();
        let records = annotations.into_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].labels, vec!["blue_star".to_string()]);
        assert!(records[1].boxes.is_empty());
    }

    #[test]
    fn load_missing_file() {
        assert!(load_annotations("/nonexistent/annotations.jsonl", &vocabulary()).is_err());
    }

    #[test]
    fn records_round_trip_through_columns() {
        let annotations = parse_annotations(Cursor::new(TWO_IMAGES), &vocabulary()).unwrap();
        let records = annotations.clone().into_records().unwrap();
        assert_eq!(Annotations::from_records(records), annotations);
    }

    #[test]
    fn misaligned_columns_are_rejected() {
        let annotations = Annotations {
            image_paths: vec![PathBuf::from("a.jpg")],
            labels: vec![vec!["blue_star".into()]],
            boxes: vec![vec![]],
        };
        assert!(annotations.into_records().is_err());
    }
}
