use crate::{
    config::{LabelsConfig, Validatable},
    error::DetectionError,
};
use image::Rgb;
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

pub const DEFAULT_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabel {
    pub name: String,
    pub color: Rgb<u8>,
}

impl ClassLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: DEFAULT_BOX_COLOR,
        }
    }
}

/// Class index to name mapping, owned by whoever runs the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassLabels {
    labels: Vec<ClassLabel>,
}

impl ClassLabels {
    pub fn new(labels: Vec<ClassLabel>) -> Self {
        Self { labels }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(ClassLabel::new).collect())
    }

    pub fn load(labels_cfg: &LabelsConfig) -> Result<Self, DetectionError> {
        labels_cfg.validate()?;
        let labels = load_labels(&labels_cfg.get_path())?;
        tracing::info!(
            "Loaded {} class labels from {:?}",
            labels.len(),
            labels_cfg.get_path()
        );
        Ok(labels)
    }

    pub fn get(&self, class_id: usize) -> Option<&ClassLabel> {
        self.labels.get(class_id)
    }

    pub fn name(&self, class_id: usize) -> String {
        match self.get(class_id) {
            Some(label) => label.name.clone(),
            None => format!("Unknown class {}", class_id),
        }
    }

    /// Box colour for a label name, green when the name is not in the mapping.
    pub fn color_of(&self, name: &str) -> Rgb<u8> {
        self.labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.color)
            .unwrap_or(DEFAULT_BOX_COLOR)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Reads one class per line: either `name` or `name,r,g,b`. Blank lines are skipped.
pub fn load_labels(filepath: &Path) -> Result<ClassLabels, DetectionError> {
    let file = File::open(filepath)?;
    parse_labels(io::BufReader::new(file))
}

pub fn parse_labels(reader: impl BufRead) -> Result<ClassLabels, DetectionError> {
    let mut labels = Vec::new();

    for (index, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let invalid = || DetectionError::InvalidLabelLine {
            line: index + 1,
            content: line.clone(),
        };
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();

        let label = match parts.as_slice() {
            [name] if !name.is_empty() => ClassLabel::new(*name),
            [name, red, green, blue] if !name.is_empty() => {
                let channel = |value: &str| value.parse::<u8>().map_err(|_| invalid());
                ClassLabel {
                    name: name.to_string(),
                    color: Rgb([channel(*red)?, channel(*green)?, channel(*blue)?]),
                }
            }
            _ => return Err(invalid()),
        };
        labels.push(label);
    }

    Ok(ClassLabels::new(labels))
}
