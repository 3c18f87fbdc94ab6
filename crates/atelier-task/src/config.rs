use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing a generation parameter from a string.
#[derive(Debug, thiserror::Error)]
#[error("invalid {field}: '{value}' (expected one of {expected})")]
pub struct InvalidValueError {
  pub field: &'static str,
  pub value: String,
  pub expected: &'static str,
}

/// Aspect ratio of the generated image.
///
/// Serialized as the provider's wire strings (`"1:1"`, `"16:9"`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
  #[default]
  #[serde(rename = "1:1")]
  Square,
  #[serde(rename = "3:4")]
  Portrait34,
  #[serde(rename = "4:3")]
  Landscape43,
  #[serde(rename = "9:16")]
  Portrait916,
  #[serde(rename = "16:9")]
  Landscape169,
}

impl AspectRatio {
  pub fn as_str(&self) -> &'static str {
    match self {
      AspectRatio::Square => "1:1",
      AspectRatio::Portrait34 => "3:4",
      AspectRatio::Landscape43 => "4:3",
      AspectRatio::Portrait916 => "9:16",
      AspectRatio::Landscape169 => "16:9",
    }
  }
}

impl fmt::Display for AspectRatio {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AspectRatio {
  type Err = InvalidValueError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "1:1" => Ok(AspectRatio::Square),
      "3:4" => Ok(AspectRatio::Portrait34),
      "4:3" => Ok(AspectRatio::Landscape43),
      "9:16" => Ok(AspectRatio::Portrait916),
      "16:9" => Ok(AspectRatio::Landscape169),
      other => Err(InvalidValueError {
        field: "aspect ratio",
        value: other.to_string(),
        expected: "1:1, 3:4, 4:3, 9:16, 16:9",
      }),
    }
  }
}

/// Output resolution of the generated image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
  #[serde(rename = "1K")]
  OneK,
  #[serde(rename = "2K")]
  TwoK,
  #[default]
  #[serde(rename = "4K")]
  FourK,
}

impl Resolution {
  pub fn as_str(&self) -> &'static str {
    match self {
      Resolution::OneK => "1K",
      Resolution::TwoK => "2K",
      Resolution::FourK => "4K",
    }
  }
}

impl fmt::Display for Resolution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Resolution {
  type Err = InvalidValueError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "1K" => Ok(Resolution::OneK),
      "2K" => Ok(Resolution::TwoK),
      "4K" => Ok(Resolution::FourK),
      other => Err(InvalidValueError {
        field: "resolution",
        value: other.to_string(),
        expected: "1K, 2K, 4K",
      }),
    }
  }
}

/// Encoding of the generated image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
  #[default]
  Png,
  Jpg,
}

impl OutputFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      OutputFormat::Png => "png",
      OutputFormat::Jpg => "jpg",
    }
  }
}

impl fmt::Display for OutputFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OutputFormat {
  type Err = InvalidValueError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "png" => Ok(OutputFormat::Png),
      "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
      other => Err(InvalidValueError {
        field: "output format",
        value: other.to_string(),
        expected: "png, jpg",
      }),
    }
  }
}

/// A reference image for the generation request.
///
/// URLs are passed to the provider as-is; local files must be uploaded to a
/// publicly fetchable URL before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
  Url(String),
  File(PathBuf),
}

/// Immutable snapshot of a generation request.
///
/// Captured when a task is submitted; the task keeps this snapshot for its
/// whole lifetime even if the caller's form state changes afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
  pub prompt: String,
  pub aspect_ratio: AspectRatio,
  pub resolution: Resolution,
  pub output_format: OutputFormat,
  pub image_inputs: Vec<ImageInput>,
}

impl GenerationConfig {
  /// Convenience constructor for a text-only request with default parameters.
  pub fn from_prompt(prompt: impl Into<String>) -> Self {
    Self {
      prompt: prompt.into(),
      ..Self::default()
    }
  }
}
