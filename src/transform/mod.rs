//! Action registry and typed transform requests.
//!
//! Actions form a closed set ([`Action`]). Callers name them with free-form
//! strings, which the [`TransformRegistry`] resolves case-insensitively; any
//! name outside the set is [`EngineError::UnknownAction`]. Parameters arrive as
//! a flat string map ([`ActionParams`]) and are validated into a
//! [`Transform`], which the executors match on exhaustively.
//!
//! | action | params | produces |
//! |---|---|---|
//! | `crop` | `width`, `height` | new Generation |
//! | `flip` | `axis` (0 = vertical, 1 = horizontal) | new Generation |
//! | `rotate` | `angle` (degrees, counter-clockwise) | new Generation |
//! | `blur` | `mode` (`mean`, `median`, `gaussian`) | new Generation |
//! | `detect` | none | [`DetectedInfo`](crate::models::DetectedInfo) on the source Image |

pub mod executors;

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

pub use executors::{TransformOutput, execute};

/// Largest output a `crop` may ask for, in pixels (8192 x 8192).
pub const MAX_CROP_PIXELS: u64 = 8192 * 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Crop,
    Flip,
    Rotate,
    Blur,
    Detect,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Crop,
        Action::Flip,
        Action::Rotate,
        Action::Blur,
        Action::Detect,
    ];

    /// Lowercase name used in requests and blob paths.
    pub fn name(self) -> &'static str {
        match self {
            Action::Crop => "crop",
            Action::Flip => "flip",
            Action::Rotate => "rotate",
            Action::Blur => "blur",
            Action::Detect => "detect",
        }
    }

    /// Capitalized label, used to name elevated images (`Crop_7`).
    pub fn label(self) -> &'static str {
        match self {
            Action::Crop => "Crop",
            Action::Flip => "Flip",
            Action::Rotate => "Rotate",
            Action::Blur => "Blur",
            Action::Detect => "Detect",
        }
    }

    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            Action::Crop => &["width", "height"],
            Action::Flip => &["axis"],
            Action::Rotate => &["angle"],
            Action::Blur => &["mode"],
            Action::Detect => &[],
        }
    }

    /// Whether the action yields pixels (and so a Generation) rather than metadata.
    pub fn produces_image(self) -> bool {
        !matches!(self, Action::Detect)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_uppercase())
    }
}

/// Case-insensitive lookup from request names to [`Action`]s.
///
/// Built once when the engine starts.
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    actions: HashMap<&'static str, Action>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self {
            actions: Action::ALL.iter().map(|a| (a.name(), *a)).collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Action> {
        self.actions
            .get(name.trim().to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| EngineError::UnknownAction(name.to_string()))
    }

    /// Look up the action and validate its parameters in one step.
    pub fn resolve(&self, name: &str, params: &ActionParams) -> Result<Transform> {
        let action = self.lookup(name)?;
        Transform::from_params(action, params)
    }

    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL.iter().copied().filter(|a| self.actions.contains_key(a.name()))
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat key-value parameters for an action. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionParams(BTreeMap<String, String>);

impl ActionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    /// Parse a `key=value` pair, as given on the command line.
    pub fn parse_pair(pair: &str) -> Result<(String, String)> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| EngineError::invalid(pair, "expected key=value"))?;
        Ok((key.trim().to_string(), value.trim().to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| EngineError::invalid(key, "This field is required."))
    }

    fn int(&self, key: &str) -> Result<i64> {
        let raw = self.required(key)?;
        raw.parse::<i64>()
            .map_err(|_| EngineError::invalid(key, format!("A valid integer is required, got {raw:?}.")))
    }

    fn positive(&self, key: &str) -> Result<u32> {
        let value = self.int(key)?;
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| EngineError::invalid(key, format!("must be a positive integer, got {value}")))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for ActionParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    /// Upside down (axis 0, rows reversed).
    Vertical,
    /// Mirror image (axis 1, columns reversed).
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurMode {
    Mean,
    Median,
    Gaussian,
}

impl FromStr for BlurMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "gaussian" => Ok(Self::Gaussian),
            other => Err(EngineError::invalid(
                "mode",
                format!("The value {other:?} is not a valid mode."),
            )),
        }
    }
}

/// A fully validated transform request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Stretch to exactly `width` x `height`.
    Crop { width: u32, height: u32 },
    Flip(FlipAxis),
    /// Counter-clockwise, about the center, on a same-size canvas.
    Rotate { angle: i32 },
    Blur(BlurMode),
    Detect,
}

impl Transform {
    pub fn from_params(action: Action, params: &ActionParams) -> Result<Self> {
        match action {
            Action::Crop => {
                let width = params.positive("width")?;
                let height = params.positive("height")?;
                if u64::from(width) * u64::from(height) > MAX_CROP_PIXELS {
                    return Err(EngineError::invalid(
                        "width",
                        format!("{width}x{height} exceeds {MAX_CROP_PIXELS} pixels"),
                    ));
                }
                Ok(Transform::Crop { width, height })
            }
            Action::Flip => match params.int("axis")? {
                0 => Ok(Transform::Flip(FlipAxis::Vertical)),
                1 => Ok(Transform::Flip(FlipAxis::Horizontal)),
                other => Err(EngineError::invalid(
                    "axis",
                    format!("must be 0 (vertical) or 1 (horizontal), got {other}"),
                )),
            },
            Action::Rotate => {
                let angle = params.int("angle")?;
                let angle = i32::try_from(angle)
                    .map_err(|_| EngineError::invalid("angle", "out of range"))?;
                Ok(Transform::Rotate { angle })
            }
            Action::Blur => Ok(Transform::Blur(params.required("mode")?.parse()?)),
            Action::Detect => Ok(Transform::Detect),
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Transform::Crop { .. } => Action::Crop,
            Transform::Flip(_) => Action::Flip,
            Transform::Rotate { .. } => Action::Rotate,
            Transform::Blur(_) => Action::Blur,
            Transform::Detect => Action::Detect,
        }
    }
}
