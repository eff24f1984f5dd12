use crate::domain::errors::{ConfigError, EstimationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an outcome class within its alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(pub u8);

impl Label {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed, ordered set of outcome classes of one domain.
///
/// Binary domains use `["0", "1"]` where label 1 is the favorable class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct OutcomeAlphabet {
    classes: Vec<String>,
}

impl OutcomeAlphabet {
    pub fn new<S: Into<String>>(classes: impl IntoIterator<Item = S>) -> Result<Self, ConfigError> {
        let classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        if classes.len() < 2 {
            return Err(ConfigError::invalid(
                "alphabet",
                format!("need at least 2 classes, got {}", classes.len()),
            ));
        }
        if classes.len() > u8::MAX as usize {
            return Err(ConfigError::invalid("alphabet", "too many classes"));
        }
        for (i, name) in classes.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("alphabet", "empty class name"));
            }
            if classes[..i].contains(name) {
                return Err(ConfigError::invalid(
                    "alphabet",
                    format!("duplicate class '{}'", name),
                ));
            }
        }
        Ok(Self { classes })
    }

    /// `{0, 1}` alphabet for up/down, win/no-win domains
    pub fn binary() -> Self {
        Self {
            classes: vec!["0".to_string(), "1".to_string()],
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn is_binary(&self) -> bool {
        self.classes.len() == 2
    }

    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        (0..self.classes.len()).map(|i| Label(i as u8))
    }

    pub fn name(&self, label: Label) -> &str {
        self.classes
            .get(label.index())
            .map(String::as_str)
            .unwrap_or("?")
    }

    pub fn label_of(&self, name: &str) -> Option<Label> {
        self.classes
            .iter()
            .position(|c| c == name)
            .map(|i| Label(i as u8))
    }

    /// Like `label_of`, but an unknown name is a caller error
    pub fn resolve(&self, name: &str) -> Result<Label, EstimationError> {
        self.label_of(name)
            .ok_or_else(|| EstimationError::UnknownOutcome {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, label: Label) -> bool {
        label.index() < self.classes.len()
    }

    pub fn uniform_prior(&self) -> f64 {
        1.0 / self.classes.len() as f64
    }

    /// Favorable class: label 1 for binary alphabets
    pub fn favorable(&self) -> Option<Label> {
        self.is_binary().then_some(Label(1))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

impl TryFrom<Vec<String>> for OutcomeAlphabet {
    type Error = ConfigError;

    fn try_from(classes: Vec<String>) -> Result<Self, Self::Error> {
        OutcomeAlphabet::new(classes)
    }
}

impl From<OutcomeAlphabet> for Vec<String> {
    fn from(alphabet: OutcomeAlphabet) -> Self {
        alphabet.classes
    }
}
