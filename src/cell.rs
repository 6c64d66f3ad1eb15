use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value stored in a cell or cached as a formula result.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Scalar {
    pub fn text(value: impl Into<String>) -> Self {
        Scalar::Text(value.into())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => f.write_str(&format_number(*n)),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One run of a rich-text cell. Formatting is not carried.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        TextRun { text: text.into() }
    }
}

/// A native spreadsheet cell.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Literal(Scalar),
    Formula {
        expression: String,
        cached: Option<Scalar>,
    },
    RichText(Vec<TextRun>),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Literal(Scalar::Text(value.into()))
    }

    pub fn number(value: f64) -> Self {
        Cell::Literal(Scalar::Number(value))
    }

    pub fn boolean(value: bool) -> Self {
        Cell::Literal(Scalar::Bool(value))
    }

    pub fn formula(expression: impl Into<String>, cached: Option<Scalar>) -> Self {
        Cell::Formula {
            expression: expression.into(),
            cached,
        }
    }

    /// Display string of the cell. Formula cells yield their cached result,
    /// never the expression.
    pub fn extract(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Literal(value) => value.to_string(),
            Cell::Formula { cached, .. } => cached
                .as_ref()
                .map(|value| value.to_string())
                .unwrap_or_default(),
            Cell::RichText(runs) => runs.iter().map(|run| run.text.as_str()).collect(),
        }
    }

    /// True when the cell displays nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.extract().trim().is_empty()
    }
}

pub fn extract(cell: &Cell) -> String {
    cell.extract()
}

/// Integral values print without a fractional part (`3`, not `3.0`).
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
