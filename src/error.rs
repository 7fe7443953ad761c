use thiserror::Error;

use crate::expr::Rule;

#[derive(Error, Debug)]
pub enum ExprError {
    #[error("Empty expression")]
    Empty,
    #[error("Syntax error: {0}")]
    Parse(#[from] Box<pest::error::Error<Rule>>),
    #[error("Expression is {len} characters long, the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("Expression nests deeper than {max} levels")]
    TooDeep { max: usize },
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Unknown name '{0}'")]
    UnknownVariable(String),
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

/// Everything that can make a render fail. Shown verbatim in the error dialog.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{component}: {source}")]
    Component {
        component: &'static str,
        #[source]
        source: ExprError,
    },
    #[error("The field has no finite vectors to draw")]
    NoFiniteVectors,
}

impl RenderError {
    /// Tags an evaluator failure with the field component it came from.
    pub fn in_component(component: &'static str) -> impl FnOnce(ExprError) -> Self {
        move |source| RenderError::Component { component, source }
    }
}
