pub mod app;
pub mod colormap;
pub mod config;
pub mod error;
pub mod expr;
pub mod field;
pub mod mesh;
pub mod render;

pub use error::{ExprError, RenderError};
pub use field::{Field, FieldExpressions};
pub use mesh::{Grid, Mode};
pub use render::{FieldRenderer, Surface};
