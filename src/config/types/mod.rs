//! Configuration utility types.
//!
//! | Module  | Purpose                              |
//! |---------|--------------------------------------|
//! | `error` | `ConfigError` and validation problems  |
//! | `field` | Dotted field paths for messages      |

mod error;
mod field;

pub use error::{ConfigError, Problem, Problems};
pub use field::FieldPath;
