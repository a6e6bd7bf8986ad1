//! The three-address intermediate language consumed by the backend.

mod label_generator;
mod name_generator;
mod tac;
pub mod verify;

pub use label_generator::LabelGenerator;
pub use name_generator::NameGenerator;
pub use tac::*;
pub use verify::verify;

#[cfg(test)]
pub mod testing;
