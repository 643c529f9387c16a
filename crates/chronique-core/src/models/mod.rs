mod author;
mod book;
mod critic;
mod mention;
mod merge;
mod resolution;

pub use author::*;
pub use book::*;
pub use critic::*;
pub use mention::*;
pub use merge::*;
pub use resolution::*;
