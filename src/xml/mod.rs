//! Response documents and the processing boundary

pub mod document;
pub mod processor;

pub use document::{Document, Element, Node};
pub use processor::{ProcessError, ResponseProcessor, XmlProcessor};
