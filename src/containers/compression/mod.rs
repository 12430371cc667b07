pub mod inflate;

pub use inflate::{inflate, inflate_to_writer, InflateError};
