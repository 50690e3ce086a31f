pub mod model;

pub use model::{load_bin, read_word, write_outputs, Image, Report};
