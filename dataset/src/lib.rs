pub mod error;
pub mod examples;
pub mod file;
pub mod loader;

pub use error::DatasetError;
pub use examples::Examples;
pub use file::{DatasetFile, Layout};
pub use loader::{Source, SourceData, load_real, load_sim, read_data};
