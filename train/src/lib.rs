pub mod error;
pub mod run;
pub mod trainer;


pub use error::TrainError;
pub use run::{prepare_run_dir, train_model, write_config};
pub use trainer::{EpochStats, fit};
