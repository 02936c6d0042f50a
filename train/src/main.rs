use anyhow::{Context, Result};
use clap::{Arg, Command};
use pilot_config::cli::{args, groups, parse_config};
use pilot_dataset::read_data;
use pilot_train::{prepare_run_dir, run::LOG_FILE, train_model, write_config};
use std::{
  fs::File,
  io::{self, Write},
  path::Path,
  time::Instant,
};

/// Duplicates log records to stderr and the run's log file.
struct Tee {
  file: File,
}

impl Write for Tee {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    io::stderr().write_all(buf)?;
    self.file.write_all(buf)?;
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    io::stderr().flush()?;
    self.file.flush()
  }
}

fn init_logger(log_file: Option<&Path>) -> Result<()> {
  let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
  let mut builder = env_logger::Builder::from_env(env);
  if let Some(path) = log_file {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
  }
  builder.try_init()?;
  Ok(())
}

fn main() -> Result<()> {
  let matches = Command::new(clap::crate_name!())
    .version(clap::crate_version!())
    .about(clap::crate_description!())
    .arg(
      Arg::new("model-name")
        .help("Name of the run directory under the models root")
        .required(true)
        .num_args(1),
    )
    .groups(groups())
    .args(&args())
    .get_matches();
  let name = matches.get_one::<String>("model-name").cloned().unwrap();

  // Configuration errors are reported before anything is created on disk.
  let config = match parse_config(&matches) {
    Ok(config) => config,
    Err(e) => {
      init_logger(None)?;
      log::error!("{e}");
      return Err(e.into());
    }
  };

  let dir = match prepare_run_dir(&config, &name) {
    Ok(dir) => dir,
    Err(e) => {
      init_logger(None)?;
      log::error!("{e}");
      return Err(e.into());
    }
  };
  init_logger(Some(&dir.join(LOG_FILE)))?;
  log::info!("Run directory is {}", dir.display());

  let start = Instant::now();
  let result = write_config(&dir, &config)
    .and_then(|()| read_data(&config).map_err(Into::into))
    .and_then(|(train, test)| train_model(&config, &dir, &train, &test));
  match result {
    Ok(history) => {
      if let Some(last) = history.last() {
        log::info!("Final train loss {:.6}", last.train_loss);
      }
      log::info!(
        "Training took {:.2} minutes",
        start.elapsed().as_secs_f64() / 60.0
      );
      Ok(())
    }
    Err(e) if e.is_divergence() => {
      log::error!("Optimization is unstable: {e}");
      Err(e.into())
    }
    Err(e) => {
      log::error!("{e}");
      Err(e.into())
    }
  }
}
