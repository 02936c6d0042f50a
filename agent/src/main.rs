use anyhow::{Context, Result};
use clap::{Arg, Command, value_parser};
use pilot_agent::{AgentSettings, ImitationAgent};
use pilot_model_burn::{FrozenGraph, InferenceBackend, Manifest};
use pilot_protocol::Request;
use std::{
  io::{self, BufRead, BufReader, Write},
  path::PathBuf,
};

fn main() -> Result<()> {
  let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
  env_logger::Builder::from_env(env).init();

  let matches = Command::new(clap::crate_name!())
    .version(clap::crate_version!())
    .about(clap::crate_description!())
    .arg(
      Arg::new("model")
        .short('m')
        .long("model")
        .help("Directory with the frozen graph")
        .num_args(1)
        .value_parser(value_parser!(PathBuf))
        .default_value("."),
    )
    .get_matches();
  let dir = matches.get_one::<PathBuf>("model").cloned().unwrap_or_default();

  let manifest = Manifest::read(&dir).with_context(|| format!("Failed to read the manifest in {}", dir.display()))?;
  manifest.validate()?;
  log::info!(
    "Frozen {:?} network, {}x{} frames, offsets {:?}",
    manifest.architecture,
    manifest.input.height,
    manifest.input.width,
    manifest.input_offsets
  );
  let settings = AgentSettings {
    height: manifest.input.height,
    width: manifest.input.width,
    input_offsets: manifest.input_offsets.clone(),
  };
  let mut agent = ImitationAgent::new(settings, || {
    log::info!("Loading the frozen graph from {}", dir.display());
    FrozenGraph::<InferenceBackend>::load(&dir, &Default::default())
  });
  agent.init()?;

  let mut input = BufReader::new(io::stdin());
  let mut output = io::stdout();
  let mut s = String::new();
  loop {
    s.clear();
    if input.read_line(&mut s)? == 0 {
      log::info!("Input closed");
      break;
    }
    if s.trim().is_empty() {
      continue;
    }
    let request = serde_json::from_str(&s)?;

    match request {
      Request::Seed { seed } => agent.on_seed(seed),
      Request::EpisodeStart { episode_name } => agent.on_episode_start(&episode_name)?,
      Request::Observation { camera } => agent.on_observation(&camera.jpg_data)?,
      Request::GetCommands => {
        let response = agent.on_get_commands()?;
        serde_json::to_writer(&mut output, &response)?;
        writeln!(output)?;
        output.flush()?;
      }
      Request::Finish => {
        agent.finish()?;
        break;
      }
    }
  }

  Ok(())
}
