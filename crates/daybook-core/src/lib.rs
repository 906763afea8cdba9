pub mod app;
pub mod cli;
pub mod color;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod filter;
pub mod render;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting daybook"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let data_dir =
    cfg.data_dir(cli.data.as_deref())
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage =
    datastore::FileStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;
  let mut app =
    app::AppState::load(storage)?;

  let zone = datetime::resolve_zone(
    cfg.timezone.as_deref(),
    &data_dir
  );

  let mut renderer =
    render::Renderer::new(&cfg);

  commands::dispatch(
    &mut app,
    &cfg,
    &mut renderer,
    zone,
    cli.command
  )?;

  info!("done");
  Ok(())
}
