//! Build execution module.
//!
//! This module runs [`BuildStep`]s in dependency order. It handles:
//! - wave-based ordering over the step DAG
//! - parallel execution of independent steps, bounded by a semaphore
//! - failure propagation and skip tracking
//! - timestamp-based up-to-date checks
//! - cancellation, which kills running tools

pub mod dag;
pub mod types;

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};

use crate::consts::PARTIAL_SUFFIX;

pub use dag::{StepDag, collect_steps};
pub use types::{
  BuildReport, BuildStep, CancelFlag, ExecuteConfig, ExecuteError, FailedDependency, StepKind, StepOutcome,
};

type Claims = Arc<Mutex<HashSet<PathBuf>>>;
type StepResult = (PathBuf, Result<StepOutcome, ExecuteError>);

/// Execute build steps.
///
/// This is the main entry point for build execution. It:
/// 1. Constructs a DAG from the steps
/// 2. Computes parallel execution waves
/// 3. Executes steps wave by wave, with parallelism within each wave
/// 4. Tracks failures and skips dependent steps
///
/// Step failures are recorded in the returned report. An `Err` is returned
/// only when the steps cannot be ordered.
pub async fn execute_steps(steps: Vec<BuildStep>, config: &ExecuteConfig) -> Result<BuildReport, ExecuteError> {
  let start = Instant::now();
  let dag = StepDag::new(steps);
  let waves = dag.waves()?;

  info!(steps = dag.len(), wave_count = waves.len(), "starting build execution");

  let mut report = BuildReport::default();
  let mut blocked: HashSet<PathBuf> = HashSet::new();
  let claims: Claims = Arc::new(Mutex::new(HashSet::new()));
  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));

  for (wave_idx, wave) in waves.iter().enumerate() {
    if config.cancel.is_cancelled() {
      let pending: Vec<PathBuf> = waves[wave_idx..]
        .iter()
        .flatten()
        .filter(|p| is_tool_step(&dag, p) && !report.skipped.contains_key(*p))
        .cloned()
        .collect();
      report.cancelled.extend(pending);
      warn!(wave = wave_idx, "build cancelled");
      break;
    }

    debug!(wave = wave_idx, steps = wave.len(), "executing wave");

    let mut ready = Vec::new();
    for path in wave {
      let failed_dep = dag.dependencies(path).into_iter().find(|dep| blocked.contains(*dep));
      match failed_dep {
        Some(dep) => {
          warn!(step = %path.display(), failed_dep = %dep.display(), "skipping step due to failed input");
          report.skipped.insert(path.clone(), FailedDependency(dep.to_path_buf()));
          blocked.insert(path.clone());
        }
        None => ready.push(path.clone()),
      }
    }

    if ready.is_empty() {
      continue;
    }

    for (path, result) in execute_wave(&ready, &dag, config, semaphore.clone(), claims.clone()).await {
      match result {
        Ok(StepOutcome::Built) => {
          info!(step = %path.display(), "built");
          report.built.insert(path);
        }
        Ok(StepOutcome::UpToDate) => {
          debug!(step = %path.display(), "up to date");
          report.up_to_date.insert(path);
        }
        Ok(StepOutcome::Present) => {}
        Err(ExecuteError::Cancelled) => {
          blocked.insert(path.clone());
          report.cancelled.insert(path);
        }
        Err(e) => {
          error!(step = %path.display(), error = %e, "step failed");
          blocked.insert(path.clone());
          report.failed.insert(path, e);
        }
      }
    }
  }

  report.elapsed = start.elapsed();
  info!(
    built = report.built.len(),
    up_to_date = report.up_to_date.len(),
    failed = report.failed.len(),
    skipped = report.skipped.len(),
    cancelled = report.cancelled.len(),
    elapsed = ?report.elapsed,
    "build execution complete"
  );

  Ok(report)
}

fn is_tool_step(dag: &StepDag, path: &Path) -> bool {
  dag.step(path).map(|s| s.kind != StepKind::Leaf).unwrap_or(false)
}

/// Execute a wave of independent steps in parallel.
async fn execute_wave(
  paths: &[PathBuf],
  dag: &StepDag,
  config: &ExecuteConfig,
  semaphore: Arc<Semaphore>,
  claims: Claims,
) -> Vec<StepResult> {
  let mut join_set = JoinSet::new();
  let mut spawned = HashMap::new();

  for path in paths {
    let Some(step) = dag.step(path).cloned() else {
      continue;
    };
    let cancel = config.cancel.clone();
    let semaphore = semaphore.clone();
    let claims = claims.clone();

    let handle = join_set.spawn(async move {
      let path = step.path.clone();
      let result = tokio::select! {
        result = run_claimed(step, semaphore, claims) => result,
        _ = cancel.cancelled() => Err(ExecuteError::Cancelled),
      };
      (path, result)
    });
    spawned.insert(handle.id(), path.clone());
  }

  join_wave(join_set, spawned).await
}

/// Collects the results of a wave. A task that panicked is reported as a
/// failure of the step it was running.
async fn join_wave(mut join_set: JoinSet<StepResult>, mut spawned: HashMap<task::Id, PathBuf>) -> Vec<StepResult> {
  let mut results = Vec::new();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok(result) => results.push(result),
      Err(e) => {
        let Some(path) = spawned.remove(&e.id()) else {
          error!(error = %e, "unknown build task failed");
          continue;
        };
        error!(step = %path.display(), error = %e, "build task panicked");
        let message = e.to_string();
        results.push((path.clone(), Err(ExecuteError::Panicked { path, message })));
      }
    }
  }
  results
}

async fn run_claimed(step: BuildStep, semaphore: Arc<Semaphore>, claims: Claims) -> Result<StepOutcome, ExecuteError> {
  let _permit = semaphore.acquire_owned().await.map_err(|_| ExecuteError::Cancelled)?;

  let claimed = claims
    .lock()
    .map(|mut claimed| claimed.insert(step.path.clone()))
    .unwrap_or(false);
  if !claimed {
    debug!(step = %step.path.display(), "already claimed");
    return Ok(StepOutcome::UpToDate);
  }

  run_step(&step).await
}

/// Runs a single step. Dependencies must already be built.
pub async fn run_step(step: &BuildStep) -> Result<StepOutcome, ExecuteError> {
  let Some(invocation) = &step.invocation else {
    return match tokio::fs::metadata(&step.path).await {
      Ok(_) => Ok(StepOutcome::Present),
      Err(_) => Err(ExecuteError::MissingInput {
        path: step.path.clone(),
      }),
    };
  };

  if is_fresh(&step.path, &step.inputs).await? {
    return Ok(StepOutcome::UpToDate);
  }

  if let Some(parent) = step.path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }

  let partial = partial_path(&step.path);
  let invocation = invocation.with_replaced_arg(&step.path.to_string_lossy(), &partial.to_string_lossy());
  let output = invocation.run().await?;

  if !output.success() {
    let _ = tokio::fs::remove_file(&partial).await;
    let path = step.path.clone();
    return Err(match step.kind {
      StepKind::Link => ExecuteError::LinkFailed {
        path,
        code: output.code,
        output: output.output,
      },
      StepKind::Compile | StepKind::Leaf => ExecuteError::CompileFailed {
        path,
        code: output.code,
        output: output.output,
      },
    });
  }

  tokio::fs::rename(&partial, &step.path).await?;
  Ok(StepOutcome::Built)
}

/// `<path>.tmp`, where a tool writes before the result is moved into place.
pub fn partial_path(path: &Path) -> PathBuf {
  let mut name: OsString = path.as_os_str().to_owned();
  name.push(".");
  name.push(PARTIAL_SUFFIX);
  PathBuf::from(name)
}

/// True when `path` exists and is not older than any input.
async fn is_fresh(path: &Path, inputs: &[PathBuf]) -> Result<bool, ExecuteError> {
  let Some(built) = modified(path).await else {
    return Ok(false);
  };
  for input in inputs {
    match modified(input).await {
      Some(changed) if changed <= built => {}
      _ => return Ok(false),
    }
  }
  Ok(true)
}

async fn modified(path: &Path) -> Option<SystemTime> {
  tokio::fs::metadata(path).await.ok()?.modified().ok()
}
