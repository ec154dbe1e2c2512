//! Host environment: install locations and environment overrides.

pub mod paths;

use tracing::warn;

use crate::execute::types::num_cpus;

/// Number of tools to run at once, honoring `KILN_JOBS`.
///
/// Unparseable or zero values fall back to the number of CPUs.
pub fn parallelism() -> usize {
  match std::env::var("KILN_JOBS") {
    Ok(value) => match value.trim().parse::<usize>() {
      Ok(jobs) if jobs > 0 => jobs,
      _ => {
        warn!(value = %value, "ignoring invalid KILN_JOBS");
        num_cpus()
      }
    },
    Err(_) => num_cpus(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn jobs_env_sets_parallelism() {
    temp_env::with_var("KILN_JOBS", Some("3"), || {
      assert_eq!(parallelism(), 3);
    });
  }

  #[test]
  #[serial]
  fn invalid_jobs_falls_back() {
    temp_env::with_var("KILN_JOBS", Some("0"), || {
      assert_eq!(parallelism(), num_cpus());
    });
    temp_env::with_var("KILN_JOBS", Some("many"), || {
      assert_eq!(parallelism(), num_cpus());
    });
  }
}
