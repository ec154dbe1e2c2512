use kiln_lib::platform::paths::InstallDirs;
use kiln_lib::project::RELEASE;

use super::common::TestEnv;

fn dirs(env: &TestEnv) -> InstallDirs {
  InstallDirs::from_prefix(&env.outside("prefix"))
}

#[tokio::test]
async fn installs_public_targets_and_headers() {
  let env = TestEnv::new();
  let mut project = env.calculator();
  env.write("tests/t.cpp", "int main() { return 0; }\n");
  project.test("t", env.options(&["tests/t.cpp"])).unwrap();
  project.interfaces(&["include/math.hpp".to_string()]).unwrap();
  let dirs = dirs(&env);

  let actions = project.install(&[], &[], &[], &dirs, false).await.unwrap();
  assert_eq!(actions.len(), 3);
  for action in &actions {
    assert!(action.destination.exists(), "{action}");
  }
  assert!(dirs.executables.join("calc").exists());
  assert!(dirs.headers.join("math.hpp").exists());
  assert!(!dirs.executables.join("t").exists());
  assert_eq!(env.project().files().find("math.hpp").len(), 1);

  let removed = project.uninstall(&[], &[], &[], &dirs, false).unwrap();
  assert_eq!(removed.len(), 3);
  assert!(!dirs.executables.join("calc").exists());
}

#[tokio::test]
async fn dry_run_builds_and_copies_nothing() {
  let env = TestEnv::new();
  let project = env.calculator();
  let dirs = dirs(&env);

  let actions = project
    .install(&["calc".to_string()], &[RELEASE.to_string()], &[], &dirs, true)
    .await
    .unwrap();
  assert_eq!(actions.len(), 1);
  assert!(!actions[0].source.exists());
  assert!(!dirs.executables.exists());
  assert!(env.invocations().is_empty());
}
