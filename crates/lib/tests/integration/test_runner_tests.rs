use kiln_lib::ProjectError;
use kiln_lib::project::{DEBUG, RELEASE};

use super::common::TestEnv;

#[tokio::test]
async fn collects_failures_across_profiles() {
  let env = TestEnv::new();
  env.write("tests/pass.cpp", "int main() { return 0; }\n");
  env.write("tests/fail.cpp", "int main() { return 3; } // FAIL_TEST\n");

  let mut project = env.project();
  project.test("pass", env.options(&["tests/pass.cpp"])).unwrap();
  project.test("fail", env.options(&["tests/fail.cpp"])).unwrap();

  let mut failures = project.run_tests(&[], &[]).await.unwrap();
  failures.sort_by(|a, b| a.profile.cmp(&b.profile));

  assert_eq!(failures.len(), 2);
  assert!(failures.iter().all(|f| f.name == "fail" && f.code == Some(3)));
  assert_eq!(failures[0].profile, DEBUG);
  assert_eq!(failures[1].profile, RELEASE);
}

#[tokio::test]
async fn selected_tests_only() {
  let env = TestEnv::new();
  env.write("tests/pass.cpp", "int main() { return 0; }\n");
  env.write("tests/fail.cpp", "int main() { return 3; } // FAIL_TEST\n");

  let mut project = env.project();
  project.test("pass", env.options(&["tests/pass.cpp"])).unwrap();
  project.test("fail", env.options(&["tests/fail.cpp"])).unwrap();

  let failures = project
    .run_tests(&["pass".to_string()], &[RELEASE.to_string()])
    .await
    .unwrap();
  assert!(failures.is_empty());
  assert!(!project.tests()["fail"].path(RELEASE).unwrap().exists());
}

#[tokio::test]
async fn unknown_test_is_an_error() {
  let env = TestEnv::new();
  let project = env.project();

  let result = project.run_tests(&["nope".to_string()], &[]).await;
  assert!(matches!(result, Err(ProjectError::UnknownTarget { .. })));
}

#[tokio::test]
async fn build_failure_stops_test_run() {
  let env = TestEnv::new();
  env.write("tests/broken.cpp", "FAIL_BUILD\n");

  let mut project = env.project();
  project.test("broken", env.options(&["tests/broken.cpp"])).unwrap();

  let result = project.run_tests(&[], &[RELEASE.to_string()]).await;
  match result {
    Err(ProjectError::BuildFailed { failed, skipped }) => {
      assert_eq!(failed.len(), 1);
      assert_eq!(skipped, 1);
    }
    other => panic!("expected a build failure, got {other:?}"),
  }
}

#[tokio::test]
async fn run_reports_exit_status() {
  let env = TestEnv::new();
  env.write("src/main.cpp", "int main() { return 3; } // FAIL_TEST\n");

  let mut project = env.project();
  project.executable("app", env.options(&["src/main.cpp"])).unwrap();

  let status = project.run("app", RELEASE, &[]).await.unwrap();
  assert_eq!(status.code(), Some(3));
  assert!(project.executables()["app"].path(DEBUG).is_some_and(|p| !p.exists()));
}
