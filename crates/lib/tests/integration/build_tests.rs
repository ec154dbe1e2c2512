use std::path::PathBuf;

use kiln_lib::execute::ExecuteError;
use kiln_lib::project::{DEBUG, RELEASE};
use kiln_lib::tools::BuildFlags;

use super::common::{TestEnv, file_name, touch};

fn release() -> Vec<String> {
  vec![RELEASE.to_string()]
}

#[tokio::test]
async fn builds_every_target_and_profile() {
  let env = TestEnv::new();
  let project = env.calculator();

  let report = project.build(&[], &[]).await.unwrap();
  assert!(report.is_success(), "{:?}", report.failed);
  // Two objects and two artifacts per profile.
  assert_eq!(report.built.len(), 8);

  for target in project.all_targets() {
    let release = target.path(RELEASE).unwrap();
    let debug = target.path(DEBUG).unwrap();
    assert_ne!(release, debug);
    assert!(release.starts_with(env.path("build/release")));
    assert!(debug.starts_with(env.path("build/debug")));
    assert!(release.exists());
    assert!(debug.exists());
  }
}

#[tokio::test]
async fn second_build_is_up_to_date() {
  let env = TestEnv::new();
  let project = env.calculator();

  project.build(&[], &release()).await.unwrap();
  let invocations = env.invocations().len();

  let report = project.build(&[], &release()).await.unwrap();
  assert!(report.is_success());
  assert!(report.built.is_empty());
  assert_eq!(report.up_to_date.len(), 4);
  assert_eq!(env.invocations().len(), invocations);
}

#[tokio::test]
async fn touched_header_rebuilds_only_its_includers() {
  let env = TestEnv::new();
  let project = env.calculator();
  project.build(&[], &release()).await.unwrap();

  touch(&env.path("include/format.hpp"), 30);
  let report = project.build(&[], &release()).await.unwrap();

  let rebuilt: Vec<String> = report.built.iter().map(|p| file_name(p)).collect();
  assert!(rebuilt.iter().any(|name| name.starts_with("main.")), "{rebuilt:?}");
  assert!(!rebuilt.iter().any(|name| name.starts_with("math.")), "{rebuilt:?}");
}

#[tokio::test]
async fn transitive_header_change_reaches_object() {
  let env = TestEnv::new();
  let project = env.calculator();
  project.build(&[], &release()).await.unwrap();

  // main.cpp -> format.hpp -> math.hpp; math.cpp includes math.hpp directly.
  touch(&env.path("include/math.hpp"), 30);
  let report = project.build(&[], &release()).await.unwrap();

  let rebuilt: Vec<String> = report.built.iter().map(|p| file_name(p)).collect();
  assert!(rebuilt.iter().any(|name| name.starts_with("main.")), "{rebuilt:?}");
  assert!(rebuilt.iter().any(|name| name.starts_with("math.")), "{rebuilt:?}");
}

#[tokio::test]
async fn failed_compile_skips_dependents_only() {
  let env = TestEnv::new();
  env.write("src/good.cpp", "int main() { return 0; }\n");
  env.write("src/bad.cpp", "FAIL_BUILD\n");
  env.write("src/other.cpp", "int other() { return 1; }\n");

  let mut project = env.project();
  project.executable("good", env.options(&["src/good.cpp"])).unwrap();
  project
    .executable("bad", env.options(&["src/bad.cpp", "src/other.cpp"]))
    .unwrap();

  let report = project.build(&[], &release()).await.unwrap();
  assert!(!report.is_success());

  let (failed, err) = report.failed.iter().next().unwrap();
  assert_eq!(report.failed.len(), 1);
  assert!(file_name(failed).starts_with("bad."));
  match err {
    ExecuteError::CompileFailed { code, output, .. } => {
      assert_eq!(*code, Some(1));
      assert!(output.contains("forced failure"));
    }
    other => panic!("unexpected error: {other}"),
  }
  assert!(!failed.exists());

  let bad_exe = project.executables()["bad"].path(RELEASE).unwrap().to_path_buf();
  assert_eq!(report.skipped.keys().cloned().collect::<Vec<PathBuf>>(), vec![bad_exe.clone()]);
  assert!(!bad_exe.exists());

  let good_exe = project.executables()["good"].path(RELEASE).unwrap();
  assert!(good_exe.exists());
  assert!(report.built.iter().any(|p| file_name(p).starts_with("other.")));
}

#[tokio::test]
async fn optimization_levels_coexist_in_one_directory() {
  let env = TestEnv::new();
  env.write("src/main.cpp", "int main() { return 0; }\n");

  let mut project = env.project();
  project
    .profile("fast", BuildFlags::new().o("3"), Some("shared"), "_fast")
    .unwrap();
  project
    .profile("slow", BuildFlags::new().o("0"), Some("shared"), "_slow")
    .unwrap();
  project.executable("app", env.options(&["src/main.cpp"])).unwrap();

  let profiles = vec!["fast".to_string(), "slow".to_string()];
  let report = project.build(&[], &profiles).await.unwrap();
  assert!(report.is_success());

  let objects: Vec<PathBuf> = std::fs::read_dir(env.path("build/shared"))
    .unwrap()
    .map(|e| e.unwrap().path())
    .filter(|p| p.extension().is_some_and(|e| e == "o"))
    .collect();
  assert_eq!(objects.len(), 2, "{objects:?}");

  let app = &project.executables()["app"];
  assert_ne!(app.path("fast"), app.path("slow"));
  assert!(app.path("fast").unwrap().exists());
  assert!(app.path("slow").unwrap().exists());
}

#[tokio::test]
async fn shared_sources_compile_once_per_profile() {
  let env = TestEnv::new();
  env.write("src/common.cpp", "int common() { return 0; }\n");
  env.write("src/a.cpp", "int main() { return 0; }\n");
  env.write("src/b.cpp", "int main() { return 0; }\n");

  let mut project = env.project();
  project
    .executable("a", env.options(&["src/a.cpp", "src/common.cpp"]))
    .unwrap();
  project
    .executable("b", env.options(&["src/b.cpp", "src/common.cpp"]))
    .unwrap();

  project.build(&[], &release()).await.unwrap();
  let common_builds = env
    .invocations()
    .iter()
    .filter(|out| file_name(std::path::Path::new(out)).starts_with("common."))
    .count();
  assert_eq!(common_builds, 1);
}

#[tokio::test]
async fn cancelled_build_runs_nothing() {
  let env = TestEnv::new();
  let mut project = env.calculator();
  project.backend_mut().execute_config_mut().cancel.cancel();

  let report = project.build(&[], &release()).await.unwrap();
  assert!(!report.is_success());
  assert!(report.built.is_empty());
  assert_eq!(report.cancelled.len(), 4);
  assert!(env.invocations().is_empty());
}

#[tokio::test]
async fn configure_then_reconfigure_when_project_file_changes() {
  let env = TestEnv::new();
  let mut project = env.calculator();
  let project_file = env.write("build.lua", "return {}\n");
  project.set_config_file(&project_file);

  assert!(project.needs_configure());
  let description = project.configure().unwrap();
  assert!(description.exists());
  assert!(!project.needs_configure());

  touch(&project_file, 30);
  assert!(project.needs_configure());
}
