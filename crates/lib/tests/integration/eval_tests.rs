use kiln_lib::project::{DEBUG, RELEASE, TargetKind};
use kiln_lib::{EvalError, load_project};

use super::common::TestEnv;

fn project_file(env: &TestEnv, body: &str) -> std::path::PathBuf {
  env.write_calculator();
  env.write("tests/math_test.cpp", "#include \"math.hpp\"\nint main() { return 0; }\n");
  let lua = format!("local cc = [[{}]]\n{}", env.cc(), body);
  env.write("build.lua", &lua)
}

const CALCULATOR: &str = r#"
local function target(name, sources, libs)
  return { name = name, sources = sources, libs = libs or {}, compiler = cc, linker = cc }
end

return {
  libraries = { target("math", { "src/math.cpp" }) },
  executables = { target("calc", { "src/main.cpp" }, { "math" }) },
  tests = { target("math_test", { "tests/math_test.cpp" }, { "math" }) },
  interfaces = { "math.hpp" },
}
"#;

#[test]
fn declares_targets_from_lua() {
  let env = TestEnv::new();
  let path = project_file(&env, CALCULATOR);

  let project = temp_env::with_var_unset("KILN_BUILD_DIR", || load_project(&path)).unwrap();
  let kinds: Vec<(String, TargetKind)> = project
    .all_targets()
    .map(|t| (t.name().to_string(), t.kind()))
    .collect();
  assert_eq!(
    kinds,
    vec![
      ("math".to_string(), TargetKind::Library),
      ("calc".to_string(), TargetKind::Executable),
      ("math_test".to_string(), TargetKind::Test),
    ]
  );
  assert!(project.public_headers().contains(&env.path("include/math.hpp")));
  for target in project.all_targets() {
    assert!(target.contains_profile(RELEASE));
    assert!(target.contains_profile(DEBUG));
  }
}

#[cfg(unix)]
#[tokio::test]
async fn loaded_project_builds_and_tests() {
  let env = TestEnv::new();
  let path = project_file(&env, CALCULATOR);

  let mut project = temp_env::with_var_unset("KILN_BUILD_DIR", || load_project(&path)).unwrap();
  assert!(project.needs_configure());
  project.configure().unwrap();

  let report = project.build(&[], &[RELEASE.to_string()]).await.unwrap();
  assert!(report.is_success(), "{:?}", report.failed);
  let failures = project.run_tests(&[], &[]).await.unwrap();
  assert!(failures.is_empty());
}

#[test]
fn executable_cannot_link_a_missing_library_file() {
  let env = TestEnv::new();
  let path = project_file(
    &env,
    r#"return { executables = { { name = "calc", sources = { "src/main.cpp" }, libs = { "lib/libnope.a" } } } }"#,
  );

  let result = temp_env::with_var_unset("KILN_BUILD_DIR", || load_project(&path));
  assert!(matches!(result, Err(EvalError::Project(_))));
}

#[test]
fn ambiguous_source_is_reported() {
  let env = TestEnv::new();
  env.write("a/util.cpp", "int a;\n");
  env.write("b/util.cpp", "int b;\n");
  let path = project_file(&env, r#"return { executables = { { name = "u", sources = { "util.cpp" } } } }"#);

  let err = temp_env::with_var_unset("KILN_BUILD_DIR", || load_project(&path)).unwrap_err();
  assert!(err.to_string().contains("ambiguous"), "{err}");
}
