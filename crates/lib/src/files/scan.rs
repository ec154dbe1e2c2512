//! Include scanning.
//!
//! Only quoted includes (`#include "x.h"`) are followed. Angle-bracket
//! includes name system headers and are never part of the project.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace};

use super::{FileManager, is_scannable, normalize};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{IncludeChain, ProjectError, Result};
use crate::graph::{Node, NodeId};

/// Quoted include names in `contents`, in order of appearance.
///
/// Comments are ignored, so a commented-out include is not followed.
pub fn parse_includes(contents: &str) -> Vec<String> {
  strip_comments(contents)
    .lines()
    .filter_map(|line| {
      let rest = line.trim_start().strip_prefix('#')?.trim_start();
      let rest = rest.strip_prefix("include")?.trim_start();
      let rest = rest.strip_prefix('"')?;
      let end = rest.find('"')?;
      let name = &rest[..end];
      (!name.is_empty()).then(|| name.to_string())
    })
    .collect()
}

/// Replaces comments with whitespace, keeping line structure intact.
fn strip_comments(contents: &str) -> String {
  #[derive(PartialEq)]
  enum State {
    Code,
    Line,
    Block,
    Str(char),
  }

  let mut out = String::with_capacity(contents.len());
  let mut state = State::Code;
  let mut chars = contents.chars().peekable();

  while let Some(c) = chars.next() {
    match state {
      State::Code => match (c, chars.peek()) {
        ('/', Some('/')) => {
          chars.next();
          state = State::Line;
        }
        ('/', Some('*')) => {
          chars.next();
          out.push(' ');
          state = State::Block;
        }
        ('"' | '\'', _) => {
          out.push(c);
          state = State::Str(c);
        }
        _ => out.push(c),
      },
      State::Line => {
        if c == '\n' {
          out.push('\n');
          state = State::Code;
        }
      }
      State::Block => {
        if c == '\n' {
          out.push('\n');
        } else if c == '*' && chars.peek() == Some(&'/') {
          chars.next();
          state = State::Code;
        }
      }
      State::Str(quote) => {
        out.push(c);
        if c == '\\' {
          if let Some(escaped) = chars.next() {
            out.push(escaped);
          }
        } else if c == quote || c == '\n' {
          state = State::Code;
        }
      }
    }
  }
  out
}

impl FileManager {
  /// Scans every indexed source and header.
  pub fn scan_all(&mut self) -> Result<()> {
    let candidates: Vec<PathBuf> = self.files.iter().filter(|p| is_scannable(p)).cloned().collect();
    for path in candidates {
      self.scan(&path)?;
    }
    Ok(())
  }

  /// Scans `path` and, recursively, everything it includes.
  ///
  /// Each file is read at most once; later calls return the cached node.
  pub fn scan(&mut self, path: &Path) -> Result<NodeId> {
    let mut stack = Vec::new();
    self.scan_file(path, &mut stack)
  }

  fn scan_file(&mut self, path: &Path, stack: &mut Vec<PathBuf>) -> Result<NodeId> {
    let id = self.source_node(path);
    match self.graph.node(id) {
      Node::Source(source) if !source.is_scanned() => {}
      _ => return Ok(id),
    }

    stack.push(path.to_path_buf());
    let bytes = fs::read(path)?;
    let contents = String::from_utf8_lossy(&bytes);

    let mut includes = BTreeSet::new();
    let mut include_dirs = BTreeSet::new();
    if let Some(parent) = path.parent() {
      include_dirs.insert(parent.to_path_buf());
    }

    for name in parse_includes(&contents) {
      let Some((dir, file)) = self.resolve_include(path, &name)? else {
        self.diagnostics.emit(Diagnostic::note(
          DiagnosticKind::ExternalInclude,
          Some(path.to_path_buf()),
          format!("\"{}\" is not a project file; assuming it is provided by the toolchain", name),
        ));
        continue;
      };

      if let Some(start) = stack.iter().position(|p| *p == file) {
        let mut chain = stack[start..].to_vec();
        chain.push(file);
        return Err(ProjectError::CycleDetected {
          chain: IncludeChain(chain),
        });
      }

      trace!(from = %path.display(), include = %file.display(), "resolved include");
      include_dirs.insert(dir);
      let child = self.scan_file(&file, stack)?;
      if let Some(source) = self.graph.node(child).as_source() {
        include_dirs.extend(source.include_dirs().iter().cloned());
      }
      includes.insert(file);
    }
    stack.pop();

    debug!(path = %path.display(), includes = includes.len(), "scanned");
    if let Node::Source(source) = self.graph.node_mut(id) {
      source.includes = includes;
      source.include_dirs = include_dirs;
      source.scanned = true;
    }
    Ok(id)
  }

  /// Finds the file an include directive in `including` refers to.
  ///
  /// Returns the directory that must be on the include path together with
  /// the file. The including file's own directory wins outright; otherwise
  /// every other way of reaching a project file must agree on one file.
  fn resolve_include(&self, including: &Path, name: &str) -> Result<Option<(PathBuf, PathBuf)>> {
    let relative = normalize(Path::new(name));
    if relative.is_absolute() {
      return Ok(self.files.contains(&relative).then(|| {
        let dir = relative.parent().map(Path::to_path_buf).unwrap_or_default();
        (dir, relative)
      }));
    }

    if let Some(own_dir) = including.parent() {
      let candidate = normalize(&own_dir.join(&relative));
      if self.files.contains(&candidate) {
        return Ok(Some((own_dir.to_path_buf(), candidate)));
      }
    }

    let mut resolutions: Vec<(PathBuf, PathBuf)> = Vec::new();
    let climbs = relative.components().any(|c| c == Component::ParentDir);
    if !climbs {
      let depth = relative.components().count();
      for file in self.files.iter().filter(|f| f.ends_with(&relative)) {
        if let Some(dir) = file.ancestors().nth(depth) {
          resolutions.push((dir.to_path_buf(), file.clone()));
        }
      }
    }
    for dir in self.dirs.iter().chain(self.include_dirs.iter()) {
      let candidate = normalize(&dir.join(&relative));
      if self.files.contains(&candidate) {
        resolutions.push((dir.clone(), candidate));
      }
    }

    let distinct: BTreeSet<PathBuf> = resolutions.iter().map(|(_, file)| file.clone()).collect();
    match distinct.len() {
      0 => Ok(None),
      1 => Ok(resolutions.into_iter().next()),
      _ => Err(ProjectError::AmbiguousReference {
        name: name.to_string(),
        candidates: distinct.into_iter().collect(),
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::diagnostics::CollectingSink;
  use crate::util::testutil::ProjectTree;

  fn manager(tree: &ProjectTree) -> (FileManager, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::default());
    let files = FileManager::with_diagnostics(tree.root(), None, &[], sink.clone()).unwrap();
    (files, sink)
  }

  #[test]
  fn parses_quoted_includes_only() {
    let src = r##"
#include <vector>
#include "a.h"
  #  include   "dir/b.hpp"
// #include "commented.h"
/* #include "blocked.h"
   #include "still_blocked.h" */
const char *s = "#include \"not_a_directive.h\"";
#include ""
"##;
    assert_eq!(parse_includes(src), vec!["a.h", "dir/b.hpp"]);
  }

  #[test]
  fn header_closure_follows_transitive_includes() {
    let tree = ProjectTree::new();
    tree.write("include/utils.hpp", "#pragma once\n");
    tree.write("include/factorial.hpp", "#include \"utils.hpp\"\n");
    tree.write("src/main.cpp", "#include \"factorial.hpp\"\n#include <iostream>\n");

    let (mut files, _) = manager(&tree);
    let main = tree.path("src/main.cpp");
    files.scan(&main).unwrap();

    let closure = files.header_closure(&main);
    assert_eq!(
      closure,
      BTreeSet::from([tree.path("include/factorial.hpp"), tree.path("include/utils.hpp")])
    );
    let dirs = files.include_dirs_of(&main).unwrap();
    assert!(dirs.contains(&tree.path("src")));
    assert!(dirs.contains(&tree.path("include")));
  }

  #[test]
  fn own_directory_wins_over_other_matches() {
    let tree = ProjectTree::new();
    tree.write("a/utils.h", "");
    tree.write("b/utils.h", "");
    tree.write("a/factorial.h", "#include \"utils.h\"\n");

    let (mut files, _) = manager(&tree);
    let factorial = tree.path("a/factorial.h");
    files.scan(&factorial).unwrap();
    assert_eq!(files.header_closure(&factorial), BTreeSet::from([tree.path("a/utils.h")]));
  }

  #[test]
  fn ambiguous_include_is_an_error() {
    let tree = ProjectTree::new();
    tree.write("a/utils.h", "");
    tree.write("b/utils.h", "");
    tree.write("src/main.cpp", "#include \"utils.h\"\n");

    let (mut files, _) = manager(&tree);
    match files.scan(&tree.path("src/main.cpp")) {
      Err(ProjectError::AmbiguousReference { name, candidates }) => {
        assert_eq!(name, "utils.h");
        assert_eq!(candidates, vec![tree.path("a/utils.h"), tree.path("b/utils.h")]);
      }
      other => panic!("expected AmbiguousReference, got {:?}", other),
    }
  }

  #[test]
  fn include_with_directory_prefix_resolves_from_project_root() {
    let tree = ProjectTree::new();
    tree.write("src/utils.hpp", "");
    tree.write("include/fibonacci.hpp", "#include \"src/utils.hpp\"\n");

    let (mut files, _) = manager(&tree);
    let header = tree.path("include/fibonacci.hpp");
    files.scan(&header).unwrap();
    let dirs = files.include_dirs_of(&header).unwrap();
    assert_eq!(
      dirs,
      &BTreeSet::from([tree.root().to_path_buf(), tree.path("include"), tree.path("src")])
    );
  }

  #[test]
  fn parent_relative_include_resolves() {
    let tree = ProjectTree::new();
    tree.write("include/x.h", "");
    tree.write("src/main.cpp", "#include \"../include/x.h\"\n");

    let (mut files, _) = manager(&tree);
    let main = tree.path("src/main.cpp");
    files.scan(&main).unwrap();
    assert_eq!(files.header_closure(&main), BTreeSet::from([tree.path("include/x.h")]));
  }

  #[test]
  fn include_cycle_reports_the_chain() {
    let tree = ProjectTree::new();
    tree.write("a.h", "#include \"b.h\"\n");
    tree.write("b.h", "#include \"a.h\"\n");

    let (mut files, _) = manager(&tree);
    match files.scan(&tree.path("a.h")) {
      Err(ProjectError::CycleDetected { chain }) => {
        assert_eq!(chain.0, vec![tree.path("a.h"), tree.path("b.h"), tree.path("a.h")]);
      }
      other => panic!("expected CycleDetected, got {:?}", other),
    }
  }

  #[test]
  fn header_without_includes_has_empty_closure() {
    let tree = ProjectTree::new();
    tree.write("lonely.h", "int lonely();\n");

    let (mut files, sink) = manager(&tree);
    let path = tree.path("lonely.h");
    files.scan(&path).unwrap();
    assert!(files.header_closure(&path).is_empty());
    assert_eq!(files.include_dirs_of(&path), Some(&BTreeSet::from([tree.root().to_path_buf()])));
    assert!(sink.records().is_empty());
  }

  #[test]
  fn unresolved_include_emits_note() {
    let tree = ProjectTree::new();
    tree.write("main.cpp", "#include \"generated/config.h\"\n");

    let (mut files, sink) = manager(&tree);
    files.scan(&tree.path("main.cpp")).unwrap();
    let notes = sink.of_kind(DiagnosticKind::ExternalInclude);
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.contains("generated/config.h"));
  }

  #[test]
  fn scanning_twice_reuses_the_node() {
    let tree = ProjectTree::new();
    tree.write("a.h", "");
    tree.write("main.cpp", "#include \"a.h\"\n");

    let (mut files, _) = manager(&tree);
    files.scan_all().unwrap();
    let len = files.graph().len();
    let first = files.scan(&tree.path("main.cpp")).unwrap();
    let second = files.scan(&tree.path("main.cpp")).unwrap();
    assert_eq!(first, second);
    assert_eq!(files.graph().len(), len);
  }
}
