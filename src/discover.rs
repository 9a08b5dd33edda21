// promptmap/src/discover.rs
//! Turns an input (directory, Cargo manifest, record files) into a root name
//! plus the list of producers that will fill the tree.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use ignore::WalkBuilder;
use tracing::debug;

use crate::{
    aggregate::Producer,
    analyze::{AnalyzeOptions, RustFileProducer},
    record_file::RecordFileProducer,
    util::{dir_display_name, normalize_rel},
};

/// Project node used when scanning a bare directory.
pub const DIRECTORY_SCAN_PROJECT: &str = "(Directory Scan)";

/// What to aggregate and under which root.
pub struct Plan {
    pub root_name: String,
    pub producers: Vec<Box<dyn Producer>>,
}

impl Plan {
    pub fn labels(&self) -> Vec<String> {
        self.producers.iter().map(|p| p.label()).collect()
    }
}

/* ----------------------------- directory ----------------------------- */

/// Every `.rs` file below `dir`, under a single `(Directory Scan)` project.
pub fn plan_directory(dir: &Path, exclude_dirs: &[String], opts: AnalyzeOptions) -> Result<Plan> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }
    let root = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let prefix = vec![DIRECTORY_SCAN_PROJECT.to_string()];

    let producers = rust_files(&root, exclude_dirs, &BTreeSet::new())?
        .into_iter()
        .map(|path| boxed(rust_producer(&root, path, prefix.clone(), opts)))
        .collect();

    Ok(Plan { root_name: dir_display_name(&root), producers })
}

/* ----------------------------- manifest ----------------------------- */

/// A `Cargo.toml`: workspace members become projects, a plain package puts
/// its modules directly under the root.
pub fn plan_manifest(manifest: &Path, exclude_dirs: &[String], opts: AnalyzeOptions) -> Result<Plan> {
    let doc = read_manifest(manifest)?;
    let ws_root = manifest
        .parent()
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .ok_or_else(|| anyhow!("manifest has no parent directory: {}", manifest.display()))?;
    let ws_root = ws_root.canonicalize().unwrap_or_else(|_| ws_root.to_path_buf());

    let Some(workspace) = doc.get("workspace") else {
        let name = package_name(&doc)
            .ok_or_else(|| anyhow!("{} has neither [workspace] nor [package].name", manifest.display()))?;
        let producers = rust_files(&ws_root, exclude_dirs, &BTreeSet::new())?
            .into_iter()
            .map(|path| boxed(rust_producer(&ws_root, path, Vec::new(), opts)))
            .collect();
        return Ok(Plan { root_name: name, producers });
    };

    let excluded: BTreeSet<PathBuf> = string_array(workspace, "exclude")
        .iter()
        .map(|e| ws_root.join(e))
        .collect();
    let members = expand_members(&ws_root, &string_array(workspace, "members"))?
        .into_iter()
        .filter(|m| !excluded.contains(m))
        .collect::<Vec<_>>();

    let mut producers: Vec<Box<dyn Producer>> = Vec::new();
    let member_dirs: BTreeSet<PathBuf> = members.iter().cloned().collect();

    for member in &members {
        let member_manifest = member.join("Cargo.toml");
        let Ok(member_doc) = read_manifest(&member_manifest) else {
            debug!(member = %member.display(), "skipping member without a readable manifest");
            continue;
        };
        let project = package_name(&member_doc).unwrap_or_else(|| dir_display_name(member));
        // a member at the workspace root must not swallow its siblings
        let others: BTreeSet<PathBuf> = member_dirs.iter().filter(|d| *d != member).cloned().collect();
        for path in rust_files(member, exclude_dirs, &others)? {
            producers.push(boxed(rust_producer(&ws_root, path, vec![project.clone()], opts)));
        }
    }

    // a workspace manifest can also be a package that is not listed as a member
    if let Some(name) = package_name(&doc).filter(|_| !member_dirs.contains(&ws_root)) {
        for path in rust_files(&ws_root, exclude_dirs, &member_dirs)? {
            producers.push(boxed(rust_producer(&ws_root, path, vec![name.clone()], opts)));
        }
    }

    Ok(Plan { root_name: dir_display_name(&ws_root), producers })
}

/* ----------------------------- records ----------------------------- */

/// One producer per JSONL record file.
pub fn plan_records(files: &[PathBuf], root_name: Option<&str>) -> Plan {
    let producers = files
        .iter()
        .map(|f| boxed(RecordFileProducer::new(f.clone())))
        .collect();
    Plan { root_name: root_name.unwrap_or_default().to_string(), producers }
}

/* ----------------------------- helpers ----------------------------- */

fn boxed<P: Producer + 'static>(p: P) -> Box<dyn Producer> {
    Box::new(p)
}

fn rust_producer(root: &Path, path: PathBuf, prefix: Vec<String>, opts: AnalyzeOptions) -> RustFileProducer {
    let rel_path = normalize_rel(root, &path);
    RustFileProducer { path, rel_path, prefix, opts }
}

/// Sorted `.rs` files below `root`, honoring ignore files, skipping excluded
/// directory names and anything under `skip_dirs`.
fn rust_files(root: &Path, exclude_dirs: &[String], skip_dirs: &BTreeSet<PathBuf>) -> Result<Vec<PathBuf>> {
    let excluded: Vec<String> = exclude_dirs.to_vec();
    let skip = skip_dirs.clone();
    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .require_git(false)
        .filter_entry(move |dent| {
            let is_dir = dent.file_type().is_some_and(|t| t.is_dir());
            if !is_dir || dent.depth() == 0 {
                return true;
            }
            let name = dent.file_name().to_string_lossy();
            !excluded.iter().any(|e| *e == name) && !skip.contains(dent.path())
        })
        .build();

    let mut files = Vec::new();
    for dent in walker {
        let dent = dent.with_context(|| format!("walking {}", root.display()))?;
        let path = dent.path();
        if dent.file_type().is_some_and(|t| t.is_file()) && path.extension().is_some_and(|e| e == "rs") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn read_manifest(path: &Path) -> Result<toml::Value> {
    let text = fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parse manifest {}", path.display()))
}

fn package_name(doc: &toml::Value) -> Option<String> {
    doc.get("package")?.get("name")?.as_str().map(str::to_string)
}

fn string_array(table: &toml::Value, key: &str) -> Vec<String> {
    table
        .get(key)
        .and_then(toml::Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Literal member paths plus trailing `/*` globs, in sorted order.
fn expand_members(ws_root: &Path, members: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = BTreeSet::new();
    for m in members {
        if let Some(parent) = m.strip_suffix("/*") {
            let dir = ws_root.join(parent);
            let entries = fs::read_dir(&dir).with_context(|| format!("read members dir {}", dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.join("Cargo.toml").is_file() {
                    out.insert(path);
                }
            }
        } else if m.is_empty() || m == "." {
            out.insert(ws_root.to_path_buf());
        } else {
            out.insert(ws_root.join(m));
        }
    }
    Ok(out.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, text: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, text).unwrap();
    }

    #[test]
    fn directory_plan_finds_rust_files_and_skips_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let proj = dir.path().join("MyProj");
        write(&proj, "src/lib.rs", "pub struct A;");
        write(&proj, "src/net/tcp.rs", "pub struct B;");
        write(&proj, "target/debug/gen.rs", "pub struct C;");
        write(&proj, "README.md", "# hi");

        let plan = plan_directory(&proj, &["target".to_string()], AnalyzeOptions::default()).unwrap();
        assert_eq!(plan.root_name, "MyProj");
        assert_eq!(plan.labels(), vec!["src/lib.rs", "src/net/tcp.rs"]);
    }

    #[test]
    fn directory_plan_rejects_missing_dir() {
        assert!(plan_directory(Path::new("/no/such/dir"), &[], AnalyzeOptions::default()).is_err());
    }

    #[test]
    fn workspace_members_and_globs() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        write(&ws, "Cargo.toml", "[workspace]\nmembers = [\"app\", \"crates/*\"]\nexclude = [\"crates/skip\"]\n");
        write(&ws, "app/Cargo.toml", "[package]\nname = \"app-bin\"\n");
        write(&ws, "app/src/main.rs", "fn main() {}");
        write(&ws, "crates/core/Cargo.toml", "[package]\nname = \"core\"\n");
        write(&ws, "crates/core/src/lib.rs", "pub struct Core;");
        write(&ws, "crates/skip/Cargo.toml", "[package]\nname = \"skip\"\n");
        write(&ws, "crates/skip/src/lib.rs", "pub struct Skip;");

        let plan = plan_manifest(&ws.join("Cargo.toml"), &[], AnalyzeOptions::default()).unwrap();
        assert_eq!(plan.root_name, "ws");
        assert_eq!(plan.labels(), vec!["app/src/main.rs", "crates/core/src/lib.rs"]);
    }

    #[test]
    fn plain_package_has_no_project_level() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        write(&pkg, "Cargo.toml", "[package]\nname = \"my-pkg\"\n");
        write(&pkg, "src/lib.rs", "pub struct Top;");

        let plan = plan_manifest(&pkg.join("Cargo.toml"), &[], AnalyzeOptions::default()).unwrap();
        assert_eq!(plan.root_name, "my-pkg");
        assert_eq!(plan.labels(), vec!["src/lib.rs"]);
    }

    #[test]
    fn manifest_without_package_or_workspace_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cargo.toml", "[dependencies]\n");
        assert!(plan_manifest(&dir.path().join("Cargo.toml"), &[], AnalyzeOptions::default()).is_err());
    }

    #[test]
    fn records_plan_uses_given_root() {
        let plan = plan_records(&[PathBuf::from("a.jsonl"), PathBuf::from("b.jsonl")], Some("Sol"));
        assert_eq!(plan.root_name, "Sol");
        assert_eq!(plan.labels(), vec!["a.jsonl", "b.jsonl"]);
        assert_eq!(plan_records(&[], None).root_name, "");
    }

    #[test]
    fn root_package_listed_as_member_is_walked_once() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("rootpkg");
        write(
            &ws,
            "Cargo.toml",
            "[package]\nname = \"rootpkg\"\n[workspace]\nmembers = [\".\", \"crates/*\"]\n",
        );
        write(&ws, "src/lib.rs", "pub fn top() {}");
        write(&ws, "crates/core/Cargo.toml", "[package]\nname = \"core\"\n");
        write(&ws, "crates/core/src/lib.rs", "pub struct Core;");

        let plan = plan_manifest(&ws.join("Cargo.toml"), &[], AnalyzeOptions::default()).unwrap();
        assert_eq!(plan.labels(), vec!["src/lib.rs", "crates/core/src/lib.rs"]);

        let agg = crate::aggregate::Aggregator::new(plan.root_name.clone());
        let sink = crate::aggregate::CollectingSink::new();
        agg.run(&plan.producers, &crate::aggregate::CancelToken::new(), &sink).unwrap();
        let root = agg.finish();
        let top = root.find(&["rootpkg", "crate"]).unwrap();
        assert_eq!(top.line_texts(), vec!["Function () top() [public]"]);
        assert!(top.child("Core").is_none());
        assert!(root.find(&["core", "crate", "Core"]).is_some());
    }
}
