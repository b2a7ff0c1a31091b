//! Incremental updates: delta computation and targeted index refresh.
//!
//! Every scenario applies a change to an on-disk workspace and checks the
//! result against a fresh full build of the same files.

use std::fs;
use std::path::{Path, PathBuf};

use rstest::rstest;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tsresolve::ide::{Analysis, AnalysisHost, FileEvent};
use tsresolve::project::IndexConfig;

const BASE: &[(&str, &str)] = &[
    ("src/a.ts", "export class Foo {}\nexport const limit: number = 3;"),
    ("src/b.ts", "export * from './a';"),
    ("src/c.ts", "export { Foo as Renamed } from './b';"),
    ("src/other.ts", "export interface Unrelated {}"),
    ("typings/env.d.ts", "declare module 'env' { export const mode: string; }"),
    ("node_modules/lodash/index.d.ts", "export declare function map(): void;"),
];

struct Workspace {
    dir: TempDir,
    host: AnalysisHost,
}

impl Workspace {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (relative, text) in files {
            write(dir.path(), relative, text);
        }
        let mut host = AnalysisHost::new(IndexConfig::new(dir.path()));
        host.build_workspace(&CancellationToken::new()).unwrap();
        Self { dir, host }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn write(&self, relative: &str, text: &str) -> FileEvent {
        let existed = self.path(relative).exists();
        write(self.dir.path(), relative, text);
        if existed {
            FileEvent::changed(self.path(relative))
        } else {
            FileEvent::created(self.path(relative))
        }
    }

    fn delete(&self, relative: &str) -> FileEvent {
        fs::remove_file(self.path(relative)).unwrap();
        FileEvent::deleted(self.path(relative))
    }

    fn apply(&mut self, events: &[FileEvent]) {
        self.host
            .apply_changes(events, &CancellationToken::new())
            .unwrap();
    }

    fn froms(&self, name: &str) -> Vec<String> {
        self.host
            .analysis()
            .query(name)
            .iter()
            .map(|info| info.from.to_string())
            .collect()
    }

    /// Index contents of a fresh full build of the same directory.
    fn rebuilt(&self) -> Vec<(String, String, String)> {
        let mut fresh = AnalysisHost::new(IndexConfig::new(self.dir.path()));
        fresh.build_workspace(&CancellationToken::new()).unwrap();
        surface(&fresh.analysis())
    }
}

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn surface(analysis: &Analysis) -> Vec<(String, String, String)> {
    analysis
        .declaration_infos()
        .into_iter()
        .map(|info| {
            (
                info.declaration.name().to_string(),
                info.from.to_string(),
                info.declaration.kind().to_string(),
            )
        })
        .collect()
}

#[test]
fn test_deletion_cascade() {
    let mut ws = Workspace::new(BASE);
    assert_eq!(ws.froms("Foo"), vec!["/src/b"]);

    let event = ws.delete("src/a.ts");
    let delta = ws.host.delta_files(std::slice::from_ref(&event));
    assert!(delta.removed.contains(&ws.path("src/a.ts")));
    assert!(delta.reparse.contains(&ws.path("src/b.ts")));
    assert!(delta.reparse.contains(&ws.path("src/c.ts")));
    assert!(!delta.reparse.contains(&ws.path("src/other.ts")));

    ws.apply(&[event]);
    assert!(ws.froms("Foo").is_empty());
    assert!(ws.froms("Renamed").is_empty());
    assert_eq!(ws.froms("Unrelated"), vec!["/src/other"]);
}

#[test]
fn test_unrelated_change_has_small_delta() {
    let ws = Workspace::new(BASE);
    let event = ws.write("src/other.ts", "export interface Unrelated { x: number }");

    let delta = ws.host.delta_files(&[event]);
    assert_eq!(delta.reparse.len(), 1);
    assert!(delta.removed.is_empty());
}

#[rstest]
#[case::add_declaration("src/a.ts", "export class Foo {}\nexport class Added {}")]
#[case::drop_export("src/a.ts", "class Foo {}\nexport const limit: number = 3;")]
#[case::retarget_alias("src/c.ts", "export { limit as Renamed } from './b';")]
#[case::new_reexporter("src/d.ts", "export * from './c';")]
#[case::typings_module("typings/env.d.ts", "declare module 'environment' { export const mode: string; }")]
#[case::library_surface("node_modules/lodash/index.d.ts", "export declare function filter(): void;")]
#[case::broken_file("src/b.ts", "export * from './a'; export {")]
fn test_refresh_equals_full_build(#[case] relative: &str, #[case] text: &str) {
    let mut ws = Workspace::new(BASE);
    let event = ws.write(relative, text);
    ws.apply(&[event]);

    assert_eq!(surface(&ws.host.analysis()), ws.rebuilt());
}

#[test]
fn test_mixed_batch_equals_full_build() {
    let mut ws = Workspace::new(BASE);
    let events = [
        ws.write("src/e.ts", "export class Fresh {}"),
        ws.write("src/b.ts", "export * from './a';\nexport * from './e';"),
        ws.delete("src/other.ts"),
    ];
    ws.apply(&events);

    assert_eq!(ws.froms("Fresh"), vec!["/src/b"]);
    assert!(ws.froms("Unrelated").is_empty());
    assert_eq!(surface(&ws.host.analysis()), ws.rebuilt());
}

#[test]
fn test_repeated_changes_stay_consistent() {
    let mut ws = Workspace::new(BASE);
    for round in 0..3 {
        let text = format!("export class Foo {{}}\nexport class Round{round} {{}}");
        let event = ws.write("src/a.ts", &text);
        ws.apply(&[event]);
    }

    assert!(ws.froms("Round0").is_empty());
    assert_eq!(ws.froms("Round2"), vec!["/src/b"]);
    assert_eq!(surface(&ws.host.analysis()), ws.rebuilt());
}
