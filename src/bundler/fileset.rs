//! File set computation and the transform-and-copy engine.
//!
//! A [`FileSet`] is the ordered list of files one [`PatternMatcher`] selected,
//! together with the destination they are copied (or packed) to. Sets are
//! computed on the blocking pool and copied on the async runtime.

use super::{
    Error, ErrorExt, Result,
    matcher::{ALL_FILES_PATTERN, MacroExpander, PatternMatcher, SharedExcludes, get_file_matchers},
    settings::FilePattern,
    transformer::{FileTransformer, Transformed},
    utils::fs,
};
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

/// Directory holding third-party modules of the application.
pub const NODE_MODULES_DIR: &str = "node_modules";

/// Files never shipped from third-party modules, evaluated after user rules.
pub const NODE_MODULES_DENYLIST: &[&str] = &[
    "**/{test,tests,__tests__,powered-test,example,examples,doc,docs,website,coverage}{,/**/*}",
    "**/{CHANGELOG,ChangeLog,changelog,HISTORY,History,history,AUTHORS,CONTRIBUTORS}{,.md,.txt}",
    "**/{README,readme,Readme}{,.md,.markdown,.txt}",
    "**/*.{map,ts,tsx,flow,mts,cts}",
    "**/*.d.ts",
    "**/{.DS_Store,.git,.hg,.svn,CVS,RCS,SCCS,.idea,.vs,.vscode,.nyc_output}{,/**/*}",
    "**/{.gitignore,.gitattributes,.npmignore,.editorconfig,.eslintrc,.jshintrc,.travis.yml,appveyor.yml,circle.yml}",
    "**/{package-lock.json,yarn.lock,pnpm-lock.yaml,.yarn-integrity,.yarn-metadata.json}",
    "**/*.log",
    "**/._*",
];

// Appended to the user's application file patterns
const DEFAULT_APP_EXCLUDES: &[&str] = &[
    "!**/node_modules{,/**/*}",
    "!**/{.DS_Store,.git,.hg,.svn,CVS,RCS,SCCS,__pycache__,.idea,.vs,.vscode,.nyc_output}{,/**/*}",
    "!**/{.gitignore,.gitattributes,.editorconfig,.flowconfig,thumbs.db}",
    "!**/{appveyor.yml,.travis.yml,circle.yml}",
    "!**/{npm-debug.log,yarn.lock,.yarn-integrity,.yarn-metadata.json}",
    "!**/._*",
];

/// One selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute source path
    pub path: PathBuf,
    /// Destination path relative to [`FileSet::destination`]
    pub relative: PathBuf,
    /// File type and size
    pub kind: FileKind,
}

/// What a [`FileEntry`] is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file
    File {
        /// Size in bytes
        size: u64,
    },
    /// Symbolic link, recreated rather than followed
    Symlink {
        /// Link target as stored in the link
        target: PathBuf,
    },
}

/// Files selected by one matcher.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    /// Source directory
    pub src: PathBuf,
    /// Destination directory
    pub destination: PathBuf,
    /// Files in walk order
    pub files: Vec<FileEntry>,
    /// Eagerly transformed files, by index into `files`
    pub transformed: HashMap<usize, Transformed>,
}

impl FileSet {
    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of regular files.
    pub fn regular_file_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.kind, FileKind::File { .. }))
            .count()
    }
}

/// Builds the application file matchers.
///
/// User `files` patterns (or `**/*` when there are none or only
/// exclusions) come first, followed by the default exclusions. The output
/// directory is excluded when it lies inside the application directory.
pub fn get_main_file_matchers(
    app_dir: &Path,
    destination: &Path,
    patterns: &[FilePattern],
    out_dir: &Path,
    expander: &MacroExpander,
) -> Result<Vec<PatternMatcher>> {
    let mut matchers = get_file_matchers(patterns, app_dir, destination, expander)?;
    if matchers.first().is_none_or(|m| m.from != app_dir) {
        matchers.insert(0, PatternMatcher::new(app_dir, destination, expander.clone(), &[])?);
    }

    let main = &mut matchers[0];
    if main.is_empty() || main.contains_only_ignore() {
        main.prepend_pattern(ALL_FILES_PATTERN)?;
    }
    for pattern in DEFAULT_APP_EXCLUDES {
        main.add_pattern(pattern)?;
    }
    if let Ok(relative_out) = out_dir.strip_prefix(app_dir)
        && !relative_out.as_os_str().is_empty()
    {
        let relative_out = super::matcher::to_slash(relative_out);
        main.add_pattern(&format!("!{}{{,/**/*}}", glob::Pattern::escape(&relative_out)))?;
    }

    Ok(matchers)
}

/// Builds the matcher for `<app_dir>/node_modules`.
///
/// User patterns addressing `node_modules/...` are applied relative to the
/// module directory; the fixed denylist runs after them.
pub fn get_node_module_file_matcher(
    app_dir: &Path,
    destination: &Path,
    patterns: &[FilePattern],
    expander: &MacroExpander,
) -> Result<PatternMatcher> {
    let mut matcher = PatternMatcher::new(
        app_dir.join(NODE_MODULES_DIR),
        destination.join(NODE_MODULES_DIR),
        expander.clone(),
        &[ALL_FILES_PATTERN.to_string()],
    )?;

    let prefix = format!("{NODE_MODULES_DIR}/");
    for pattern in patterns {
        let FilePattern::Pattern(pattern) = pattern else {
            continue;
        };
        let (negate, body) = match pattern.strip_prefix('!') {
            Some(body) => ("!", body),
            None => ("", pattern.as_str()),
        };
        if let Some(rest) = body.strip_prefix(&prefix) {
            matcher.add_pattern(&format!("{negate}{rest}"))?;
        }
    }
    Ok(matcher)
}

/// Walks every matcher and returns the selected files.
///
/// Sets come back in matcher order; a destination already taken by an
/// earlier set is skipped. Empty sets are kept and filtered by the caller.
pub async fn compute_file_sets(matchers: &[PatternMatcher]) -> Result<Vec<FileSet>> {
    compute_file_sets_with_denylist(matchers, &[]).await
}

/// Computes the module file set with [`NODE_MODULES_DENYLIST`] applied.
pub async fn compute_node_module_file_sets(matcher: &PatternMatcher) -> Result<Vec<FileSet>> {
    compute_file_sets_with_denylist(std::slice::from_ref(matcher), NODE_MODULES_DENYLIST).await
}

async fn compute_file_sets_with_denylist(
    matchers: &[PatternMatcher],
    denylist: &'static [&'static str],
) -> Result<Vec<FileSet>> {
    let matchers = matchers.to_vec();
    tokio::task::spawn_blocking(move || {
        let mut seen = HashSet::new();
        let mut sets = Vec::with_capacity(matchers.len());
        for matcher in &matchers {
            let mut set = walk_matcher(matcher, denylist)?;
            set.files
                .retain(|f| seen.insert(set.destination.join(&f.relative)));
            sets.push(set);
        }
        Ok(sets)
    })
    .await
    .map_err(|e| Error::GenericError(format!("File set computation panicked: {e}")))?
}

fn walk_matcher(matcher: &PatternMatcher, denylist: &[&str]) -> Result<FileSet> {
    let metadata = match std::fs::symlink_metadata(&matcher.from) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("skipped copying {}: doesn't exist", matcher.from.display());
            return Ok(FileSet {
                src: matcher.from.clone(),
                destination: matcher.to.clone(),
                ..Default::default()
            });
        }
        Err(e) => return Err(e).fs_context("reading metadata", &matcher.from),
    };

    if !metadata.is_dir() {
        // A single file maps onto `to` itself
        let relative = matcher
            .to
            .file_name()
            .or_else(|| matcher.from.file_name())
            .map(PathBuf::from)
            .unwrap_or_default();
        let destination = matcher.to.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(FileSet {
            src: matcher.from.parent().map(Path::to_path_buf).unwrap_or_default(),
            destination,
            files: vec![FileEntry {
                kind: entry_kind(&matcher.from, &metadata)?,
                path: matcher.from.clone(),
                relative,
            }],
            transformed: HashMap::new(),
        });
    }

    let filter = matcher.create_filter()?.with_trailing_denylist(denylist)?;
    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(&matcher.from)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || filter.should_descend(e.path()));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() || !filter.accepts(entry.path()) {
            continue;
        }
        let metadata = entry.path().symlink_metadata().fs_context("reading metadata", entry.path())?;
        files.push(FileEntry {
            relative: entry.path().strip_prefix(&matcher.from)?.to_path_buf(),
            kind: entry_kind(entry.path(), &metadata)?,
            path: entry.into_path(),
        });
    }

    Ok(FileSet {
        src: matcher.from.clone(),
        destination: matcher.to.clone(),
        files,
        transformed: HashMap::new(),
    })
}

fn entry_kind(path: &Path, metadata: &std::fs::Metadata) -> Result<FileKind> {
    if metadata.file_type().is_symlink() {
        let target = std::fs::read_link(path).fs_context("reading symlink", path)?;
        Ok(FileKind::Symlink { target })
    } else {
        Ok(FileKind::File { size: metadata.len() })
    }
}

/// Runs `transformer` over every regular file and stores the results in
/// [`FileSet::transformed`].
pub async fn transform_files(transformer: &FileTransformer, file_set: &mut FileSet) -> Result<()> {
    let transformer = transformer.clone();
    let files = file_set.files.clone();
    let transformed = tokio::task::spawn_blocking(move || {
        let mut transformed = HashMap::new();
        for (index, file) in files.iter().enumerate() {
            if !matches!(file.kind, FileKind::File { .. }) {
                continue;
            }
            if let Some(result) = apply(&transformer, &file.path)? {
                transformed.insert(index, result);
            }
        }
        Ok::<_, Error>(transformed)
    })
    .await
    .map_err(|e| Error::GenericError(format!("Transform task panicked: {e}")))??;

    file_set.transformed.extend(transformed);
    Ok(())
}

fn apply(transformer: &FileTransformer, path: &Path) -> Result<Option<Transformed>> {
    transformer(path).map_err(|source| Error::Transform {
        path: path.to_path_buf(),
        source,
    })
}

/// Copies a file set to its destination, applying `transformer` to every
/// file that was not transformed eagerly. Symlinks are recreated.
pub async fn copy_app_files(file_set: &FileSet, transformer: Option<&FileTransformer>) -> Result<()> {
    for (index, file) in file_set.files.iter().enumerate() {
        let dest = file_set.destination.join(&file.relative);

        if let FileKind::Symlink { target } = &file.kind {
            fs::copy_symlink(&file.path, target, &dest).await?;
            continue;
        }

        let transformed = match file_set.transformed.get(&index) {
            Some(result) => Some(result.clone()),
            None => match transformer {
                Some(transformer) => apply(transformer, &file.path)?,
                None => None,
            },
        };

        match transformed {
            Some(Transformed::Content(bytes)) => fs::write_file(&dest, &bytes).await?,
            Some(Transformed::Destination(replacement)) => fs::copy_file(&replacement, &dest).await?,
            None => fs::copy_file(&file.path, &dest).await?,
        }
    }
    Ok(())
}

/// Copies extra file groups (`extra_resources`, `extra_files`).
///
/// Matchers without include patterns select everything below their source.
pub async fn copy_files(matchers: &[PatternMatcher], transformer: Option<&FileTransformer>) -> Result<()> {
    let mut prepared = Vec::with_capacity(matchers.len());
    for matcher in matchers {
        let mut matcher = matcher.clone();
        if matcher.is_empty() || matcher.contains_only_ignore() {
            matcher.prepend_pattern(ALL_FILES_PATTERN)?;
        }
        prepared.push(matcher);
    }

    for file_set in compute_file_sets(&prepared).await? {
        if file_set.is_empty() {
            continue;
        }
        log::debug!(
            "copying {} files from {} to {}",
            file_set.files.len(),
            file_set.src.display(),
            file_set.destination.display()
        );
        copy_app_files(&file_set, transformer).await?;
    }
    Ok(())
}

/// Builds shared excludes from every extra group matcher.
pub fn shared_excludes(groups: &[&[PatternMatcher]], root_dir: &Path) -> Result<Option<Arc<SharedExcludes>>> {
    let mut patterns = Vec::new();
    for matcher in groups.iter().flat_map(|g| g.iter()) {
        matcher.compute_parsed_patterns(&mut patterns, root_dir)?;
    }
    Ok((!patterns.is_empty()).then(|| Arc::new(SharedExcludes::new(root_dir, patterns))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> MacroExpander {
        Arc::new(|s: &str| Ok(s.to_string()))
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel).unwrap();
    }

    fn relatives(set: &FileSet) -> Vec<String> {
        set.files
            .iter()
            .map(|f| super::super::matcher::to_slash(&f.relative))
            .collect()
    }

    #[tokio::test]
    async fn main_matchers_skip_modules_and_vcs() {
        let app = tempfile::tempdir().unwrap();
        for file in ["index.js", "lib/a.js", "lib/a.js.map", "node_modules/dep/index.js", ".git/HEAD"] {
            touch(app.path(), file);
        }

        let patterns = vec![
            FilePattern::Pattern("**/*".into()),
            FilePattern::Pattern("!**/*.map".into()),
        ];
        let matchers = get_main_file_matchers(
            app.path(),
            Path::new("/out/app"),
            &patterns,
            &app.path().join("dist"),
            &identity(),
        )
        .unwrap();
        let sets = compute_file_sets(&matchers).await.unwrap();
        assert_eq!(relatives(&sets[0]), ["index.js", "lib/a.js"]);
    }

    #[tokio::test]
    async fn output_dir_inside_app_is_excluded() {
        let app = tempfile::tempdir().unwrap();
        touch(app.path(), "index.js");
        touch(app.path(), "dist/linux-unpacked/index.js");

        let matchers =
            get_main_file_matchers(app.path(), Path::new("/out"), &[], &app.path().join("dist"), &identity())
                .unwrap();
        let sets = compute_file_sets(&matchers).await.unwrap();
        assert_eq!(relatives(&sets[0]), ["index.js"]);
    }

    #[tokio::test]
    async fn node_module_denylist_applies_after_user_rules() {
        let app = tempfile::tempdir().unwrap();
        for file in [
            "node_modules/dep/index.js",
            "node_modules/dep/README.md",
            "node_modules/dep/test/spec.js",
            "node_modules/dep/index.d.ts",
            "node_modules/other/lib.js",
        ] {
            touch(app.path(), file);
        }

        let patterns = vec![FilePattern::Pattern("!node_modules/other{,/**/*}".into())];
        let matcher =
            get_node_module_file_matcher(app.path(), Path::new("/out/app"), &patterns, &identity()).unwrap();
        let sets = compute_node_module_file_sets(&matcher).await.unwrap();
        assert_eq!(relatives(&sets[0]), ["dep/index.js"]);
    }

    #[tokio::test]
    async fn copies_with_transformer_and_keeps_symlinks() {
        let app = tempfile::tempdir().unwrap();
        touch(app.path(), "a.txt");
        touch(app.path(), "b.txt");
        #[cfg(unix)]
        std::os::unix::fs::symlink("a.txt", app.path().join("link")).unwrap();

        let out = tempfile::tempdir().unwrap();
        let matcher =
            PatternMatcher::new(app.path(), out.path(), identity(), &["**/*".to_string()]).unwrap();
        let sets = compute_file_sets(&[matcher]).await.unwrap();

        let transformer: FileTransformer = Arc::new(|p: &Path| {
            Ok(p.ends_with("a.txt").then(|| Transformed::Content(b"changed".to_vec())))
        });
        copy_app_files(&sets[0], Some(&transformer)).await.unwrap();

        assert_eq!(std::fs::read_to_string(out.path().join("a.txt")).unwrap(), "changed");
        assert_eq!(std::fs::read_to_string(out.path().join("b.txt")).unwrap(), "b.txt");
        #[cfg(unix)]
        assert!(std::fs::symlink_metadata(out.path().join("link")).unwrap().file_type().is_symlink());
    }

    #[tokio::test]
    async fn transformer_failure_names_the_file() {
        let app = tempfile::tempdir().unwrap();
        touch(app.path(), "bad.txt");
        let matcher = PatternMatcher::new(app.path(), "/unused", identity(), &["**/*".to_string()]).unwrap();
        let mut sets = compute_file_sets(&[matcher]).await.unwrap();

        let transformer: FileTransformer = Arc::new(|_: &Path| anyhow::bail!("cannot parse"));
        match transform_files(&transformer, &mut sets[0]).await.unwrap_err() {
            Error::Transform { path, .. } => assert!(path.ends_with("bad.txt")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn single_file_source_maps_to_destination_file() {
        let project = tempfile::tempdir().unwrap();
        touch(project.path(), "LICENSE");
        let out = tempfile::tempdir().unwrap();

        let entries = vec![FilePattern::Set {
            from: Some("LICENSE".into()),
            to: Some("LICENSE.txt".into()),
            filter: vec![],
        }];
        let matchers = get_file_matchers(&entries, project.path(), out.path(), &identity()).unwrap();
        copy_files(&matchers, None).await.unwrap();
        assert!(out.path().join("LICENSE.txt").is_file());
    }
}
