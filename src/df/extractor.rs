use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{DfError, Result};
use crate::io::{LocalFileReader, ReadAt};

use super::inflate::inflate_to;
use super::parser::DfParser;
use super::structures::{DirectoryEntry, DirectoryKind, is_nested_archive_name};

/// Default destination root, relative to the working directory
pub const DEFAULT_DEST_ROOT: &str = "data";

/// Default limit on how many nested archives deep extraction goes.
///
/// The format itself puts no bound on nesting; the limit stops archives that
/// (directly or not) contain themselves.
pub const DEFAULT_MAX_DEPTH: usize = 16;

const SEPARATORS: &[char] = &['/', '\\'];

/// Settings for one extraction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Every output path is resolved below this directory
    pub dest_root: PathBuf,
    /// Nested archives deeper than this are left packed
    pub max_depth: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            dest_root: PathBuf::from(DEFAULT_DEST_ROOT),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Counters for an extraction pass, nested archives included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Files written to disk
    pub extracted: usize,
    /// Of those, how many were inflated
    pub compressed: usize,
    /// Of those, how many were cut short by the end of their host stream
    pub truncated: usize,
    /// Entries that produced no file
    pub skipped: usize,
    /// Nested archives whose directory was unpacked
    pub archives: usize,
}

impl ExtractionReport {
    fn merge(&mut self, other: ExtractionReport) {
        self.extracted += other.extracted;
        self.compressed += other.compressed;
        self.truncated += other.truncated;
        self.skipped += other.skipped;
        self.archives += other.archives;
    }
}

/// A file written for one directory entry
#[derive(Debug)]
struct ExtractedFile {
    path: PathBuf,
    written: u64,
    compressed: bool,
    truncated: bool,
}

impl ExtractedFile {
    /// Whether the file as written carries the `.DF` extension
    fn is_nested_archive(&self) -> bool {
        self.path
            .file_name()
            .is_some_and(|name| is_nested_archive_name(&name.to_string_lossy()))
    }
}

/// DF archive extractor
///
/// Entries are processed strictly in directory order, so when two entries
/// map to the same output path the later one wins.
pub struct DfExtractor {
    options: ExtractOptions,
}

impl DfExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Extract the root archive at `archive` into the destination root
    pub async fn extract_file(&self, archive: &Path) -> Result<ExtractionReport> {
        let reader: Arc<dyn ReadAt> = Arc::new(LocalFileReader::new(archive)?);
        fs::create_dir_all(&self.options.dest_root).await?;

        let parser = DfParser::new(reader);
        self.extract_directory(&parser, DirectoryKind::Root, 0, Some(archive))
            .await
    }

    /// Extract an archive of the given layout from any host stream
    ///
    /// Only failures to read the directory itself are returned; problems with
    /// individual entries or nested archives are logged and counted in the
    /// report.
    pub async fn extract_from(
        &self,
        reader: Arc<dyn ReadAt>,
        kind: DirectoryKind,
    ) -> Result<ExtractionReport> {
        fs::create_dir_all(&self.options.dest_root).await?;

        let parser = DfParser::new(reader);
        self.extract_directory(&parser, kind, 0, None).await
    }

    async fn extract_directory(
        &self,
        parser: &DfParser<dyn ReadAt>,
        kind: DirectoryKind,
        depth: usize,
        host: Option<&Path>,
    ) -> Result<ExtractionReport> {
        let entries = parser.read_directory(kind).await?;
        let mut report = ExtractionReport::default();

        for entry in &entries {
            match kind {
                DirectoryKind::Root => info!("Extracting file {}", entry.name()),
                DirectoryKind::Nested => info!("Unpacking file {}", entry.name()),
            }

            let extracted = match self.extract_entry(parser, entry, host).await {
                Ok(extracted) => extracted,
                Err(e) => {
                    if e.is_entry_level() {
                        warn!("Skipping {}: {}", entry.name(), e);
                    } else {
                        error!("Can't extract {}: {}", entry.name(), e);
                    }
                    report.skipped += 1;
                    continue;
                }
            };

            report.extracted += 1;
            report.compressed += extracted.compressed as usize;
            report.truncated += extracted.truncated as usize;
            debug!(
                "Wrote {} bytes to {}",
                extracted.written,
                extracted.path.display()
            );

            if extracted.is_nested_archive() {
                if depth >= self.options.max_depth {
                    error!(
                        "Not unpacking {}: nested more than {} levels deep",
                        entry.name(),
                        self.options.max_depth
                    );
                    continue;
                }

                match self.extract_nested(&extracted.path, depth + 1).await {
                    Ok(nested) => {
                        report.archives += 1;
                        report.merge(nested);
                    }
                    Err(e) => error!("Can't unpack {}: {}", entry.name(), e),
                }
            }
        }

        Ok(report)
    }

    /// Reopen a freshly written `.DF` file and extract its entries into the
    /// same destination root
    async fn extract_nested(&self, path: &Path, depth: usize) -> Result<ExtractionReport> {
        let reader: Arc<dyn ReadAt> = Arc::new(LocalFileReader::new(path)?);
        let parser = DfParser::new(reader);

        Box::pin(self.extract_directory(&parser, DirectoryKind::Nested, depth, Some(path))).await
    }

    /// Resolve, classify and write a single entry
    async fn extract_entry(
        &self,
        parser: &DfParser<dyn ReadAt>,
        entry: &DirectoryEntry,
        host: Option<&Path>,
    ) -> Result<ExtractedFile> {
        let path = output_path(&self.options.dest_root, entry.name())?;
        let payload = parser.resolve_payload(entry.offset(), entry.size()).await?;

        if host == Some(path.as_path()) {
            warn!(
                "{} overwrites the archive it is read from; later entries of {} may be corrupt",
                entry.name(),
                path.display()
            );
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let compressed = payload.is_compressed();
        let truncated = payload.is_truncated();

        let mut file = fs::File::create(&path).await?;
        let written = if compressed {
            inflate_to(payload.data, &mut file).await?
        } else {
            file.write_all(&payload.data).await?;
            payload.data.len() as u64
        };
        // Nested archives are reopened right away; the write must have landed
        file.flush().await?;

        Ok(ExtractedFile {
            path,
            written,
            compressed,
            truncated,
        })
    }
}

/// Map an entry name onto a path below `root`.
///
/// Both `/` and `\` separate components. Empty and `.` components are
/// dropped; parent references, rooted names and drive prefixes are refused.
pub fn output_path(root: &Path, name: &str) -> Result<PathBuf> {
    let refuse = || DfError::UnsafePath(name.to_string());

    if name.starts_with(SEPARATORS) {
        return Err(refuse());
    }

    let mut relative = PathBuf::new();
    for part in name.split(SEPARATORS) {
        match part {
            "" | "." => continue,
            ".." => return Err(refuse()),
            part if part.contains(':') => return Err(refuse()),
            part => relative.push(part),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(refuse());
    }

    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_nested_names() {
        let root = Path::new("data");
        assert_eq!(output_path(root, "ICO.DF").unwrap(), root.join("ICO.DF"));
        assert_eq!(
            output_path(root, "tex/field/wall.tm2").unwrap(),
            root.join("tex").join("field").join("wall.tm2")
        );
    }

    #[test]
    fn backslashes_and_dot_components_normalize() {
        let root = Path::new("data");
        assert_eq!(
            output_path(root, "MAP\\.\\STAGE01.BIN").unwrap(),
            root.join("MAP").join("STAGE01.BIN")
        );
        assert_eq!(
            output_path(root, "a//b").unwrap(),
            root.join("a").join("b")
        );
    }

    #[test]
    fn escaping_names_are_refused() {
        let root = Path::new("data");
        for name in ["../evil", "a/../../evil", "..\\evil", "/etc/passwd", "\\x", "C:evil", ""] {
            assert!(
                matches!(output_path(root, name), Err(DfError::UnsafePath(_))),
                "{name:?} should be refused"
            );
        }
    }

    #[test]
    fn report_merge_adds_counters() {
        let mut report = ExtractionReport {
            extracted: 2,
            skipped: 1,
            ..Default::default()
        };
        report.merge(ExtractionReport {
            extracted: 3,
            compressed: 1,
            truncated: 1,
            skipped: 0,
            archives: 1,
        });
        assert_eq!(report.extracted, 5);
        assert_eq!(report.compressed, 1);
        assert_eq!(report.truncated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.archives, 1);
    }
}
