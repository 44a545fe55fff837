//! Archive codec: flat workspace directory ⇄ packed archive.
//!
//! ## Encode
//!
//! 1. List the regular files directly under the workspace (subdirectories,
//!    ignored suffixes, the workspace guide and leftover temporaries are
//!    skipped), sorted by name.
//! 2. Parse the manifest as JSON purely to validate it; a parse failure aborts
//!    the whole encode with [`CodecError::ManifestSyntax`].
//! 3. Store every file uncompressed, keyed by name, with a fixed timestamp so
//!    that an unchanged workspace always packs to identical bytes.
//!
//! ## Decode
//!
//! Unpacks every non-directory entry. The manifest is re-indented when it
//! parses and written raw when it does not; validation is deferred to encode.
//! Each file is written to a temporary sibling and renamed into place, so the
//! watcher never stats a half-written file.

use std::fs;
use std::io::{Cursor, Read as _, Write as _};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::archive::Archive;
use crate::error::{io_err, CodecError};

/// Name of the distinguished JSON entry describing the project.
pub const MANIFEST_NAME: &str = "project.json";

/// Workspace guide note, refreshed at startup and never packed.
pub const GUIDE_NAME: &str = "LIVESYNC.md";

const TMP_SUFFIX: &str = ".livesync.tmp";

/// Options controlling which workspace files are packed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// File-name suffixes to leave out of the archive (e.g. `.md`).
    pub ignore_suffixes: Vec<String>,
}

impl EncodeOptions {
    fn is_ignored(&self, name: &str) -> bool {
        if name == GUIDE_NAME || name.ends_with(TMP_SUFFIX) {
            return true;
        }
        self.ignore_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && name.ends_with(suffix.as_str()))
    }
}

/// What a decode wrote to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub written: Vec<PathBuf>,
    /// Entries refused because their names would escape the workspace.
    pub skipped: Vec<String>,
    /// `false` when the manifest was present but not valid JSON.
    pub manifest_canonical: bool,
}

/// Pack the workspace at `root` into an [`Archive`].
pub fn encode(root: &Path, options: &EncodeOptions) -> Result<Archive, CodecError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| io_err(root, e))? {
        let entry = entry.map_err(|e| io_err(root, e))?;
        let path = entry.path();
        let file_type = fs::metadata(&path).map_err(|e| io_err(&path, e))?.file_type();
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if options.is_ignored(&name) {
            continue;
        }
        files.push((name, path));
    }
    files.sort();

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default());

    for (name, path) in files {
        let content = fs::read(&path).map_err(|e| io_err(&path, e))?;
        if name == MANIFEST_NAME {
            validate_manifest(&content)?;
        }
        zip.start_file(name.as_str(), stored)?;
        zip.write_all(&content).map_err(|e| io_err(&path, e))?;
    }

    let packed = zip.finish()?.into_inner();
    tracing::debug!(bytes = packed.len(), root = %root.display(), "encoded workspace");
    Ok(Archive::from_bytes(packed))
}

/// Unpack `archive` into the workspace at `root`, creating it if absent.
pub fn decode(root: &Path, archive: &[u8]) -> Result<DecodeReport, CodecError> {
    fs::create_dir_all(root).map_err(|e| io_err(root, e))?;

    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut report = DecodeReport {
        manifest_canonical: true,
        ..DecodeReport::default()
    };

    for index in 0..zip.len() {
        let mut file = zip.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let Some(relative) = file.enclosed_name() else {
            tracing::warn!(entry = %name, "skipping archive entry outside workspace");
            report.skipped.push(name);
            continue;
        };
        let out_path = root.join(relative);

        // The declared size comes from the archive itself; don't pre-allocate from it.
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| io_err(&out_path, e))?;

        if name == MANIFEST_NAME {
            match canonicalize_manifest(&content) {
                Some(pretty) => content = pretty,
                None => {
                    tracing::warn!("project.json is not valid JSON; writing it unchanged");
                    report.manifest_canonical = false;
                }
            }
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        atomic_write(&out_path, &content)?;
        report.written.push(out_path);
    }

    tracing::info!(files = report.written.len(), root = %root.display(), "extracted archive to workspace");
    Ok(report)
}

/// Write `content` to a temporary sibling of `path`, then rename it over `path`.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<(), CodecError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, err));
    }
    Ok(())
}

/// Parse `content` as JSON; the error message is carried verbatim.
pub fn validate_manifest(content: &[u8]) -> Result<(), CodecError> {
    serde_json::from_slice::<serde_json::Value>(content)
        .map(|_| ())
        .map_err(|err| CodecError::ManifestSyntax {
            message: err.to_string(),
        })
}

/// Re-indent a manifest with two-space indentation, keeping key order.
///
/// Returns `None` when `content` is not valid JSON.
pub fn canonicalize_manifest(content: &[u8]) -> Option<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_slice(content).ok()?;
    serde_json::to_vec_pretty(&value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace(files: &[(&str, &[u8])]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn encode_stores_entries_uncompressed() {
        let ws = workspace(&[(MANIFEST_NAME, b"{\"targets\":[]}"), ("a.wav", b"RIFF")]);
        let archive = encode(ws.path(), &EncodeOptions::default()).unwrap();

        let mut zip = ZipArchive::new(Cursor::new(archive.as_bytes())).unwrap();
        for index in 0..zip.len() {
            let file = zip.by_index(index).unwrap();
            assert_eq!(file.compression(), CompressionMethod::Stored);
        }
        assert_eq!(zip.len(), 2);
    }

    #[test]
    fn encode_packs_raw_manifest_bytes() {
        let raw: &[u8] = b"{ \"targets\" :[ ],\n\"meta\":{} }";
        let ws = workspace(&[(MANIFEST_NAME, raw)]);
        let archive = encode(ws.path(), &EncodeOptions::default()).unwrap();
        assert_eq!(archive.entries().unwrap()[MANIFEST_NAME], raw);
    }

    #[test]
    fn encode_rejects_broken_manifest() {
        let ws = workspace(&[(MANIFEST_NAME, b"{\"a\":}"), ("a.svg", b"<svg/>")]);
        let err = encode(ws.path(), &EncodeOptions::default()).unwrap_err();
        match err {
            CodecError::ManifestSyntax { message } => assert!(!message.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn encode_skips_subdirectories_and_ignored_suffixes() {
        let ws = workspace(&[(MANIFEST_NAME, b"{}"), ("NOTES.md", b"# notes")]);
        fs::create_dir(ws.path().join("nested")).unwrap();
        fs::write(ws.path().join("nested").join("x.svg"), b"<svg/>").unwrap();

        let options = EncodeOptions {
            ignore_suffixes: vec![".md".to_string()],
        };
        let entries = encode(ws.path(), &options).unwrap().entries().unwrap();
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec![MANIFEST_NAME]);
    }

    #[test]
    fn encode_is_deterministic() {
        let ws = workspace(&[(MANIFEST_NAME, b"{}"), ("b.png", b"png"), ("a.svg", b"svg")]);
        let first = encode(ws.path(), &EncodeOptions::default()).unwrap();
        let second = encode(ws.path(), &EncodeOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn decode_pretty_prints_manifest() {
        let src = workspace(&[(MANIFEST_NAME, b"{\"targets\":[{\"name\":\"Stage\"}]}")]);
        let archive = encode(src.path(), &EncodeOptions::default()).unwrap();

        let dest = TempDir::new().unwrap();
        let report = decode(dest.path(), archive.as_bytes()).unwrap();
        assert!(report.manifest_canonical);

        let written = fs::read_to_string(dest.path().join(MANIFEST_NAME)).unwrap();
        assert_eq!(
            written,
            "{\n  \"targets\": [\n    {\n      \"name\": \"Stage\"\n    }\n  ]\n}"
        );
    }

    #[test]
    fn decode_keeps_broken_manifest_raw() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(MANIFEST_NAME, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"{\"a\":}").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let dest = TempDir::new().unwrap();
        let report = decode(dest.path(), &bytes).unwrap();
        assert!(!report.manifest_canonical);
        assert_eq!(fs::read(dest.path().join(MANIFEST_NAME)).unwrap(), b"{\"a\":}");
    }

    #[test]
    fn decode_creates_missing_workspace() {
        let src = workspace(&[(MANIFEST_NAME, b"{}")]);
        let archive = encode(src.path(), &EncodeOptions::default()).unwrap();

        let parent = TempDir::new().unwrap();
        let root = parent.path().join("workspace");
        decode(&root, archive.as_bytes()).unwrap();
        assert!(root.join(MANIFEST_NAME).is_file());
    }

    #[test]
    fn decode_refuses_escaping_entries() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("../escape.txt", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"nope").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let parent = TempDir::new().unwrap();
        let root = parent.path().join("ws");
        let report = decode(&root, &bytes).unwrap();
        assert_eq!(report.skipped, vec!["../escape.txt".to_string()]);
        assert!(!parent.path().join("escape.txt").exists());
    }

    #[test]
    fn decode_rejects_non_archive_bytes() {
        let dest = TempDir::new().unwrap();
        let err = decode(dest.path(), b"definitely not a zip").unwrap_err();
        assert!(matches!(err, CodecError::Container(_)));
    }

    #[test]
    fn decode_replaces_files_without_leaving_temporaries() {
        let src = workspace(&[(MANIFEST_NAME, b"{\"v\":2}"), ("a.svg", b"new")]);
        let archive = encode(src.path(), &EncodeOptions::default()).unwrap();

        let dest = workspace(&[(MANIFEST_NAME, b"{\"v\":1}"), ("a.svg", b"old")]);
        decode(dest.path(), archive.as_bytes()).unwrap();

        let mut names: Vec<String> = fs::read_dir(dest.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.svg".to_string(), MANIFEST_NAME.to_string()]);
        assert_eq!(fs::read(dest.path().join("a.svg")).unwrap(), b"new");
    }

    #[test]
    fn encode_skips_guide_and_leftover_temporaries() {
        let ws = workspace(&[
            (MANIFEST_NAME, b"{}"),
            (GUIDE_NAME, b"# guide"),
            ("a.svg.livesync.tmp", b"partial"),
        ]);
        let entries = encode(ws.path(), &EncodeOptions::default())
            .unwrap()
            .entries()
            .unwrap();
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec![MANIFEST_NAME]);
    }

    #[test]
    fn decode_does_not_trust_declared_entry_size() {
        let src = workspace(&[("a.svg", b"<svg/>")]);
        let mut bytes = encode(src.path(), &EncodeOptions::default())
            .unwrap()
            .to_vec();

        // Claim ~4 GiB uncompressed in the central directory record.
        let central = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .expect("central directory header");
        bytes[central + 24..central + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

        let dest = TempDir::new().unwrap();
        decode(dest.path(), &bytes).unwrap();
        assert_eq!(fs::read(dest.path().join("a.svg")).unwrap(), b"<svg/>");
    }

    #[test]
    fn canonical_manifest_preserves_key_order() {
        let pretty = canonicalize_manifest(b"{\"z\":1,\"a\":2}").unwrap();
        assert_eq!(String::from_utf8(pretty).unwrap(), "{\n  \"z\": 1,\n  \"a\": 2\n}");
    }
}
