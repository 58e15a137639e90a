//! Writing compiled units to disk.
//!
//! Each unit lands in `<dir>/<Name>.cs`. Writes go through a temporary file
//! in the same directory and a rename, so a reader never sees a partial
//! file. A file whose content hash already matches the unit's fingerprint is
//! left untouched, which keeps modification times stable for editors and
//! asset importers watching the directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::CodegenError;
use crate::CompiledUnit;

/// File extension of generated sources.
pub const SOURCE_EXTENSION: &str = "cs";

/// Path `unit` is written to inside `dir`.
pub fn unit_path(unit: &CompiledUnit, dir: &Path) -> PathBuf {
    dir.join(format!("{}.{SOURCE_EXTENSION}", unit.name))
}

/// Writes `unit` into `dir`. Returns the path and whether the file changed.
pub fn write_unit(unit: &CompiledUnit, dir: &Path) -> Result<(PathBuf, bool), CodegenError> {
    let path = unit_path(unit, dir);
    if let Ok(existing) = std::fs::read(&path) {
        if blake3::hash(&existing).to_hex().as_str() == unit.fingerprint {
            debug!(path = %path.display(), "unchanged, skipping write");
            return Ok((path, false));
        }
    }

    std::fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(unit.source.as_bytes())?;
    file.flush()?;
    file.persist(&path).map_err(|err| err.error)?;
    debug!(path = %path.display(), bytes = unit.source.len(), "wrote unit");
    Ok((path, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fingerprint;

    fn unit(name: &str, source: &str) -> CompiledUnit {
        CompiledUnit {
            name: name.to_string(),
            source: source.to_string(),
            fingerprint: fingerprint(source),
            diagnostics: Vec::new(),
            compilation_time_ms: 0,
        }
    }

    #[test]
    fn writes_then_skips_identical_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let first = unit("Mover", "struct Mover {}\n");

        let (path, changed) = write_unit(&first, temp_dir.path()).unwrap();
        assert!(changed);
        assert_eq!(path, temp_dir.path().join("Mover.cs"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first.source);

        let (_, changed) = write_unit(&first, temp_dir.path()).unwrap();
        assert!(!changed);
    }

    #[test]
    fn rewrites_changed_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_unit(&unit("Mover", "struct Mover {}\n"), temp_dir.path()).unwrap();

        let second = unit("Mover", "struct Mover { int x; }\n");
        let (path, changed) = write_unit(&second, temp_dir.path()).unwrap();
        assert!(changed);
        assert_eq!(std::fs::read_to_string(path).unwrap(), second.source);
    }

    #[test]
    fn creates_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("Generated").join("Systems");
        let (path, changed) = write_unit(&unit("A", "class A {}\n"), &nested).unwrap();
        assert!(changed);
        assert!(path.exists());
    }
}
