//! Directory conversion: every matching file in, one `<stem>.json` Bundle out.

use fhirhub_core::{ConversionEngine, ConvertOptions};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions picked up when none are given.
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["hl7", "txt"];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.converted + self.failed.len()
    }
}

/// Regular files in `dir` whose extension is one of `extensions` (case-insensitive), sorted.
pub fn input_files(dir: &Path, extensions: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Converts every input file, writing `<stem>.json` into `output_dir`.
///
/// A file that fails to read, convert or write is recorded and the run goes on. So is a file
/// whose output name was already written in this run: it is never overwritten.
pub fn run(
    engine: &ConversionEngine,
    options: &ConvertOptions,
    input_dir: &Path,
    output_dir: &Path,
    extensions: &[String],
) -> anyhow::Result<BatchSummary> {
    fs::create_dir_all(output_dir)?;
    let mut summary = BatchSummary::default();
    let mut written = HashSet::new();

    for path in input_files(input_dir, extensions)? {
        match convert_file(engine, options, &path, output_dir, &mut written) {
            Ok(out) => {
                tracing::info!(input = %path.display(), output = %out.display(), "converted");
                summary.converted += 1;
            }
            Err(err) => {
                tracing::warn!(input = %path.display(), error = %err, "conversion failed");
                summary.failed.push((path, err.to_string()));
            }
        }
    }
    Ok(summary)
}

fn convert_file(
    engine: &ConversionEngine,
    options: &ConvertOptions,
    path: &Path,
    output_dir: &Path,
    written: &mut HashSet<PathBuf>,
) -> anyhow::Result<PathBuf> {
    let out = output_path(path, output_dir)?;
    if written.contains(&out) {
        anyhow::bail!(
            "{} was already written by another input in this run",
            out.display()
        );
    }

    let raw = fs::read_to_string(path)?;
    let conversion = engine.convert(&raw, options)?;
    for diagnostic in &conversion.diagnostics {
        tracing::warn!(input = %path.display(), "{diagnostic}");
    }

    fs::write(&out, conversion.to_json_pretty()?)?;
    written.insert(out.clone());
    Ok(out)
}

/// `<output_dir>/<stem>.json`, keeping every dot of the stem (`lab.2024.hl7` → `lab.2024.json`).
fn output_path(path: &Path, output_dir: &Path) -> anyhow::Result<PathBuf> {
    let stem = path
        .file_stem()
        .ok_or_else(|| anyhow::anyhow!("{} has no file name", path.display()))?;
    Ok(output_dir.join(format!("{}.json", stem.to_string_lossy())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ADT: &str = "MSH|^~\\&|APP|FAC|||20240101||ADT^A01|1|P|2.5\rPID|1||42^^^FAC^MR||DOE^JOHN";

    fn extensions() -> Vec<String> {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn converts_matching_files_and_keeps_going() {
        let input = TempDir::new().expect("input dir");
        let output = TempDir::new().expect("output dir");
        fs::write(input.path().join("a.hl7"), ADT).expect("write a");
        fs::write(input.path().join("b.TXT"), ADT).expect("write b");
        fs::write(input.path().join("broken.hl7"), "not hl7").expect("write broken");
        fs::write(input.path().join("notes.md"), ADT).expect("write notes");

        let summary = run(
            &ConversionEngine::default(),
            &ConvertOptions::default(),
            input.path(),
            output.path(),
            &extensions(),
        )
        .expect("batch");

        assert_eq!(summary.converted, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.total(), 3);
        assert!(summary.failed[0].0.ends_with("broken.hl7"));
        assert!(output.path().join("a.json").is_file());
        assert!(output.path().join("b.json").is_file());
        assert!(!output.path().join("notes.json").exists());

        let json = fs::read_to_string(output.path().join("a.json")).expect("read a.json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["resourceType"], "Bundle");
        assert_eq!(value["entry"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn dotted_stems_keep_distinct_outputs() {
        let input = TempDir::new().expect("input dir");
        let output = TempDir::new().expect("output dir");
        fs::write(input.path().join("lab.2024.hl7"), ADT).expect("write 2024");
        fs::write(input.path().join("lab.2025.hl7"), ADT).expect("write 2025");

        let summary = run(
            &ConversionEngine::default(),
            &ConvertOptions::default(),
            input.path(),
            output.path(),
            &extensions(),
        )
        .expect("batch");

        assert_eq!(summary.converted, 2);
        assert!(summary.failed.is_empty());
        assert!(output.path().join("lab.2024.json").is_file());
        assert!(output.path().join("lab.2025.json").is_file());
        assert!(!output.path().join("lab.json").exists());
    }

    #[test]
    fn clashing_output_names_fail_instead_of_overwriting() {
        let input = TempDir::new().expect("input dir");
        let output = TempDir::new().expect("output dir");
        fs::write(input.path().join("lab.hl7"), ADT).expect("write hl7");
        fs::write(input.path().join("lab.txt"), ADT).expect("write txt");

        let summary = run(
            &ConversionEngine::default(),
            &ConvertOptions::default(),
            input.path(),
            output.path(),
            &extensions(),
        )
        .expect("batch");

        assert_eq!(summary.converted, 1);
        assert_eq!(summary.failed.len(), 1);
        // Inputs are sorted, so `lab.hl7` wins and `lab.txt` is the one refused.
        assert!(summary.failed[0].0.ends_with("lab.txt"));
        assert!(summary.failed[0].1.contains("already written"));
        let entries: Vec<_> = fs::read_dir(output.path()).expect("list").collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn input_files_skips_directories() {
        let input = TempDir::new().expect("input dir");
        fs::create_dir(input.path().join("nested.hl7")).expect("dir");
        fs::write(input.path().join("z.hl7"), ADT).expect("write");

        let files = input_files(input.path(), &extensions()).expect("list");
        assert_eq!(files, vec![input.path().join("z.hl7")]);
    }
}
