//! Shared utilities for the end-to-end tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;
use zip::write::SimpleFileOptions;

/// Builds a zip archive laid out the way upstream serves them: everything
/// under a single `{name}-{version}` directory.
pub fn package_archive(
    name: &str,
    version: &str,
    manifest: &serde_json::Value,
    sources: &[(&str, &str)],
) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut buffer);
    let root = format!("{name}-{version}");

    writer
        .start_file(
            format!("{root}/elm-package.json"),
            SimpleFileOptions::default(),
        )
        .unwrap();
    writer
        .write_all(serde_json::to_string(manifest).unwrap().as_bytes())
        .unwrap();

    for (path, contents) in sources {
        writer
            .start_file(format!("{root}/{path}"), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }

    writer.finish().unwrap();
    buffer.into_inner()
}

/// A manifest declaring support for the compiler range the mirror accepts.
pub fn supported_manifest() -> serde_json::Value {
    json!({
        "elm-version": "0.17.0 <= v < 0.19.0",
        "source-directories": ["src"],
    })
}

/// Writes an executable shell script standing in for the compiler. The
/// script creates one textual and one binary artifact in the directory the
/// harvester reads them back from.
#[cfg(unix)]
pub fn fake_compiler(dir: &Path, namespace: &str, name: &str, version: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let artifacts_dir = format!("elm-stuff/build-artifacts/0.18.0/{namespace}/{name}/{version}");
    let script = format!(
        "#!/bin/sh\nmkdir -p {artifacts_dir}\n\
         printf 'var out = 1;' > {artifacts_dir}/Main.elmo\n\
         printf 'iface' > {artifacts_dir}/Main.elmi\n"
    );

    let path = dir.join("fake-compiler.sh");
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
