use repodigest_core::{
    CancellationToken, Classifier, OutputFormat, RenderMode, ScanOutcome, ScanRequest, reconstruct,
    run_scan,
};
use repodigest_core::reverse::DEFAULT_REPO_NAME;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const SOURCES: [(&str, &str); 4] = [
    ("README.md", "# Demo\n\nA small project.\n"),
    ("src/main.py", "def main():\n    print(\"hi\")\n"),
    ("docs/guide.md", "Run it:\n\n```sh\npython src/main.py\n```\n"),
    ("config.toml", "name = \"demo\"\n"),
];

fn source_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    for (rel, content) in SOURCES {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    fs::write(dir.path().join("logo.png"), b"\x89PNG").unwrap();
    dir
}

fn zip_contents(path: &Path) -> BTreeMap<String, String> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut contents = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        contents.insert(entry.name().to_string(), content);
    }
    contents
}

fn round_trip(mode: RenderMode) {
    let repo = source_repo();
    let out = TempDir::new().unwrap();
    let mut request = ScanRequest::new(repo.path(), out.path());
    request.metadata.name = "demo".to_string();
    request.formats = vec![OutputFormat::Txt, OutputFormat::Md, OutputFormat::Json];
    request.mode = mode;

    let report = match run_scan(&request, &Classifier::default(), &CancellationToken::new()).unwrap() {
        ScanOutcome::Completed(report) => report,
        ScanOutcome::NoValidFiles { .. } => panic!("expected textual files"),
    };
    let expected: BTreeMap<String, String> = SOURCES
        .iter()
        .map(|(rel, content)| (rel.to_string(), content.to_string()))
        .collect();

    for format in [OutputFormat::Txt, OutputFormat::Md, OutputFormat::Json] {
        let rebuilt_dir = out.path().join(format!("rebuilt-{}", format));
        let zip_path = reconstruct(&report.build.outputs[&format], &rebuilt_dir).unwrap();
        // Lite JSON carries no metadata, so the repository name is unknown.
        let stem = if format == OutputFormat::Json && mode.is_lite() {
            DEFAULT_REPO_NAME
        } else {
            "demo"
        };
        assert_eq!(zip_path, rebuilt_dir.join(format!("{}_reconstructed.zip", stem)));
        assert_eq!(zip_contents(&zip_path), expected, "{} report in {} mode", format, mode);
    }
}

#[test]
fn rich_reports_rebuild_the_scanned_files() {
    round_trip(RenderMode::Rich);
}

#[test]
fn lite_reports_rebuild_the_scanned_files() {
    round_trip(RenderMode::Lite);
}
