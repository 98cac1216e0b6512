mod common;

use common::{RecordingProgress, Repo, declared_count, fragment_count, package, three_packages};
use repodata_checksum::ChecksumType;
use repodata_config::RunConfig;
use repodata_generator::error::ErrorKind;
use repodata_generator::{MANIFEST_NAME, MetadataGenerator, Outcome, RepositoryManifest, RunSummary};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

const DOCUMENTS: [&str; 3] = ["primary.xml.gz", "filelists.xml.gz", "other.xml.gz"];

fn run(config: RunConfig) -> (RunSummary, RecordingProgress) {
    let generator = MetadataGenerator::new(config, RecordingProgress::default());
    let summary = generator.run().unwrap();
    (summary, generator.into_progress())
}

fn published_bytes(repo: &Repo) -> Vec<Vec<u8>> {
    DOCUMENTS.iter().map(|name| fs::read(repo.published(name)).unwrap()).collect()
}

#[test]
fn test_declared_count_matches_fragments() {
    let repo = Repo::new();
    three_packages(&repo);
    let (summary, progress) = run(repo.config());
    assert_eq!(summary.total, 3);
    assert_eq!(summary.written, 3);
    assert_eq!(*progress.started.borrow(), Some(3));
    assert!(*progress.finished.borrow());
    for name in DOCUMENTS {
        let document = repo.document(name);
        assert_eq!(declared_count(&document), 3, "{name}");
        assert_eq!(fragment_count(&document), 3, "{name}");
    }
    // Staging was promoted and nothing else was left behind.
    assert!(!repo.root().join(".repodata").exists());
    assert!(!repo.root().join(".olddata").exists());
}

#[test]
fn test_documents_follow_scan_order() {
    let repo = Repo::new();
    three_packages(&repo);
    run(repo.config());
    let primary = repo.document("primary.xml.gz");
    let positions: Vec<_> =
        ["alpha", "bravo", "charlie"].iter().map(|name| primary.find(&format!("<name>{name}</name>")).unwrap()).collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(primary.contains("<location href=\"Packages/alpha-1.0-1.noarch.rpm\"/>"));
}

#[test]
fn test_reuse_is_byte_identical() {
    let repo = Repo::new();
    three_packages(&repo);
    run(repo.config());
    let first = published_bytes(&repo);

    let (summary, progress) = run(RunConfig { update: true, ..repo.config() });
    assert_eq!(summary.reused, 3);
    assert_eq!(progress.outcomes(), [Outcome::Reused; 3]);
    assert_eq!(published_bytes(&repo), first);
}

#[test]
fn test_reuse_with_pretty_fragments() {
    let repo = Repo::new();
    three_packages(&repo);
    let pretty = RunConfig { pretty: true, ..repo.config() };
    run(pretty.clone());
    let first = published_bytes(&repo);
    let (summary, _) = run(RunConfig { update: true, ..pretty });
    assert_eq!(summary.reused, 3);
    assert_eq!(published_bytes(&repo), first);
}

#[test]
fn test_changed_archive_is_extracted_again() {
    let repo = Repo::new();
    three_packages(&repo);
    run(repo.config());
    // Same name, version and release; different bytes.
    repo.add(&package("bravo").payload(b"rebuilt payload"));

    let (summary, progress) = run(RunConfig { update: true, ..repo.config() });
    assert_eq!((summary.reused, summary.extracted), (2, 1));
    assert_eq!(progress.outcomes(), [Outcome::Reused, Outcome::Extracted, Outcome::Reused]);
    let checksum = ChecksumType::Sha256.digest_file(repo.root().join("Packages/bravo-1.0-1.noarch.rpm")).unwrap();
    assert!(repo.document("filelists.xml.gz").contains(&format!("pkgid=\"{checksum}\"")));
}

#[test]
fn test_moved_package_keeps_filelists_and_other() {
    let repo = Repo::new();
    three_packages(&repo);
    run(repo.config());
    fs::create_dir(repo.root().join("Moved")).unwrap();
    fs::rename(
        repo.root().join("Packages/charlie-1.0-1.noarch.rpm"),
        repo.root().join("Moved/charlie-1.0-1.noarch.rpm"),
    )
    .unwrap();

    let (summary, progress) = run(RunConfig { update: true, ..repo.config() });
    assert_eq!(progress.outcomes(), [Outcome::Partial, Outcome::Reused, Outcome::Reused]);
    assert_eq!(summary.partial, 1);
    assert!(repo.document("primary.xml.gz").contains("<location href=\"Moved/charlie-1.0-1.noarch.rpm\"/>"));
}

#[test]
fn test_runs_without_reuse_are_deterministic() {
    let repo = Repo::new();
    three_packages(&repo);
    run(repo.config());
    let first = published_bytes(&repo);
    let (summary, _) = run(repo.config());
    assert_eq!(summary.extracted, 3);
    assert_eq!(published_bytes(&repo), first);
}

#[test]
fn test_manifest_checksums() {
    let repo = Repo::new();
    three_packages(&repo);
    run(RunConfig { checksum: ChecksumType::Sha512, ..repo.config() });
    let manifest = RepositoryManifest::read(&repo.published(MANIFEST_NAME)).unwrap();
    let kinds: Vec<_> = manifest.entries.iter().map(|entry| entry.kind.as_str()).collect();
    assert_eq!(kinds, ["other", "filelists", "primary"]);
    for entry in &manifest.entries {
        let path = repo.root().join(&entry.location.href);
        assert_eq!(entry.checksum, ChecksumType::Sha512.digest_file(&path).unwrap());
        let mut open = Vec::new();
        repodata_compress::open(&path).unwrap().read_to_end(&mut open).unwrap();
        assert_eq!(entry.open_checksum, Some(ChecksumType::Sha512.digest(&open)));
        assert!(entry.timestamp > 0);
    }
}

#[test]
fn test_split_media_locations() {
    let repo = Repo::new();
    repo.add_in("cd1", &package("alpha"));
    repo.add_in("cd2", &package("bravo"));
    repo.add_in("cd3", &package("charlie"));
    let config = RunConfig {
        split: true,
        base_url: Some("media://1700000000.1".to_string()),
        base_dir: repo.root().to_path_buf(),
        directories: vec![PathBuf::from("cd1"), PathBuf::from("cd2"), PathBuf::from("cd3")],
        output_dir: Some(repo.root().to_path_buf()),
        ..RunConfig::default()
    };
    let (summary, _) = run(config);
    assert_eq!(summary.written, 3);
    let primary = repo.document("primary.xml.gz");
    for (volume, name) in ["alpha", "bravo", "charlie"].iter().enumerate() {
        let location = format!(
            "<location xml:base=\"media://1700000000.1#{}\" href=\"{name}-1.0-1.noarch.rpm\"/>",
            volume + 1
        );
        assert!(primary.contains(&location), "{location}");
    }
    assert_eq!(declared_count(&primary), 3);
    let manifest = RepositoryManifest::read(&repo.published(MANIFEST_NAME)).unwrap();
    assert!(manifest.entries.iter().all(|entry| entry.location.base.as_deref() == Some("media://1700000000.1#1")));
}

#[test]
fn test_corrupt_package_is_skipped() {
    let repo = Repo::new();
    let paths = three_packages(&repo);
    fs::write(&paths[1], b"this is not an rpm archive").unwrap();

    let (summary, progress) = run(repo.config());
    assert_eq!(summary.total, 3);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.failed, [paths[1].clone()]);
    assert_eq!(*progress.failures.borrow(), [paths[1].clone()]);
    for name in DOCUMENTS {
        let document = repo.document(name);
        assert_eq!(declared_count(&document), 2, "{name}");
        assert_eq!(fragment_count(&document), 2, "{name}");
        assert!(!document.contains("bravo"), "{name}");
    }
}

#[test]
fn test_failed_manifest_is_never_published() {
    let repo = Repo::new();
    three_packages(&repo);
    run(repo.config());
    let published = fs::read(repo.published(MANIFEST_NAME)).unwrap();

    repo.add(&package("delta"));
    let generator = MetadataGenerator::new(repo.config(), RecordingProgress::default());
    generator.prepare().unwrap();
    let (documents, _) = generator.write_package_metadata().unwrap();
    // A directory in the way of the final rename.
    fs::create_dir_all(generator.staging().path().join(MANIFEST_NAME).join("blocker")).unwrap();
    let err = generator.write_repo_manifest(&documents).unwrap_err();
    assert_eq!(*err, ErrorKind::Manifest);

    assert_eq!(fs::read(repo.published(MANIFEST_NAME)).unwrap(), published);
    assert!(!repo.document("primary.xml.gz").contains("delta"));
    assert!(generator.staging().path().is_dir());
    // The leftover staging directory blocks the next run.
    let err = MetadataGenerator::new(repo.config(), RecordingProgress::default()).run().unwrap_err();
    assert!(matches!(&*err, ErrorKind::Staging(_)));
}

#[test]
fn test_excluded_packages_are_not_counted() {
    let repo = Repo::new();
    three_packages(&repo);
    let (summary, _) = run(RunConfig { excludes: vec!["*bravo*".to_string()], ..repo.config() });
    assert_eq!(summary.total, 2);
    assert_eq!(declared_count(&repo.document("other.xml.gz")), 2);
}

#[test]
fn test_group_file_is_copied() {
    let repo = Repo::new();
    three_packages(&repo);
    let source = tempfile::tempdir().unwrap();
    let group = source.path().join("comps.xml");
    fs::write(&group, b"<comps><group><id>base</id></group></comps>\n").unwrap();
    run(RunConfig { group_file: Some(group), ..repo.config() });
    let manifest = RepositoryManifest::read(&repo.published(MANIFEST_NAME)).unwrap();
    let entry = manifest.entry("group").unwrap();
    assert_eq!(entry.location.href, "repodata/comps.xml");
    assert_eq!(entry.open_checksum, None);
    assert_eq!(fs::read(repo.published("comps.xml")).unwrap(), b"<comps><group><id>base</id></group></comps>\n");
}

#[test]
fn test_timestamp_check() {
    let repo = Repo::new();
    let paths = three_packages(&repo);
    let config = RunConfig { check_ts: true, ..repo.config() };
    let (summary, _) = run(config.clone());
    assert!(!summary.up_to_date);
    let published = fs::read(repo.published(MANIFEST_NAME)).unwrap();

    let generator = MetadataGenerator::new(config.clone(), RecordingProgress::default());
    assert!(generator.is_up_to_date().unwrap());
    let summary = generator.run().unwrap();
    assert!(summary.up_to_date);
    assert_eq!(fs::read(repo.published(MANIFEST_NAME)).unwrap(), published);

    // Only the last package is newer; that is enough.
    let file = fs::File::options().write(true).open(&paths[2]).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(3600)).unwrap();
    assert!(!MetadataGenerator::new(config, RecordingProgress::default()).is_up_to_date().unwrap());
}
