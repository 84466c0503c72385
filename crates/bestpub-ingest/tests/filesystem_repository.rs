//! Ingestion into the directory-tree repository used by the binary
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use bestpub_common::IngestionStatus;
use bestpub_ingest::ingest::Taxonomy;
use bestpub_ingest::repository::FsRepository;
use common::{content_path, status_of, tree, Harness};
use std::sync::Arc;

#[tokio::test]
async fn test_epub_package_lands_on_disk() {
    let harness = Harness::new(Taxonomy::Epub);
    harness.add_archive(
        "9780486282146.zip",
        &[
            ("package.opf", "<package/>"),
            ("content/9780486282146-chapter-1.xhtml", "<html>one</html>"),
            ("images/cover.jpg", "jpeg"),
        ],
    );
    let repo = Arc::new(FsRepository::open(&harness.config.repository_root).await.unwrap());
    let orchestrator = harness.orchestrator(repo.clone());

    let summary = orchestrator.run().await;

    assert_eq!(summary.succeeded, 1);
    let package = content_path("9780486282146");
    assert_eq!(status_of(repo.as_ref(), &package).await, Some(IngestionStatus::Complete));
    assert_eq!(
        tree(repo.as_ref(), &package).await,
        vec![
            "Artwork",
            "Artwork/cover.jpg",
            "Chapters",
            "Chapters/9780486282146-chapter-1.xhtml",
            "package.opf",
        ]
    );

    let on_disk = repo
        .root_dir()
        .join("Company Home/Data Dictionary/BestPub/Incoming/Content/9780486282146/Chapters/9780486282146-chapter-1.xhtml");
    assert_eq!(std::fs::read_to_string(on_disk).unwrap(), "<html>one</html>");
}

#[tokio::test]
async fn test_status_survives_reopening_the_repository() {
    let harness = Harness::new(Taxonomy::Epub);
    harness.add_file("9780486282146.zip", b"not a zip");
    {
        let repo = Arc::new(FsRepository::open(&harness.config.repository_root).await.unwrap());
        harness.orchestrator(repo).run().await;
    }

    let reopened = FsRepository::open(&harness.config.repository_root).await.unwrap();
    assert_eq!(
        status_of(&reopened, &content_path("9780486282146")).await,
        Some(IngestionStatus::InProgress)
    );
}
