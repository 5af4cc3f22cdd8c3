mod common;

use common::{entries, packager, stored_path, FakeTranscoder, FlakyStorage, BASE_URL, FOLDER};
use hls_packager::adapters::local::FsAdapter;
use hls_packager::application::workspace::SENTINEL;
use hls_packager::domain::jobs::JobState;
use tempfile::tempdir;

fn rank(state: &JobState) -> usize {
    match state {
        JobState::Created => 0,
        JobState::Staged => 1,
        JobState::Encoding => 2,
        JobState::UploadingVariant(i) => 3 + i,
        JobState::AssemblingMaster => 6,
        JobState::Completed | JobState::Failed(_) => 7,
    }
}

#[tokio::test]
async fn test_completed_package_points_only_at_remote_objects() {
    let temp = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let storage = FsAdapter::new(remote.path(), BASE_URL);
    let service = packager(temp.path(), storage, FakeTranscoder { segments_per_variant: 4 });

    let job = service.create_job(".mp4").await.unwrap();
    tokio::fs::write(&job.source_path, b"source").await.unwrap();
    let handle = service.spawn(job);
    let predicted = handle.predicted.clone();

    assert_eq!(handle.wait().await, JobState::Completed);

    // Variant playlists: every reference line is a remote segment address.
    for name in ["360p", "480p", "720p"] {
        let address = &predicted.variant_urls[name];
        let playlist = tokio::fs::read_to_string(stored_path(remote.path(), address))
            .await
            .unwrap();
        let references: Vec<&str> = playlist
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        assert_eq!(references.len(), 4);
        for reference in references {
            assert!(reference.starts_with(BASE_URL), "local reference {}", reference);
            assert!(stored_path(remote.path(), reference).exists());
        }
    }

    // Master playlist: one entry per tier, ascending bandwidth, predicted URIs.
    let master = tokio::fs::read_to_string(stored_path(remote.path(), &predicted.master_url))
        .await
        .unwrap();
    let lines: Vec<&str> = master.lines().collect();
    assert_eq!(lines[0], "#EXTM3U");
    let bandwidths: Vec<&str> = lines
        .iter()
        .filter_map(|line| line.strip_prefix("#EXT-X-STREAM-INF:BANDWIDTH="))
        .map(|rest| rest.split(',').next().unwrap())
        .collect();
    assert_eq!(bandwidths, vec!["800000", "1200000", "2200000"]);
    let uris: Vec<&str> = lines
        .iter()
        .filter(|line| !line.starts_with('#'))
        .copied()
        .collect();
    assert_eq!(
        uris,
        vec![
            predicted.variant_urls["360p"].as_str(),
            predicted.variant_urls["480p"].as_str(),
            predicted.variant_urls["720p"].as_str(),
        ]
    );
    assert!(master.contains("RESOLUTION=854x480"));

    // Nothing of the job is left locally.
    assert_eq!(entries(temp.path()).await, vec![SENTINEL.to_string()]);
}

#[tokio::test]
async fn test_states_advance_in_order() {
    let temp = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let storage = FsAdapter::new(remote.path(), BASE_URL);
    let service = packager(temp.path(), storage, FakeTranscoder { segments_per_variant: 2 });

    let job = service.create_job(".mov").await.unwrap();
    tokio::fs::write(&job.source_path, b"source").await.unwrap();
    let handle = service.spawn(job);

    let mut rx = handle.subscribe();
    let observer = tokio::spawn(async move {
        let mut seen = vec![rx.borrow_and_update().clone()];
        while !seen.last().map(JobState::is_terminal).unwrap_or(false) {
            if rx.changed().await.is_err() {
                break;
            }
            seen.push(rx.borrow_and_update().clone());
        }
        seen
    });

    assert_eq!(handle.wait().await, JobState::Completed);
    let seen = observer.await.unwrap();

    assert_eq!(seen.last(), Some(&JobState::Completed));
    for pair in seen.windows(2) {
        assert!(rank(&pair[0]) < rank(&pair[1]), "{:?}", seen);
    }
}

#[tokio::test]
async fn test_upload_failure_stops_before_master_and_cleans_up() {
    let temp = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let storage = FlakyStorage {
        inner: FsAdapter::new(remote.path(), BASE_URL),
        poison: "stream_1/segment_001",
    };
    let service = packager(temp.path(), storage, FakeTranscoder { segments_per_variant: 3 });

    let job = service.create_job(".mkv").await.unwrap();
    tokio::fs::write(&job.source_path, b"source").await.unwrap();
    let handle = service.spawn(job);
    let predicted = handle.predicted.clone();

    match handle.wait().await {
        JobState::Failed(reason) => assert!(reason.contains("stream_1/segment_001")),
        other => panic!("expected failure, got {}", other),
    }

    // The first tier was published before the failure, later ones never were.
    assert!(stored_path(remote.path(), &predicted.variant_urls["360p"]).exists());
    assert!(!stored_path(remote.path(), &predicted.variant_urls["480p"]).exists());
    assert!(!stored_path(remote.path(), &predicted.variant_urls["720p"]).exists());
    assert!(!stored_path(remote.path(), &predicted.master_url).exists());

    assert_eq!(entries(temp.path()).await, vec![SENTINEL.to_string()]);
}

#[tokio::test]
async fn test_missing_source_fails_encoding() {
    let temp = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let storage = FsAdapter::new(remote.path(), BASE_URL);
    let service = packager(temp.path(), storage, FakeTranscoder { segments_per_variant: 1 });

    // Never staged: the source file was not written.
    let job = service.create_job(".mp4").await.unwrap();
    let handle = service.spawn(job);

    match handle.wait().await {
        JobState::Failed(reason) => assert!(reason.starts_with("encoding failed")),
        other => panic!("expected failure, got {}", other),
    }
    assert!(entries(remote.path()).await.is_empty());
    assert_eq!(entries(temp.path()).await, vec![SENTINEL.to_string()]);
}

#[tokio::test]
async fn test_concurrent_jobs_do_not_interfere() {
    let temp = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let storage = FsAdapter::new(remote.path(), BASE_URL);
    let service = packager(temp.path(), storage, FakeTranscoder { segments_per_variant: 3 });

    let mut handles = Vec::new();
    for _ in 0..4 {
        let job = service.create_job(".mp4").await.unwrap();
        tokio::fs::write(&job.source_path, b"source").await.unwrap();
        handles.push(service.spawn(job));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.video_id);
        let master = handle.predicted.master_url.clone();
        assert_eq!(handle.wait().await, JobState::Completed);
        assert!(stored_path(remote.path(), &master).exists());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);

    assert_eq!(entries(&remote.path().join(FOLDER)).await.len(), 4);
    assert_eq!(entries(temp.path()).await, vec![SENTINEL.to_string()]);
}

#[tokio::test]
async fn test_stale_residue_is_swept_at_job_start() {
    let temp = tempdir().unwrap();
    let remote = tempdir().unwrap();
    tokio::fs::create_dir_all(temp.path().join("0000-crashed/stream_2"))
        .await
        .unwrap();
    tokio::fs::write(temp.path().join("leftover.mp4"), b"x").await.unwrap();

    let storage = FsAdapter::new(remote.path(), BASE_URL);
    let service = packager(temp.path(), storage, FakeTranscoder { segments_per_variant: 1 });

    let job = service.create_job(".mp4").await.unwrap();
    let workspace_name = job.video_id.to_string();
    let mut expected = vec![SENTINEL.to_string(), workspace_name];
    expected.sort();
    assert_eq!(entries(temp.path()).await, expected);

    service.discard(job).await;
    assert_eq!(entries(temp.path()).await, vec![SENTINEL.to_string()]);
}

#[tokio::test]
async fn test_delete_removes_published_package() {
    let temp = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let storage = FsAdapter::new(remote.path(), BASE_URL);
    let service = packager(
        temp.path(),
        storage.clone(),
        FakeTranscoder { segments_per_variant: 2 },
    );
    let deletion = common::deletion(storage);

    let job = service.create_job(".mp4").await.unwrap();
    tokio::fs::write(&job.source_path, b"source").await.unwrap();
    let handle = service.spawn(job);
    let id = handle.video_id.to_string();
    assert_eq!(handle.wait().await, JobState::Completed);
    assert!(remote.path().join(FOLDER).join(&id).exists());

    deletion.delete(&id).await.unwrap();
    assert!(!remote.path().join(FOLDER).join(&id).exists());

    // Deleting again is a no-op.
    deletion.delete(&id).await.unwrap();
}
