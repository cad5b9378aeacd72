use std::{path::Path, time::Duration};

use streamcopy_rs::{
    config::IoParams,
    error::{CopyErrorKind, EndpointRole, Severity},
    observer::CopyEvent,
    resource::{ResourceDir, ResourceLocator},
    session,
};
use tokio::runtime::Handle;

fn write_resource(dir: &Path, file: &str, content: &[u8]) {
    std::fs::write(dir.join(file), content).unwrap();
}

#[tokio::test]
async fn test_copy_appends_on_each_run() {
    let dir = tempfile::tempdir().unwrap();
    let content = b"# Alamofire\n\nElegant HTTP networking.\n";
    write_resource(dir.path(), "Alamofire.md", content);
    let bundle = ResourceDir::new(dir.path());
    let params = IoParams::default();

    for _ in 0..2 {
        let outcome =
            session::copy_resource(&bundle, "Alamofire", "md", &params, &Handle::current())
                .wait()
                .await;
        assert!(outcome.completed);
        assert!(outcome.errors.is_empty());
        assert_eq!(&outcome.content[..], content);
    }

    let output = std::fs::read(dir.path().join("Alamofireoutput")).unwrap();
    assert_eq!(output.len(), content.len() * 2);
    assert_eq!(&output[..content.len()], content);
    assert_eq!(&output[content.len()..], content);
}

#[tokio::test]
async fn test_copy_truncates_without_append() {
    let dir = tempfile::tempdir().unwrap();
    write_resource(dir.path(), "notes.txt", b"fresh");
    write_resource(dir.path(), "notesoutput", b"stale contents");
    let bundle = ResourceDir::new(dir.path());
    let params = IoParams {
        append: false,
        ..Default::default()
    };

    let outcome = session::copy_resource(&bundle, "notes", "txt", &params, &Handle::current())
        .wait()
        .await;
    assert!(outcome.completed);
    assert_eq!(std::fs::read(bundle.output_path("notes")).unwrap(), b"fresh");
}

#[tokio::test]
async fn test_missing_resource_reports_one_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = ResourceDir::new(dir.path());

    let mut handle = session::copy_resource(
        &bundle,
        "Alamofire",
        "md",
        &IoParams::default(),
        &Handle::current(),
    );
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    assert!(handle.join().await.is_none());

    assert_eq!(events.len(), 1);
    match &events[0] {
        CopyEvent::Error(report) => {
            assert_eq!(report.kind, CopyErrorKind::EndpointOpen);
            assert_eq!(report.endpoint, EndpointRole::Source);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!dir.path().join("Alamofireoutput").exists());
}

#[tokio::test]
async fn test_empty_file_completes_without_progress() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty");
    let sink = dir.path().join("emptyoutput");
    std::fs::write(&source, b"").unwrap();

    let outcome = session::copy(&source, &sink, 16).wait().await;
    assert!(outcome.completed);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.progress_calls, 0);
    assert!(outcome.content.is_empty());

    let stats = outcome.stats.unwrap();
    assert_eq!(stats.bytes_read, 0);
    assert_eq!(stats.bytes_written, 0);
    assert!(stats.completed);
    assert_eq!(std::fs::read(&sink).unwrap().len(), 0);
}

#[tokio::test]
async fn test_large_file_through_small_buffers() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("large.bin");
    let sink = dir.path().join("largeoutput");
    let content: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 251) as u8).collect();
    std::fs::write(&source, &content).unwrap();

    let params = IoParams {
        buffer_size: 7,
        sink_high_water: 13,
        read_chunk: 512,
        append: false,
    };
    let outcome = session::copy_on(&Handle::current(), &source, &sink, &params)
        .wait()
        .await;

    assert!(outcome.completed);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.content.len(), content.len());
    assert!(outcome.content[..] == content[..]);
    assert!(outcome.progress_calls > 0);

    let stats = outcome.stats.unwrap();
    assert_eq!(stats.bytes_read, content.len() as u64);
    assert_eq!(stats.bytes_written, content.len() as u64);
    assert!(std::fs::read(&sink).unwrap() == content);
}

#[tokio::test]
async fn test_cancel_stops_session_without_completion() {
    let (client, server) = tokio::io::duplex(64);
    let (writer, _reader) = tokio::io::duplex(64);

    let handle = session::spawn_session(
        &Handle::current(),
        Box::new(streamcopy_rs::io::StreamSource::new("idle", server)),
        Box::new(streamcopy_rs::io::StreamSink::new("out", writer)),
        8,
    );
    handle.cancel();

    let outcome = handle.wait().await;
    assert!(!outcome.completed);
    assert_eq!(outcome.progress_calls, 0);
    let stats = outcome.stats.unwrap();
    assert!(stats.cancelled);
    assert!(!stats.completed);
    drop(client);
}

#[tokio::test]
async fn test_cancel_ends_session_with_stalled_sink() {
    use tokio::io::AsyncWriteExt;

    let (mut client, server) = tokio::io::duplex(256);
    // nobody reads this end, the sink stops after 16 bytes
    let (writer, _peer) = tokio::io::duplex(16);

    let handle = session::spawn_session(
        &Handle::current(),
        Box::new(streamcopy_rs::io::StreamSource::new("feed", server)),
        Box::new(streamcopy_rs::io::StreamSink::new("stalled", writer)),
        64,
    );
    client.write_all(&[b'x'; 200]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle.wait())
        .await
        .expect("cancelled session must end");
    assert!(!outcome.completed);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.content.len(), 200);
    let stats = outcome.stats.unwrap();
    assert!(stats.cancelled);
    assert_eq!(stats.bytes_written, 16);
    drop(client);
}

#[tokio::test]
async fn test_failing_sink_is_not_reported_complete() {
    use std::{
        pin::Pin,
        task::{Context, Poll},
    };

    struct FullDisk;

    impl tokio::io::AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::other("no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    let handle = session::spawn_session(
        &Handle::current(),
        Box::new(streamcopy_rs::io::StreamSource::new(
            "feed",
            &b"hello world"[..],
        )),
        Box::new(streamcopy_rs::io::StreamSink::new("full", FullDisk)),
        4,
    );
    let outcome = handle.wait().await;

    assert!(!outcome.completed);
    assert_eq!(&outcome.content[..], b"hello world");
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].kind, CopyErrorKind::Write);
    assert_eq!(outcome.errors[0].severity, Severity::Error);
    let stats = outcome.stats.unwrap();
    assert!(!stats.completed);
    assert_eq!(stats.bytes_written, 0);
}
