//! Upload receiver and scratch artifact tests.

use std::io::{Cursor, Read};

use clipgif::{ClipgifError, ConverterOptions, ErrorKind, UploadReceiver};

fn receiver_in(directory: &std::path::Path) -> UploadReceiver {
    UploadReceiver::new(
        &ConverterOptions::new()
            .with_temp_directory(directory)
            .with_chunk_size(4096),
    )
}

fn file_count(directory: &std::path::Path) -> usize {
    std::fs::read_dir(directory).unwrap().count()
}

/// A reader that hands out at most `step` bytes per call.
struct Trickle {
    data: Vec<u8>,
    position: usize,
    step: usize,
}

impl Read for Trickle {
    fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        let end = (self.position + self.step.min(buffer.len())).min(self.data.len());
        let count = end - self.position;
        buffer[..count].copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(count)
    }
}

#[test]
fn upload_is_copied_byte_for_byte() {
    let scratch = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..100_000_u32).map(|i| (i % 251) as u8).collect();

    let reader = Trickle {
        data: data.clone(),
        position: 0,
        step: 1000,
    };
    let artifact = receiver_in(scratch.path()).receive(reader, "clip.mp4").unwrap();

    assert_eq!(std::fs::read(artifact.path()).unwrap(), data);
    assert_eq!(artifact.len().unwrap(), 100_000);
    assert_eq!(artifact.path().extension().unwrap(), "mp4");
}

#[test]
fn dropping_an_artifact_deletes_it() {
    let scratch = tempfile::tempdir().unwrap();
    let artifact = receiver_in(scratch.path())
        .receive(Cursor::new(b"abc".to_vec()), "clip.mov")
        .unwrap();
    let path = artifact.path().to_path_buf();
    assert!(path.exists());

    drop(artifact);
    assert!(!path.exists());
}

#[test]
fn removing_an_artifact_deletes_it() {
    let scratch = tempfile::tempdir().unwrap();
    let artifact = receiver_in(scratch.path())
        .receive(Cursor::new(b"abc".to_vec()), "clip.avi")
        .unwrap();

    artifact.remove().unwrap();
    assert_eq!(file_count(scratch.path()), 0);
}

#[test]
fn extension_check_is_case_insensitive() {
    let scratch = tempfile::tempdir().unwrap();
    let receiver = receiver_in(scratch.path());

    assert_eq!(receiver.check_extension("CLIP.MOV").unwrap(), "mov");
    assert_eq!(receiver.check_extension("a.b.Mp4").unwrap(), "mp4");
}

#[test]
fn unsupported_extensions_are_rejected_without_a_file() {
    let scratch = tempfile::tempdir().unwrap();
    let receiver = receiver_in(scratch.path());

    for name in ["clip.mkv", "clip", "", "avi"] {
        let error = receiver
            .receive(Cursor::new(b"data".to_vec()), name)
            .unwrap_err();
        assert!(matches!(error, ClipgifError::UnsupportedExtension { .. }), "{name}");
        assert_eq!(error.kind(), ErrorKind::Validation);
    }
    assert_eq!(file_count(scratch.path()), 0);
}

#[test]
fn custom_allow_list_replaces_the_default() {
    let scratch = tempfile::tempdir().unwrap();
    let receiver = UploadReceiver::new(
        &ConverterOptions::new()
            .with_temp_directory(scratch.path())
            .with_allowed_extensions([".WebM"]),
    );

    assert!(receiver.check_extension("clip.webm").is_ok());
    assert!(receiver.check_extension("clip.mp4").is_err());
}

#[test]
fn oversized_upload_is_rejected_and_removed() {
    let scratch = tempfile::tempdir().unwrap();
    let receiver = UploadReceiver::new(
        &ConverterOptions::new()
            .with_temp_directory(scratch.path())
            .with_chunk_size(4096)
            .with_max_upload_bytes(Some(10_000)),
    );

    let error = receiver
        .receive(Cursor::new(vec![0_u8; 20_000]), "clip.mp4")
        .unwrap_err();

    assert!(matches!(error, ClipgifError::UploadTooLarge { limit: 10_000 }));
    assert_eq!(file_count(scratch.path()), 0);
}

#[test]
fn push_style_upload_counts_bytes() {
    let scratch = tempfile::tempdir().unwrap();
    let mut writer = receiver_in(scratch.path()).begin("clip.mp4").unwrap();

    writer.write_chunk(b"hello ").unwrap();
    writer.write_chunk(b"world").unwrap();
    assert_eq!(writer.bytes_written(), 11);

    let artifact = writer.finish().unwrap();
    assert_eq!(std::fs::read(artifact.path()).unwrap(), b"hello world");
}

#[test]
fn abandoned_push_upload_leaves_nothing() {
    let scratch = tempfile::tempdir().unwrap();
    let mut writer = receiver_in(scratch.path()).begin("clip.mp4").unwrap();
    writer.write_chunk(b"partial").unwrap();

    drop(writer);
    assert_eq!(file_count(scratch.path()), 0);
}
