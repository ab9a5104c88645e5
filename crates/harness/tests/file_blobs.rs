use std::collections::BTreeSet;
use std::sync::Arc;

use roomstore_core::codec::encode_file_payload;
use roomstore_core::{FileId, FileMetadata, RoomKey};
use roomstore_engine::{
    BackendConfig, Backends, EngineError, FileUpload, RoomStorage, StorageConfig,
};
use roomstore_harness::TestNetwork;
use roomstore_storage::{FallbackBlobBackend, MemoryRecordBackend};

const PREFIX: &str = "files/rooms/test-room";

fn upload(key: &RoomKey, id: &str, data: &[u8]) -> Result<FileUpload, Box<dyn std::error::Error>> {
    let metadata = FileMetadata {
        mime_type: Some("image/png".into()),
        created: Some(1_600_000_000_000),
    };
    Ok(FileUpload {
        id: id.into(),
        buffer: encode_file_payload(key, data, &metadata)?,
    })
}

#[tokio::test]
async fn one_failed_upload_does_not_sink_the_rest() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new();
    let a = net.add_peer();
    net.blobs().fail_path(format!("{PREFIX}/f2"));

    let key = net.room_key.clone();
    let files = vec![
        upload(&key, "f1", b"one")?,
        upload(&key, "f2", b"two")?,
        upload(&key, "f3", b"three")?,
    ];
    let result = net.peer(a).storage().save_files(PREFIX, &files).await?;
    assert_eq!(result.saved_files, vec![FileId::from("f1"), FileId::from("f3")]);
    assert_eq!(result.errored_files, vec![FileId::from("f2")]);

    let ids: Vec<FileId> = vec!["f1".into(), "f2".into(), "f3".into()];
    let loaded = net.peer(a).storage().load_files(PREFIX, &key, &ids).await;
    let data: Vec<&[u8]> = loaded.loaded_files.iter().map(|f| f.data.as_slice()).collect();
    assert_eq!(data, vec![b"one".as_slice(), b"three".as_slice()]);
    assert_eq!(loaded.errored_files, BTreeSet::from([FileId::from("f2")]));
    Ok(())
}

#[tokio::test]
async fn repeated_id_is_fetched_once() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new();
    let a = net.add_peer();
    let b = net.add_peer();
    let key = net.room_key.clone();

    net.peer(a)
        .storage()
        .save_files(PREFIX, &[upload(&key, "f1", b"pixels")?])
        .await?;

    let ids: Vec<FileId> = vec!["f1".into(), "f1".into()];
    let loaded = net.peer(b).storage().load_files(PREFIX, &key, &ids).await;
    assert_eq!(net.blobs().downloads(), 1);
    assert_eq!(loaded.loaded_files.len(), 1);
    assert!(loaded.errored_files.is_empty());

    let file = &loaded.loaded_files[0];
    assert_eq!(file.mime_type, "image/png");
    assert_eq!(file.created, 1_600_000_000_000);
    assert_eq!(file.last_retrieved, file.created);
    Ok(())
}

#[tokio::test]
async fn unconfigured_backend_aborts_file_transfers() -> Result<(), Box<dyn std::error::Error>> {
    let config = StorageConfig::default();
    let backends = Backends {
        records: Arc::new(MemoryRecordBackend::new()),
        blobs: Arc::new(FallbackBlobBackend::new(Vec::new())),
    };
    let net = TestNetwork::new();
    let storage = RoomStorage::with_backends(&config, backends, net.clock.clone());
    let key = RoomKey::generate();

    let err = storage
        .save_files(PREFIX, &[upload(&key, "f1", b"a")?, upload(&key, "f2", b"b")?])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));

    let loaded = storage.load_files(PREFIX, &key, &["f1".into()]).await;
    assert!(loaded.loaded_files.is_empty());
    assert!(loaded.errored_files.is_empty());
    Ok(())
}

#[tokio::test]
async fn files_survive_reopening_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = StorageConfig {
        backend: BackendConfig::Sqlite {
            path: dir.path().join("rooms.db").to_string_lossy().into_owned(),
        },
        ..Default::default()
    };
    let key = RoomKey::generate();

    {
        let storage = RoomStorage::from_config(&config)?;
        let result = storage
            .save_files(PREFIX, &[upload(&key, "img", b"\x89PNG")?])
            .await?;
        assert_eq!(result.saved_files, vec![FileId::from("img")]);
    }

    let storage = RoomStorage::from_config(&config)?;
    let loaded = storage.load_files(PREFIX, &key, &["img".into()]).await;
    assert_eq!(loaded.loaded_files.len(), 1);
    assert_eq!(loaded.loaded_files[0].data, b"\x89PNG");
    Ok(())
}
