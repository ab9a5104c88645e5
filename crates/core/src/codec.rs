//! Plaintext encodings for what gets encrypted: element sets for scene
//! records and compressed file payloads for blobs.

use serde::{Deserialize, Serialize};

use crate::crypto::{self, EncryptedPayload, RoomKey};
use crate::element::Element;
use crate::error::CoreError;

const FILE_PAYLOAD_VERSION: u8 = 1;

pub fn encode_elements(elements: &[Element]) -> Result<Vec<u8>, CoreError> {
    rmp_serde::to_vec_named(elements).map_err(|e| CoreError::Serialization(e.to_string()))
}

pub fn decode_elements(bytes: &[u8]) -> Result<Vec<Element>, CoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
}

pub fn encrypt_elements(key: &RoomKey, elements: &[Element]) -> Result<EncryptedPayload, CoreError> {
    let plaintext = encode_elements(elements)?;
    crypto::encrypt(key, &plaintext)
}

pub fn decrypt_elements(
    key: &RoomKey,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<Element>, CoreError> {
    let plaintext = crypto::decrypt(iv, ciphertext, key)?;
    decode_elements(&plaintext)
}

/// Metadata stored alongside a file's bytes inside the encrypted payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
}

#[derive(Serialize, Deserialize)]
struct FileEnvelope {
    version: u8,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct FileContents {
    metadata: FileMetadata,
    data: Vec<u8>,
}

/// Compress, then encrypt, a file for upload.
pub fn encode_file_payload(
    key: &RoomKey,
    data: &[u8],
    metadata: &FileMetadata,
) -> Result<Vec<u8>, CoreError> {
    let contents = FileContents {
        metadata: metadata.clone(),
        data: data.to_vec(),
    };
    let packed =
        rmp_serde::to_vec_named(&contents).map_err(|e| CoreError::Serialization(e.to_string()))?;
    let compressed = lz4_flex::compress_prepend_size(&packed);
    let sealed = crypto::encrypt(key, &compressed)?;

    let envelope = FileEnvelope {
        version: FILE_PAYLOAD_VERSION,
        iv: sealed.iv,
        ciphertext: sealed.ciphertext,
    };
    rmp_serde::to_vec_named(&envelope).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Inverse of [`encode_file_payload`].
pub fn decode_file_payload(
    key: &RoomKey,
    bytes: &[u8],
) -> Result<(Vec<u8>, FileMetadata), CoreError> {
    let envelope: FileEnvelope =
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))?;
    if envelope.version != FILE_PAYLOAD_VERSION {
        return Err(CoreError::InvalidData(format!(
            "unsupported file payload version {}",
            envelope.version
        )));
    }

    let compressed = crypto::decrypt(&envelope.iv, &envelope.ciphertext, key)?;
    let packed = lz4_flex::decompress_size_prepended(&compressed)
        .map_err(|e| CoreError::Decompression(e.to_string()))?;
    let contents: FileContents =
        rmp_serde::from_slice(&packed).map_err(|e| CoreError::Serialization(e.to_string()))?;
    Ok((contents.data, contents.metadata))
}
