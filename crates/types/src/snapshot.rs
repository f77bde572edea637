//! Snapshot encoding and file I/O.
//!
//! Snapshots are pretty-printed JSON so operators can review and edit them
//! between export and import.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use snafu::{ResultExt, Snafu};

use crate::types::MigrationSnapshot;

/// Error type for snapshot operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SnapshotError {
    /// Encoding failed.
    #[snafu(display("Encoding snapshot failed: {source}"))]
    Encode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Decoding failed.
    #[snafu(display("Decoding snapshot failed: {source}"))]
    Decode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Reading or writing the snapshot file failed.
    #[snafu(display("Snapshot I/O on {}: {source}", path.display()))]
    Io {
        /// File involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Encodes a snapshot as pretty-printed JSON.
///
/// # Errors
///
/// Returns `SnapshotError::Encode` if serialization fails.
pub fn encode(snapshot: &MigrationSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let mut bytes = serde_json::to_vec_pretty(snapshot).context(EncodeSnafu)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decodes a snapshot from JSON bytes.
///
/// # Errors
///
/// Returns `SnapshotError::Decode` if the bytes are not a valid snapshot,
/// including unknown role names.
pub fn decode(bytes: &[u8]) -> Result<MigrationSnapshot, SnapshotError> {
    serde_json::from_slice(bytes).context(DecodeSnafu)
}

/// Reads a snapshot file.
///
/// # Errors
///
/// Returns `SnapshotError::Io` if the file cannot be read, or
/// `SnapshotError::Decode` if its contents are not a valid snapshot.
pub fn read_snapshot(path: &Path) -> Result<MigrationSnapshot, SnapshotError> {
    let bytes = fs::read(path).context(IoSnafu { path })?;
    decode(&bytes)
}

/// Writes a snapshot file, replacing any existing file.
///
/// # Errors
///
/// Returns `SnapshotError::Encode` or `SnapshotError::Io`.
pub fn write_snapshot(path: &Path, snapshot: &MigrationSnapshot) -> Result<(), SnapshotError> {
    let bytes = encode(snapshot)?;
    fs::write(path, bytes).context(IoSnafu { path })
}

/// Writes a snapshot to an arbitrary writer (e.g. stdout).
///
/// # Errors
///
/// Returns `SnapshotError::Encode` or `SnapshotError::Io`.
pub fn write_snapshot_to<W: Write>(
    mut writer: W,
    snapshot: &MigrationSnapshot,
) -> Result<(), SnapshotError> {
    let bytes = encode(snapshot)?;
    writer.write_all(&bytes).context(IoSnafu { path: PathBuf::from("-") })?;
    writer.flush().context(IoSnafu { path: PathBuf::from("-") })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::types::{
        EmailRecord, OrgRole, OrgRoleKind, SpaceRole, SpaceRoleKind, UserMigrationRecord,
    };

    fn sample_snapshot() -> MigrationSnapshot {
        MigrationSnapshot {
            source_api_url: "https://api.sys.source.example.com".to_string(),
            records: vec![
                UserMigrationRecord::builder()
                    .username("alice")
                    .external_id("cn=alice,ou=people")
                    .emails(vec![EmailRecord::new("alice@example.com", true)])
                    .org_roles(vec![OrgRole::new("acme", OrgRoleKind::BillingManager)])
                    .space_roles(vec![SpaceRole::new("acme", "sandbox", SpaceRoleKind::Auditor)])
                    .build(),
            ],
        }
    }

    #[test]
    fn test_encoded_field_names() {
        let bytes = encode(&sample_snapshot()).expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(value["CfApiUrl"], "https://api.sys.source.example.com");
        let record = &value["UserMigrations"][0];
        assert_eq!(record["Username"], "alice");
        assert_eq!(record["ExternalID"], "cn=alice,ou=people");
        assert_eq!(record["Emails"][0]["value"], "alice@example.com");
        assert_eq!(record["Emails"][0]["primary"], true);
        assert_eq!(record["OrgRoles"][0]["OrgName"], "acme");
        assert_eq!(record["OrgRoles"][0]["RoleName"], "BillingManager");
        assert_eq!(record["SpaceRoles"][0]["SpaceName"], "sandbox");
        assert_eq!(record["SpaceRoles"][0]["RoleName"], "SpaceAuditor");
    }

    #[test]
    fn test_decode_snapshot_written_by_hand() {
        let json = br#"{
            "CfApiUrl": "https://api.example.com",
            "UserMigrations": [
                {
                    "Username": "bob",
                    "ExternalID": "uid=bob",
                    "Emails": [{"value": "bob@example.com", "primary": false}],
                    "OrgRoles": [{"OrgName": "acme", "RoleName": "OrgManager"}],
                    "SpaceRoles": []
                }
            ]
        }"#;

        let snapshot = decode(json).expect("decode");
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].org_roles[0].role, OrgRoleKind::Manager);
    }

    #[test]
    fn test_decode_rejects_unknown_role() {
        let json = br#"{
            "CfApiUrl": "https://api.example.com",
            "UserMigrations": [
                {
                    "Username": "bob",
                    "ExternalID": "uid=bob",
                    "SpaceRoles": [{"OrgName": "acme", "SpaceName": "dev", "RoleName": "SpaceOwner"}]
                }
            ]
        }"#;

        assert!(matches!(decode(json), Err(SnapshotError::Decode { .. })));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        let snapshot = sample_snapshot();

        write_snapshot(&path, &snapshot).expect("write");
        let loaded = read_snapshot(&path).expect("read");

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_read_missing_file_reports_path() {
        let err = read_snapshot(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/snapshot.json"));
    }
}
