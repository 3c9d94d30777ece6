use chrono::{DateTime, Utc};
use progress_core::model::{Path, RemoteId, RemoteRecord};
use serde::{Deserialize, Serialize};

/// Body of `POST /progress` and `PATCH /progress/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressBody<'a> {
    pub path: &'a Path,
    pub completed_on: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRecord {
    pub id: RemoteId,
    pub path: Path,
    pub completed_on: DateTime<Utc>,
}

impl From<WireRecord> for RemoteRecord {
    fn from(record: WireRecord) -> Self {
        Self {
            id: record.id,
            path: record.path,
            completed_on: record.completed_on,
        }
    }
}

/// `GET /user/progress` answers either `{progress: [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum FetchBody {
    Wrapped { progress: Vec<WireRecord> },
    Bare(Vec<WireRecord>),
}

impl FetchBody {
    pub fn into_records(self) -> Vec<RemoteRecord> {
        let records = match self {
            Self::Wrapped { progress } => progress,
            Self::Bare(records) => records,
        };
        records.into_iter().map(RemoteRecord::from).collect()
    }
}

/// Confirmation returned by `PATCH` and `DELETE`.
#[derive(Debug, Deserialize)]
pub(crate) struct IdEcho {
    pub id: RemoteId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserBody {
    pub email: String,
}

/// Error payload the server attaches to 4xx/5xx responses. Only the reason
/// is kept; the accompanying `error` flag is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::time::fixed_now;

    #[test]
    fn fetch_body_accepts_wrapped_and_bare_forms() {
        let wrapped = r#"{"progress":[{"path":"[1,1,0]","completedOn":"2023-11-14T22:13:20Z","id":42}]}"#;
        let bare = r#"[{"path":"[1, 1, 0]","completedOn":"2023-11-14T22:13:20Z","id":42}]"#;

        for raw in [wrapped, bare] {
            let records = serde_json::from_str::<FetchBody>(raw).unwrap().into_records();
            assert_eq!(
                records,
                vec![RemoteRecord {
                    id: RemoteId::new(42),
                    path: Path::from([1, 1, 0]),
                    completed_on: fixed_now(),
                }]
            );
        }
    }

    #[test]
    fn unparsable_path_fails_the_whole_body() {
        let raw = r#"{"progress":[
            {"path":"[1,1,0]","completedOn":"2023-11-14T22:13:20Z","id":1},
            {"path":"[1,x]","completedOn":"2023-11-14T22:13:20Z","id":2}
        ]}"#;
        assert!(serde_json::from_str::<FetchBody>(raw).is_err());
    }

    #[test]
    fn progress_body_serializes_path_as_string() {
        let path = Path::from([2, 1, 1]);
        let body = ProgressBody {
            path: &path,
            completed_on: fixed_now(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["path"], "[2,1,1]");
        assert_eq!(json["completedOn"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn error_body_reads_reason_and_ignores_flag() {
        let body: ErrorBody = serde_json::from_str(r#"{"reason":"no such record"}"#).unwrap();
        assert_eq!(body.reason, "no such record");
        let flagged: ErrorBody =
            serde_json::from_str(r#"{"error":true,"reason":"token expired"}"#).unwrap();
        assert_eq!(flagged.reason, "token expired");
    }
}
