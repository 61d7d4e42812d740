use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::actions::StreamEvent;
use crate::actions::KNOWN_EVENT_TAGS;
use crate::error::DecodeError;

/// Decodes one JSON event. Unknown `type` tags become [`StreamEvent::Unrecognized`].
pub fn decode_event(raw: &str) -> Result<StreamEvent, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    decode_event_value(value)
}

pub fn decode_event_value(value: serde_json::Value) -> Result<StreamEvent, DecodeError> {
    let Some(kind) = value.get("type").and_then(|tag| tag.as_str()) else {
        return Err(DecodeError::MissingTag);
    };
    if !KNOWN_EVENT_TAGS.contains(&kind) {
        return Ok(StreamEvent::Unrecognized {
            kind: kind.to_string(),
        });
    }
    Ok(serde_json::from_value(value)?)
}

pub fn encode_event(event: &StreamEvent) -> Result<String, DecodeError> {
    if let StreamEvent::Unrecognized { kind } = event {
        return Ok(serde_json::json!({ "type": kind }).to_string());
    }
    Ok(serde_json::to_string(event)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub seq: u64,
    pub ts_ms: i64,
    pub event: serde_json::Value,
}

/// Append-only JSONL log of the events a conversion stream delivered.
#[derive(Debug)]
pub struct EventTranscript {
    path: PathBuf,
    next_seq: u64,
}

impl EventTranscript {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let next_seq = load_records(&path)?
            .iter()
            .map(|record| record.seq)
            .max()
            .map_or(1, |seq| seq.saturating_add(1));
        Ok(Self { path, next_seq })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, event: &StreamEvent) -> Result<u64, DecodeError> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let record = TranscriptRecord {
            seq,
            ts_ms: chrono::Utc::now().timestamp_millis(),
            event: serde_json::from_str(&encode_event(event)?)?,
        };
        append_line(&self.path, &serde_json::to_string(&record)?)?;
        Ok(seq)
    }

    /// Events in sequence order. Lines holding a bare event (no record envelope) are accepted too.
    pub fn load(&self) -> Result<Vec<StreamEvent>, DecodeError> {
        load_records(&self.path)?
            .into_iter()
            .map(|record| decode_event_value(record.event))
            .collect()
    }
}

fn load_records(path: &Path) -> Result<Vec<TranscriptRecord>, DecodeError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line)?;
        if value.get("event").is_some() {
            records.push(serde_json::from_value(value)?);
        } else {
            let seq = records.len() as u64 + 1;
            records.push(TranscriptRecord {
                seq,
                ts_ms: 0,
                event: value,
            });
        }
    }
    records.sort_by_key(|record| record.seq);
    Ok(records)
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::actions::NewSection;
    use crate::state::PageId;
    use crate::state::SectionId;
    use crate::state::UserId;

    #[test]
    fn decodes_snake_case_tags() {
        let event = decode_event(
            r#"{"type":"page_section_content_delta","id":"s1","delta":"Hi"}"#,
        )
        .expect("decode");
        assert_eq!(
            event,
            StreamEvent::PageSectionContentDelta {
                id: SectionId::from("s1"),
                delta: "Hi".to_string(),
            }
        );
    }

    #[test]
    fn unknown_tag_is_unrecognized_not_an_error() {
        let event = decode_event(r#"{"type":"page_thumbnail_ready","url":"x"}"#).expect("decode");
        assert_eq!(
            event,
            StreamEvent::Unrecognized {
                kind: "page_thumbnail_ready".to_string()
            }
        );
    }

    #[test]
    fn known_tag_with_bad_fields_is_an_error() {
        let err = decode_event(r#"{"type":"page_content_delta"}"#).expect_err("missing delta");
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn missing_tag_is_an_error() {
        let err = decode_event(r#"{"delta":"x"}"#).expect_err("no tag");
        assert!(matches!(err, DecodeError::MissingTag));
    }

    #[test]
    fn transcript_appends_and_loads_in_order() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("stream.jsonl");
        let mut transcript = EventTranscript::open(&path).expect("open");

        let events = vec![
            StreamEvent::PageCreated {
                id: PageId::from("1"),
                author_id: UserId::from("u1"),
                title: "T".to_string(),
            },
            StreamEvent::PageSectionsCreated {
                sections: vec![NewSection {
                    id: SectionId::from("s1"),
                    title: "A".to_string(),
                }],
            },
            StreamEvent::Unrecognized {
                kind: "future_event".to_string(),
            },
        ];
        let seqs: Vec<u64> = events
            .iter()
            .map(|event| transcript.append(event).expect("append"))
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(transcript.load().expect("load"), events);

        let reopened = EventTranscript::open(&path).expect("reopen");
        assert_eq!(reopened.next_seq, 4);
    }

    #[test]
    fn bare_event_lines_are_accepted() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("bare.jsonl");
        std::fs::write(
            &path,
            "{\"type\":\"page_content_delta\",\"delta\":\"a\"}\n\n{\"type\":\"page_completed\",\"id\":\"1\"}\n",
        )
        .expect("write");

        let events = EventTranscript::open(&path)
            .expect("open")
            .load()
            .expect("load");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].tag(), "page_completed");
    }
}
