//! End-to-end tests: log text in, ownership and activity tables out.

use rpo_core::parser::{BlameTraceParser, LogFormat, LogRecordParser, StreamOrder};
use rpo_core::{
    Attributor, AttributionOptions, CommitIndex, CommitRecord, HistorySource, HistoryStore,
    Identity, IngestOptions, Ingestor, LogQuery, ObjectId, Reporter, Result, SelectionFilter,
    SelectionOptions, SqliteHistoryStore, Table, Timestamp, Value, Warning,
};
use std::collections::HashMap;
use std::sync::Arc;

const INC_BLAME: &str = include_str!("../fixtures/inc_blame.txt");
const BLOB: &str = "0000000000000000000000000000000000000000";

fn oid(hex: &str) -> ObjectId {
    hex.parse().unwrap()
}

fn repeat(c: char) -> String {
    c.to_string().repeat(40)
}

/// One commit rendered as a header plus numstat lines.
fn entry(format: &LogFormat, sha: &str, name: &str, time: &str, stats: &[(&str, &str, &str)]) -> String {
    let email = format!("{}@example.com", name.to_lowercase());
    let tree = repeat('0');
    let header = [sha, name, &email, time, name, &email, time, &tree].join(&format.delimiter().to_string());
    let mut out = format!("{header}\n\n");
    for (ins, del, path) in stats {
        out.push_str(&format!("{ins}\t{del}\t{path}\n"));
    }
    out
}

/// A repository served from canned text.
#[derive(Default)]
struct CannedRepo {
    /// Newest first.
    log: Vec<(ObjectId, String)>,
    files: HashMap<String, Vec<(String, String)>>,
}

impl CannedRepo {
    fn commit(&mut self, sha: &str, text: String) {
        self.log.insert(0, (oid(sha), text));
    }

    fn file(&mut self, revision: &str, path: &str, blame: &str) {
        self.files
            .entry(revision.to_string())
            .or_default()
            .push((path.to_string(), blame.to_string()));
    }
}

impl HistorySource for CannedRepo {
    fn head(&self) -> Result<ObjectId> {
        self.log
            .first()
            .map(|(sha, _)| *sha)
            .ok_or_else(|| rpo_core::Error::Source("empty repository".into()))
    }

    fn log_stream(&self, query: &LogQuery, _format: &LogFormat) -> Result<String> {
        Ok(self
            .log
            .iter()
            .take_while(|(sha, _)| Some(*sha) != query.since)
            .map(|(_, text)| text.as_str())
            .collect())
    }

    fn blame_stream(&self, revision: &str, path: &str, _ignore_whitespace: bool) -> Result<String> {
        self.files
            .get(revision)
            .and_then(|files| files.iter().find(|(p, _)| p == path))
            .map(|(_, blame)| blame.clone())
            .ok_or_else(|| rpo_core::Error::Source(format!("{path} not in {revision}")))
    }

    fn file_listing(&self, revision: &str) -> Result<String> {
        Ok(self
            .files
            .get(revision)
            .into_iter()
            .flatten()
            .map(|(path, _)| format!("{BLOB} {path}\n"))
            .collect())
    }
}

fn person(sha: &str, name: &str) -> CommitRecord {
    let at = Timestamp::parse("2025-06-22T10:23:45+00:00").unwrap();
    let who = Identity::new(name, format!("{}@example.com", name.to_lowercase()));
    CommitRecord {
        sha: oid(sha),
        author: who.clone(),
        committer: who,
        authored: at,
        committed: at,
        tree: oid(&repeat('0')),
    }
}

/// Value in `column` of the row whose `key` cell equals `value`.
fn lookup(table: &Table, key: &str, value: &Value, column: &str) -> Option<i64> {
    let k = table.column_index(key)?;
    let c = table.column_index(column)?;
    table
        .rows()
        .iter()
        .find(|row| &row[k] == value)
        .and_then(|row| row[c].as_int())
}

#[test]
fn test_incremental_blame_fixture() {
    let hunks: Vec<_> = BlameTraceParser.parse(INC_BLAME, "README.md").collect();

    assert_eq!(hunks.len(), 50);
    assert_eq!(hunks[0].sha, oid("13188e5453ae23bee9dedcc1d1aae569b57ef633"));
    assert_eq!(hunks[0].line_count, 1);
    assert_eq!(hunks[49].sha, oid("12a384f738a835cee8f454f47b9c4a6fe2f738ce"));
    assert_eq!(hunks[49].line_count, 7);
    assert_eq!(hunks.iter().map(|h| h.line_count).sum::<u64>(), 181);
    assert!(hunks.iter().all(|h| h.path == "README.md"));
}

#[test]
fn test_custom_delimiter_log() {
    let format = LogFormat::with_delimiter('|');
    let text = [
        entry(&format, &repeat('b'), "Bo", "2025-06-23T09:00:00+02:00", &[("3", "1", "src/lib.rs"), ("-", "-", "logo.png")]),
        entry(&format, &repeat('a'), "Ada", "2025-06-22T10:23:45+00:00", &[("10", "0", "src/lib.rs")]),
    ]
    .concat();

    let parsed = LogRecordParser::new(format)
        .collect(&text, StreamOrder::OldestFirst)
        .unwrap();

    assert!(parsed.is_clean());
    let shas: Vec<_> = parsed.value.iter().map(|cs| cs.commit.sha).collect();
    assert_eq!(shas, vec![oid(&repeat('a')), oid(&repeat('b'))]);
    assert_eq!(parsed.value[1].lines(), 4);
    assert!(parsed.value[1].changes[1].is_binary);
}

#[tokio::test]
async fn test_incremental_ingestion_and_activity() {
    let format = LogFormat::default();
    let mut repo = CannedRepo::default();
    repo.commit(&repeat('a'), entry(&format, &repeat('a'), "Ada", "2025-06-01T10:00:00+00:00", &[("10", "0", "src/lib.rs"), ("200", "0", "Cargo.lock")]));
    repo.commit(&repeat('b'), entry(&format, &repeat('b'), "Bo", "2025-06-02T10:00:00+00:00", &[("4", "2", "src/lib.rs")]));

    let store = SqliteHistoryStore::in_memory().unwrap();
    let ingestor = Ingestor::new(IngestOptions::default()).unwrap();

    let first = ingestor.run(&repo, &store).await.unwrap();
    assert!(first.is_clean());
    assert_eq!(first.value.commits_inserted, 2);

    let again = ingestor.run(&repo, &store).await.unwrap();
    assert_eq!(again.value.commits_inserted, 0);
    assert_eq!(again.value.since, Some(oid(&repeat('b'))));

    repo.commit(&repeat('c'), entry(&format, &repeat('c'), "Ada", "2025-06-03T10:00:00+00:00", &[("1", "1", "README.md")]));
    let third = ingestor.run(&repo, &store).await.unwrap();
    assert_eq!(third.value.commits_inserted, 1);
    assert_eq!(store.commit_count().await.unwrap(), 3);
    assert_eq!(store.file_change_count().await.unwrap(), 4);

    let options = SelectionOptions {
        descending: true,
        sort_by: Some("net".into()),
        ..Default::default()
    };
    let reporter = Reporter::new(&options).unwrap();
    let rows = store.file_changes().await.unwrap();
    let activity = reporter.contributors(&rows).unwrap().value;

    // Cargo.lock is generated and ignored by default.
    let ada = Value::from("Ada");
    assert_eq!(lookup(&activity, "author_name", &ada, "insertions"), Some(11));
    assert_eq!(lookup(&activity, "author_name", &ada, "deletions"), Some(1));
    assert_eq!(lookup(&activity, "author_name", &Value::from("Bo"), "net"), Some(2));
    assert_eq!(activity.get(0, "author_name"), Some(&ada));
}

#[test]
fn test_ownership_from_fixture() {
    let mut repo = CannedRepo::default();
    repo.file("HEAD", "README.md", INC_BLAME);

    let index = CommitIndex::from_commits([
        person("c43098e395f26e0accf50af0b44976c96b735159", "Ada"),
        person("12a384f738a835cee8f454f47b9c4a6fe2f738ce", "Bo"),
    ]);
    let options = SelectionOptions::default();
    let attributor = Attributor::new(
        Arc::new(repo),
        Arc::new(index),
        SelectionFilter::new(&options).unwrap(),
        AttributionOptions::default(),
    );

    let owned = attributor.ownership_at("HEAD", &options.rank_spec()).unwrap();
    let table = &owned.value;

    assert_eq!(lookup(table, "author_name", &Value::from("Ada"), "line_count"), Some(35));
    assert_eq!(lookup(table, "author_name", &Value::from("Bo"), "line_count"), Some(32));
    assert_eq!(lookup(table, "author_name", &Value::Null, "line_count"), Some(114));
    assert!(!owned.warnings.is_empty());
    assert!(owned
        .warnings
        .iter()
        .all(|w| matches!(w, Warning::UnresolvedCommit { .. })));
}

#[test]
fn test_over_time_columns_match_snapshots() {
    let a = repeat('a');
    let b = repeat('b');
    let mut repo = CannedRepo::default();
    repo.file("r1", "src/lib.rs", &format!("{a} 1 1 3\nfilename src/lib.rs\n"));
    repo.file("r2", "src/lib.rs", &format!("{a} 1 1 2\nfilename src/lib.rs\n{b} 3 3 4\nfilename src/lib.rs\n"));
    repo.file("r2", "vendor/dep.js", &format!("{b} 1 1 50\nfilename vendor/dep.js\n"));

    let index = CommitIndex::from_commits([person(&a, "Ada"), person(&b, "Bo")]);
    let options = SelectionOptions {
        exclude_globs: vec!["vendor/**".into()],
        include_globs: vec!["**/*.rs".into(), "vendor/**".into()],
        ..Default::default()
    };
    let attributor = Attributor::new(
        Arc::new(repo),
        Arc::new(index),
        SelectionFilter::new(&options).unwrap(),
        AttributionOptions {
            workers: 2,
            batch_size: 1,
            ..Default::default()
        },
    );

    let revisions = vec!["r1".to_string(), "r2".to_string(), "r1".to_string()];
    let matrix = attributor.attribute_over_time(&revisions).unwrap();
    assert!(matrix.is_clean());
    let matrix = matrix.value;

    assert_eq!(matrix.column_names(), vec!["author_name", "r1", "r2"]);
    for rev in ["r1", "r2"] {
        let snapshot = attributor.attribute_at(rev).unwrap().value;
        assert_eq!(matrix.sum(rev).unwrap(), snapshot.sum("line_count").unwrap());
    }
    // Excluded globs win over included ones.
    assert_eq!(matrix.sum("r2").unwrap(), 6);
    assert_eq!(lookup(&matrix, "author_name", &Value::from("Bo"), "r1"), Some(0));
}
