//! Persistent SQLite store for lecture records.

use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

/// The four kinds of media that can be attached to a lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Audio,
    Document,
    Presentation,
    Photo,
}

impl FileKind {
    pub const ALL: [FileKind; 4] = [
        FileKind::Audio,
        FileKind::Document,
        FileKind::Presentation,
        FileKind::Photo,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(FileKind::Audio),
            "document" => Some(FileKind::Document),
            "presentation" => Some(FileKind::Presentation),
            "photo" => Some(FileKind::Photo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Audio => "audio",
            FileKind::Document => "document",
            FileKind::Presentation => "presentation",
            FileKind::Photo => "photo",
        }
    }

    /// Button label shown in keyboards.
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Audio => "🎧 Audio",
            FileKind::Document => "📄 Document",
            FileKind::Presentation => "📊 Presentation",
            FileKind::Photo => "🖼 Photo",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label() == label)
    }

    fn column(&self) -> &'static str {
        match self {
            FileKind::Audio => "audio_file_id",
            FileKind::Document => "document_file_id",
            FileKind::Presentation => "presentation_file_id",
            FileKind::Photo => "photo_file_id",
        }
    }
}

/// A lecture record. File fields hold Telegram file ids.
#[derive(Debug, Clone)]
pub struct Lecture {
    pub id: i64,
    pub course: u8,
    pub topic: String,
    pub audio: Option<String>,
    pub document: Option<String>,
    pub presentation: Option<String>,
    pub photo: Option<String>,
}

impl Lecture {
    pub fn file(&self, kind: FileKind) -> Option<&str> {
        match kind {
            FileKind::Audio => self.audio.as_deref(),
            FileKind::Document => self.document.as_deref(),
            FileKind::Presentation => self.presentation.as_deref(),
            FileKind::Photo => self.photo.as_deref(),
        }
    }

    pub fn has_files(&self) -> bool {
        FileKind::ALL.into_iter().any(|k| self.file(k).is_some())
    }
}

/// Legacy rows may hold "" or the literal string "None" instead of NULL.
fn normalize(value: Option<String>) -> Option<String> {
    match value {
        Some(s) if s.is_empty() || s == "None" => None,
        other => other,
    }
}

fn lecture_from_row(row: &Row<'_>) -> rusqlite::Result<Lecture> {
    Ok(Lecture {
        id: row.get(0)?,
        course: row.get::<_, i64>(1)? as u8,
        topic: row.get(2)?,
        audio: normalize(row.get(3)?),
        document: normalize(row.get(4)?),
        presentation: normalize(row.get(5)?),
        photo: normalize(row.get(6)?),
    })
}

const LECTURE_COLUMNS: &str =
    "id, course, topic, audio_file_id, document_file_id, presentation_file_id, photo_file_id";

/// SQLite-backed lecture store. Every operation is a single statement, so
/// the engine's write serialization is the only locking the data needs.
pub struct LectureStore {
    conn: Mutex<Connection>,
}

impl LectureStore {
    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// In-memory store, used by tests.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("failed to open in-memory database");
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema().expect("failed to create schema");
        store
    }

    pub fn init_schema(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS lectures (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 course INTEGER NOT NULL,
                 topic TEXT NOT NULL,
                 audio_file_id TEXT,
                 document_file_id TEXT,
                 presentation_file_id TEXT,
                 photo_file_id TEXT
             );",
        )?;
        info!("lectures table checked or created");
        Ok(())
    }

    pub fn lecture_exists(&self, course: u8, topic: &str) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM lectures WHERE course = ?1 AND topic = ?2",
                params![course as i64, topic],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.is_some())
    }

    /// Insert a lecture with no files attached. Returns false (and leaves the
    /// table unchanged) when the (course, topic) pair already exists.
    pub fn add_lecture(&self, course: u8, topic: &str) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT INTO lectures (course, topic)
             SELECT ?1, ?2
             WHERE NOT EXISTS (SELECT 1 FROM lectures WHERE course = ?1 AND topic = ?2)",
            params![course as i64, topic],
        )?;
        if inserted > 0 {
            info!("added lecture: course={course}, topic='{topic}'");
        }
        Ok(inserted > 0)
    }

    pub fn get_lecture(&self, course: u8, topic: &str) -> rusqlite::Result<Option<Lecture>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {LECTURE_COLUMNS} FROM lectures WHERE course = ?1 AND topic = ?2"),
            params![course as i64, topic],
            lecture_from_row,
        )
        .optional()
    }

    /// Lookup by row id. Callback payloads carry ids because the full
    /// (course, topic) pair can blow Telegram's callback-data size limit.
    pub fn get_lecture_by_id(&self, id: i64) -> rusqlite::Result<Option<Lecture>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {LECTURE_COLUMNS} FROM lectures WHERE id = ?1"),
            params![id],
            lecture_from_row,
        )
        .optional()
    }

    /// Attach (or overwrite) one file reference. An unrecognized `file_type`
    /// is logged and reported as false without touching the record.
    pub fn update_lecture_file(
        &self,
        course: u8,
        topic: &str,
        file_type: &str,
        file_id: &str,
    ) -> rusqlite::Result<bool> {
        let Some(kind) = FileKind::parse(file_type) else {
            error!("unknown file type: {file_type}");
            return Ok(false);
        };
        let file_id = normalize(Some(file_id.to_string()));

        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            &format!(
                "UPDATE lectures SET {} = ?1 WHERE course = ?2 AND topic = ?3",
                kind.column()
            ),
            params![file_id, course as i64, topic],
        )?;
        if updated > 0 {
            info!("updated {file_type} file for course {course}, topic '{topic}'");
        }
        Ok(updated > 0)
    }

    pub fn topics_by_course(&self, course: u8) -> rusqlite::Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT DISTINCT topic FROM lectures WHERE course = ?1 ORDER BY topic")?;
        let rows = stmt.query_map(params![course as i64], |row| row.get(0))?;
        rows.collect()
    }

    pub fn all_courses(&self) -> rusqlite::Result<Vec<u8>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT course FROM lectures ORDER BY course")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0).map(|c| c as u8))?;
        rows.collect()
    }

    pub fn all_lectures(&self) -> rusqlite::Result<Vec<Lecture>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT {LECTURE_COLUMNS} FROM lectures ORDER BY course, topic"))?;
        let rows = stmt.query_map([], lecture_from_row)?;
        rows.collect()
    }

    /// Remove the matching record. Deleting a pair that does not exist is a no-op.
    pub fn delete_lecture(&self, course: u8, topic: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM lectures WHERE course = ?1 AND topic = ?2",
            params![course as i64, topic],
        )?;
        if deleted > 0 {
            info!("deleted lecture: course={course}, topic='{topic}'");
        }
        Ok(())
    }

    pub fn photo_id(&self, course: u8, topic: &str) -> rusqlite::Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let id: Option<Option<String>> = conn
            .query_row(
                "SELECT photo_file_id FROM lectures WHERE course = ?1 AND topic = ?2",
                params![course as i64, topic],
                |row| row.get(0),
            )
            .optional()?;
        Ok(normalize(id.flatten()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_exists() {
        let store = LectureStore::in_memory();
        assert!(!store.lecture_exists(1, "Intro").unwrap());
        assert!(store.add_lecture(1, "Intro").unwrap());
        assert!(store.lecture_exists(1, "Intro").unwrap());
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let store = LectureStore::in_memory();
        assert!(store.add_lecture(2, "Networks").unwrap());
        assert!(!store.add_lecture(2, "Networks").unwrap());
        assert_eq!(store.all_lectures().unwrap().len(), 1);
    }

    #[test]
    fn test_new_lecture_has_no_files() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();
        let lecture = store.get_lecture(1, "Intro").unwrap().unwrap();
        assert!(!lecture.has_files());
    }

    #[test]
    fn test_get_lecture_by_id() {
        let store = LectureStore::in_memory();
        store.add_lecture(3, "Graphs").unwrap();
        let id = store.get_lecture(3, "Graphs").unwrap().unwrap().id;
        let lecture = store.get_lecture_by_id(id).unwrap().unwrap();
        assert_eq!(lecture.course, 3);
        assert_eq!(lecture.topic, "Graphs");
        assert!(store.get_lecture_by_id(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_update_file_then_lookup() {
        let store = LectureStore::in_memory();
        store.add_lecture(2, "Networks").unwrap();
        assert!(store.update_lecture_file(2, "Networks", "document", "doc123").unwrap());

        let lecture = store.get_lecture(2, "Networks").unwrap().unwrap();
        assert_eq!(lecture.document.as_deref(), Some("doc123"));
        assert!(lecture.audio.is_none());
        assert!(lecture.presentation.is_none());
        assert!(lecture.photo.is_none());
    }

    #[test]
    fn test_update_file_unknown_type_is_noop() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();
        store.update_lecture_file(1, "Intro", "photo", "p1").unwrap();

        assert!(!store.update_lecture_file(1, "Intro", "video", "v1").unwrap());
        let lecture = store.get_lecture(1, "Intro").unwrap().unwrap();
        assert_eq!(lecture.photo.as_deref(), Some("p1"));
        assert!(lecture.document.is_none());
    }

    #[test]
    fn test_sentinel_file_values_report_as_absent() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();
        store.update_lecture_file(1, "Intro", "audio", "").unwrap();
        store.update_lecture_file(1, "Intro", "document", "None").unwrap();

        let lecture = store.get_lecture(1, "Intro").unwrap().unwrap();
        assert!(lecture.audio.is_none());
        assert!(lecture.document.is_none());
    }

    #[test]
    fn test_courses_and_topics_distinct_ascending() {
        let store = LectureStore::in_memory();
        store.add_lecture(3, "Zeta").unwrap();
        store.add_lecture(1, "Beta").unwrap();
        store.add_lecture(1, "Alpha").unwrap();
        store.add_lecture(3, "Alpha").unwrap();

        assert_eq!(store.all_courses().unwrap(), vec![1, 3]);
        assert_eq!(store.topics_by_course(1).unwrap(), vec!["Alpha", "Beta"]);
        assert!(store.topics_by_course(2).unwrap().is_empty());
    }

    #[test]
    fn test_all_lectures_ordered_by_course_then_topic() {
        let store = LectureStore::in_memory();
        store.add_lecture(2, "B").unwrap();
        store.add_lecture(1, "Z").unwrap();
        store.add_lecture(2, "A").unwrap();

        let rows: Vec<(u8, String)> = store
            .all_lectures()
            .unwrap()
            .into_iter()
            .map(|l| (l.course, l.topic))
            .collect();
        assert_eq!(
            rows,
            vec![(1, "Z".to_string()), (2, "A".to_string()), (2, "B".to_string())]
        );
    }

    #[test]
    fn test_delete_lecture() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();
        store.delete_lecture(1, "Intro").unwrap();
        assert!(!store.lecture_exists(1, "Intro").unwrap());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();
        store.delete_lecture(4, "Ghost").unwrap();
        assert_eq!(store.all_lectures().unwrap().len(), 1);
    }

    #[test]
    fn test_photo_id() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();
        assert!(store.photo_id(1, "Intro").unwrap().is_none());
        store.update_lecture_file(1, "Intro", "photo", "ph42").unwrap();
        assert_eq!(store.photo_id(1, "Intro").unwrap().as_deref(), Some("ph42"));
        assert!(store.photo_id(2, "Missing").unwrap().is_none());
    }

    #[test]
    fn test_file_kind_parse_roundtrip() {
        for kind in FileKind::ALL {
            assert_eq!(FileKind::parse(kind.as_str()), Some(kind));
            assert_eq!(FileKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(FileKind::parse("video"), None);
    }
}
