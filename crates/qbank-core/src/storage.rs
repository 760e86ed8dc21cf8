use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use uuid::Uuid;

use crate::{
    ingest::{fingerprint, normalize_text, word_set, Deduplicator},
    question::{Category, ParsedQuestion},
    Error, Result,
};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    fingerprint TEXT NOT NULL UNIQUE,
    normalized_text TEXT NOT NULL,
    category TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    question_type TEXT NOT NULL,
    source TEXT,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_questions_category ON questions(category);
CREATE INDEX IF NOT EXISTS idx_questions_created ON questions(created_at);
"#;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQuestion {
    pub id: Uuid,
    #[serde(flatten)]
    pub question: ParsedQuestion,
    pub created_at: DateTime<Utc>,
}

/// Where parsed questions go once a document has been processed.
#[async_trait]
pub trait QuestionSink: Send + Sync {
    async fn import_questions(&self, questions: &[ParsedQuestion]) -> Result<ImportSummary>;
}

/// SQLite question bank. Rejects questions already present, exactly or by
/// near-duplicate stem.
pub struct QuestionStore {
    pool: Pool<Sqlite>,
    deduplicator: Deduplicator,
}

impl QuestionStore {
    pub async fn open(path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{path}?mode=rwc"))
            .await?;

        Self::init(pool).await
    }

    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::init(pool).await
    }

    async fn init(pool: Pool<Sqlite>) -> Result<Self> {
        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            deduplicator: Deduplicator::default(),
        })
    }

    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.deduplicator = Deduplicator::new(threshold);
        self
    }

    pub async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub async fn get_question(&self, id: Uuid) -> Result<StoredQuestion> {
        let row: (String, String, String) =
            sqlx::query_as("SELECT id, data, created_at FROM questions WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or(Error::QuestionNotFound(id))?;

        parse_question_row(row)
    }

    pub async fn list_questions(&self, category: Option<Category>) -> Result<Vec<StoredQuestion>> {
        let rows: Vec<(String, String, String)> = match category {
            Some(c) => {
                sqlx::query_as(
                    r#"
                    SELECT id, data, created_at FROM questions
                    WHERE category = ? ORDER BY created_at, id
                    "#,
                )
                .bind(c.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT id, data, created_at FROM questions ORDER BY created_at, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(parse_question_row).collect()
    }

    async fn known_questions(&self) -> Result<(HashSet<String>, Vec<HashSet<String>>)> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT fingerprint, normalized_text FROM questions")
                .fetch_all(&self.pool)
                .await?;

        let mut fingerprints = HashSet::with_capacity(rows.len());
        let mut stems = Vec::with_capacity(rows.len());
        for (fp, text) in rows {
            fingerprints.insert(fp);
            stems.push(word_set(&text));
        }

        Ok((fingerprints, stems))
    }
}

#[async_trait]
impl QuestionSink for QuestionStore {
    async fn import_questions(&self, questions: &[ParsedQuestion]) -> Result<ImportSummary> {
        let (mut fingerprints, mut stems) = self.known_questions().await?;
        let mut summary = ImportSummary::default();

        let mut tx = self.pool.begin().await?;

        for question in questions {
            let fp = fingerprint(question);
            let words = word_set(&question.text);

            if fingerprints.contains(&fp) || self.deduplicator.is_near_duplicate(&words, &stems) {
                summary.skipped += 1;
                continue;
            }

            let id = Uuid::now_v7();
            let data_json = serde_json::to_string(question)?;

            sqlx::query(
                r#"
                INSERT INTO questions (id, fingerprint, normalized_text, category, difficulty, question_type, source, data, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id.to_string())
            .bind(&fp)
            .bind(normalize_text(&question.text))
            .bind(question.category.as_str())
            .bind(question.difficulty.as_str())
            .bind(question.question_type.as_str())
            .bind(question.source.as_deref())
            .bind(data_json)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

            fingerprints.insert(fp);
            stems.push(words);
            summary.imported += 1;
            summary.ids.push(id);
        }

        tx.commit().await?;

        tracing::info!(
            "Stored {} questions, skipped {} already in the bank",
            summary.imported,
            summary.skipped
        );

        Ok(summary)
    }
}

fn parse_question_row(row: (String, String, String)) -> Result<StoredQuestion> {
    let (id, data_json, created_at) = row;

    let corrupt = |message: String| Error::CorruptRecord {
        id: id.clone(),
        message,
    };

    Ok(StoredQuestion {
        id: id.parse().map_err(|e: uuid::Error| corrupt(e.to_string()))?,
        question: serde_json::from_str(&data_json)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| corrupt(e.to_string()))?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::{Difficulty, QuestionOption};

    fn question(text: &str, category: Category) -> ParsedQuestion {
        ParsedQuestion::new(
            text.to_string(),
            vec![QuestionOption::new('A', "Yes"), QuestionOption::new('B', "No")],
            vec!["A".to_string()],
        )
        .with_category(category)
        .with_source("bank.csv".to_string())
    }

    #[tokio::test]
    async fn test_import_and_read_back() {
        let store = QuestionStore::open_memory().await.unwrap();

        let summary = store
            .import_questions(&[
                question("Is digoxin a cardiac glycoside?", Category::Pharmacology),
                question("Should the bed rails be raised for a sedated client?", Category::SafetyAndInfectionControl),
            ])
            .await
            .unwrap();

        assert_eq!(summary.imported, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(store.count().await.unwrap(), 2);

        let stored = store.get_question(summary.ids[0]).await.unwrap();
        assert_eq!(stored.question.text, "Is digoxin a cardiac glycoside?");
        assert_eq!(stored.question.difficulty, Difficulty::Medium);
        assert_eq!(stored.question.source.as_deref(), Some("bank.csv"));

        let pharm = store.list_questions(Some(Category::Pharmacology)).await.unwrap();
        assert_eq!(pharm.len(), 1);
        assert_eq!(store.list_questions(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reimport_is_skipped() {
        let store = QuestionStore::open_memory().await.unwrap();
        let batch = [question("Is digoxin a cardiac glycoside?", Category::Pharmacology)];

        store.import_questions(&batch).await.unwrap();
        let again = store.import_questions(&batch).await.unwrap();

        assert_eq!(again.imported, 0);
        assert_eq!(again.skipped, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_near_duplicate_of_stored_stem_is_skipped() {
        let store = QuestionStore::open_memory().await.unwrap();
        store
            .import_questions(&[question(
                "Which of the following findings should the nurse report immediately to the primary health care provider?",
                Category::ManagementOfCare,
            )])
            .await
            .unwrap();

        let summary = store
            .import_questions(&[
                question(
                    "Which of the following findings should the nurse report promptly to the primary health care provider?",
                    Category::ManagementOfCare,
                ),
                question("Is digoxin a cardiac glycoside?", Category::Pharmacology),
            ])
            .await
            .unwrap();

        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_missing_question() {
        let store = QuestionStore::open_memory().await.unwrap();
        let id = Uuid::now_v7();

        assert!(matches!(
            store.get_question(id).await,
            Err(Error::QuestionNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_store_as_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.db");
        let store = QuestionStore::open(path.to_str().unwrap()).await.unwrap();
        let sink: &dyn QuestionSink = &store;

        let summary = sink
            .import_questions(&[question("Is digoxin a cardiac glycoside?", Category::Pharmacology)])
            .await
            .unwrap();

        assert_eq!(summary.ids.len(), 1);
        assert!(path.exists());
    }
}
