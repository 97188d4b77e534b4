// src/storage/mongo.rs
//! MongoDB store backends.
//!
//! Two collections: `channel_states` (one document per channel, unique on
//! `channel_id`) and `vacancies` (unique compound index on
//! `(telegram_message_id, channel_id)`; the index, not the pre-insert
//! probe, is what actually guarantees dedup under restarts and overlap).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::models::{CandidateVacancy, ContactInfo, SalaryInfo, StoredVacancy, WorkFormat};
use crate::storage::{
    CursorStore, SaveOutcome, SortOrder, StoreError, VacancyPage, VacancyQuery, VacancyStore,
};

pub const CURSOR_COLLECTION: &str = "channel_states";
pub const VACANCY_COLLECTION: &str = "vacancies";

/// Create the two unique indexes the pipeline's correctness relies on.
/// Safe to call on every startup; index creation is idempotent.
pub async fn ensure_indexes(db: &Database) -> Result<(), StoreError> {
    let cursors: Collection<CursorDoc> = db.collection(CURSOR_COLLECTION);
    cursors
        .create_index(
            IndexModel::builder()
                .keys(doc! { "channel_id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    let vacancies: Collection<VacancyDoc> = db.collection(VACANCY_COLLECTION);
    vacancies
        .create_index(
            IndexModel::builder()
                .keys(doc! { "telegram_message_id": 1, "channel_id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;
    Ok(())
}

fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == 11000,
        _ => false,
    }
}

fn to_bson_dt(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

fn from_bson_dt(dt: BsonDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

// --- Documents ---

#[derive(Debug, Serialize, Deserialize)]
struct CursorDoc {
    channel_id: String,
    last_message_id: i64,
    updated_at: BsonDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct VacancyDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    title: String,
    published_date: BsonDateTime,
    work_format: WorkFormat,
    salary: SalaryInfo,
    location: String,
    company: String,
    description: String,
    contacts: ContactInfo,
    raw_text: String,
    telegram_message_id: i64,
    channel_id: String,
    parsed_at: BsonDateTime,
}

impl VacancyDoc {
    fn from_candidate(
        candidate: &CandidateVacancy,
        telegram_message_id: i64,
        channel_id: &str,
        parsed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            title: candidate.title.clone(),
            published_date: to_bson_dt(candidate.published_date),
            work_format: candidate.work_format,
            salary: candidate.salary.clone(),
            location: candidate.location.clone(),
            company: candidate.company.clone(),
            description: candidate.description.clone(),
            contacts: candidate.contacts.clone(),
            raw_text: candidate.raw_text.clone(),
            telegram_message_id,
            channel_id: channel_id.to_string(),
            parsed_at: to_bson_dt(parsed_at),
        }
    }

    fn into_stored(self) -> StoredVacancy {
        StoredVacancy {
            id: self.id.map(|o| o.to_hex()).unwrap_or_default(),
            vacancy: CandidateVacancy {
                title: self.title,
                published_date: from_bson_dt(self.published_date),
                work_format: self.work_format,
                salary: self.salary,
                location: self.location,
                company: self.company,
                description: self.description,
                contacts: self.contacts,
                raw_text: self.raw_text,
            },
            telegram_message_id: self.telegram_message_id,
            channel_id: self.channel_id,
            parsed_at: from_bson_dt(self.parsed_at),
        }
    }
}

// --- Cursor store ---

pub struct MongoCursorStore {
    coll: Collection<CursorDoc>,
}

impl MongoCursorStore {
    pub fn new(db: &Database) -> Self {
        Self {
            coll: db.collection(CURSOR_COLLECTION),
        }
    }
}

#[async_trait]
impl CursorStore for MongoCursorStore {
    async fn last_message_id(&self, channel_id: &str) -> Result<i64, StoreError> {
        let state = self.coll.find_one(doc! { "channel_id": channel_id }).await?;
        Ok(state.map(|s| s.last_message_id).unwrap_or(0))
    }

    async fn advance(&self, channel_id: &str, message_id: i64) -> Result<(), StoreError> {
        // $max keeps the cursor monotone even if a stale advance slips in.
        self.coll
            .update_one(
                doc! { "channel_id": channel_id },
                doc! {
                    "$max": { "last_message_id": message_id },
                    "$set": { "updated_at": BsonDateTime::now() },
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }
}

// --- Vacancy store ---

pub struct MongoVacancyStore {
    coll: Collection<VacancyDoc>,
}

impl MongoVacancyStore {
    pub fn new(db: &Database) -> Self {
        Self {
            coll: db.collection(VACANCY_COLLECTION),
        }
    }
}

fn build_filter(query: &VacancyQuery) -> Document {
    let mut filter = Document::new();

    if let Some(company) = &query.company {
        filter.insert(
            "company",
            doc! { "$regex": regex::escape(company), "$options": "i" },
        );
    }

    if let Some(spec) = &query.specialization {
        let pattern = regex::escape(spec);
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": &pattern, "$options": "i" } },
                doc! { "description": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }

    match (query.salary_min, query.salary_max) {
        (Some(min), Some(max)) => {
            filter.insert(
                "$and",
                vec![
                    doc! { "salary.range.min": { "$lte": max } },
                    doc! { "salary.range.max": { "$gte": min } },
                ],
            );
        }
        (Some(min), None) => {
            filter.insert("salary.range.max", doc! { "$gte": min });
        }
        (None, Some(max)) => {
            filter.insert("salary.range.min", doc! { "$lte": max });
        }
        (None, None) => {}
    }

    filter
}

#[async_trait]
impl VacancyStore for MongoVacancyStore {
    async fn save_if_new(
        &self,
        candidate: &CandidateVacancy,
        telegram_message_id: i64,
        channel_id: &str,
    ) -> Result<SaveOutcome, StoreError> {
        if self.exists(telegram_message_id, channel_id).await? {
            return Ok(SaveOutcome::AlreadyExists);
        }

        let document =
            VacancyDoc::from_candidate(candidate, telegram_message_id, channel_id, Utc::now());
        match self.coll.insert_one(document).await {
            Ok(_) => Ok(SaveOutcome::Inserted),
            Err(e) if is_duplicate_key_error(&e) => Ok(SaveOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(
        &self,
        telegram_message_id: i64,
        channel_id: &str,
    ) -> Result<bool, StoreError> {
        let found = self
            .coll
            .find_one(doc! {
                "telegram_message_id": telegram_message_id,
                "channel_id": channel_id,
            })
            .await?;
        Ok(found.is_some())
    }

    async fn list(&self, query: &VacancyQuery) -> Result<VacancyPage, StoreError> {
        let filter = build_filter(query);
        let total = self.coll.count_documents(filter.clone()).await?;

        let order = match query.sort_order {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        let mut sort = Document::new();
        sort.insert(query.sort_by.as_str(), order);
        let cursor = self
            .coll
            .find(filter)
            .sort(sort)
            .skip(query.skip)
            .limit(query.limit)
            .await?;
        let docs: Vec<VacancyDoc> = cursor.try_collect().await?;

        Ok(VacancyPage {
            vacancies: docs.into_iter().map(VacancyDoc::into_stored).collect(),
            total,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<StoredVacancy>, StoreError> {
        let oid =
            ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))?;
        let found = self.coll.find_one(doc! { "_id": oid }).await?;
        Ok(found.map(VacancyDoc::into_stored))
    }
}
