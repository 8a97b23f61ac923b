//! MongoDB document store.
//!
//! Documents cross the boundary as JSON objects. Known timestamp fields are
//! written as BSON dates so the collections stay compatible with the data the
//! previous deployment wrote, and read back as RFC 3339 strings.

use async_trait::async_trait;
use bson::{doc, Bson};
use futures_util::TryStreamExt;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use mysthaven_core::{Condition, Document, Filter, HavenError, HavenResult, StorageError, Update};
use serde_json::Value;
use tracing::{debug, info};

use super::traits::DocumentStore;

/// Mongo's duplicate key error code.
const DUPLICATE_KEY: i32 = 11000;

/// Fields stored as BSON dates.
const DATE_FIELDS: &[&str] = &["createdAt", "endDate", "emojiExpiresAt", "nameExpiresAt"];

/// Driver bookkeeping fields never exposed to callers.
const HIDDEN_FIELDS: &[&str] = &["_id", "__v"];

#[derive(Clone)]
pub struct MongoDocumentStore {
    database: Database,
}

impl MongoDocumentStore {
    /// Connect and verify the connection with a ping.
    pub async fn connect(uri: &str, db_name: &str) -> HavenResult<Self> {
        info!(db = %db_name, "Connecting to MongoDB");

        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(unavailable)?;
        let store = Self {
            database: client.database(db_name),
        };
        store.ping().await?;

        info!(db = %db_name, "Connected to MongoDB");
        Ok(store)
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.database.collection::<bson::Document>(name)
    }
}

fn unavailable(e: MongoError) -> HavenError {
    StorageError::Unavailable {
        reason: e.to_string(),
    }
    .into()
}

/// Map driver errors, singling out unique index violations.
fn map_write_error(collection: &str, e: MongoError) -> HavenError {
    let duplicate = match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => {
            (we.code == DUPLICATE_KEY).then(|| we.message.clone())
        }
        ErrorKind::Command(ce) => (ce.code == DUPLICATE_KEY).then(|| ce.message.clone()),
        _ => None,
    };
    match duplicate {
        Some(message) => {
            let (field, value) = parse_duplicate_message(&message);
            StorageError::DuplicateKey {
                collection: collection.to_string(),
                field,
                value,
            }
            .into()
        }
        None => unavailable(e),
    }
}

/// Extract field and value from `... dup key: { channelId: "123" }`.
fn parse_duplicate_message(message: &str) -> (String, String) {
    let Some(start) = message.find("dup key: {") else {
        return ("unknown".to_string(), message.to_string());
    };
    let body = message[start + "dup key: {".len()..]
        .trim_end_matches('}')
        .trim();
    match body.split_once(':') {
        Some((field, value)) => (
            field.trim().to_string(),
            value.trim().trim_matches('"').to_string(),
        ),
        None => ("unknown".to_string(), body.to_string()),
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

fn to_bson_value(field: &str, value: &Value) -> HavenResult<Bson> {
    if DATE_FIELDS.contains(&field) {
        if let Value::String(raw) = value {
            if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
                return Ok(Bson::DateTime(bson::DateTime::from_chrono(
                    ts.with_timezone(&chrono::Utc),
                )));
            }
        }
    }
    bson::to_bson(value).map_err(|e| {
        HavenError::from(StorageError::MalformedDocument {
            collection: field.to_string(),
            reason: e.to_string(),
        })
    })
}

fn to_bson_document(doc: &Document) -> HavenResult<bson::Document> {
    let mut out = bson::Document::new();
    for (field, value) in doc {
        out.insert(field.clone(), to_bson_value(field, value)?);
    }
    Ok(out)
}

fn from_bson_value(value: Bson) -> Value {
    match value {
        Bson::DateTime(dt) => Value::String(
            dt.to_chrono()
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        ),
        // Integral doubles come from JS number writes; keep them integral.
        Bson::Double(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Value::from(f as i64)
        }
        Bson::Array(items) => Value::Array(items.into_iter().map(from_bson_value).collect()),
        other => other.into_relaxed_extjson(),
    }
}

fn from_bson_document(doc: bson::Document) -> Document {
    doc.into_iter()
        .filter(|(field, _)| !HIDDEN_FIELDS.contains(&field.as_str()))
        .map(|(field, value)| (field, from_bson_value(value)))
        .collect()
}

fn filter_to_bson(filter: &Filter) -> HavenResult<bson::Document> {
    let mut out = bson::Document::new();
    for condition in filter.conditions() {
        match condition {
            Condition::Eq { field, value } => {
                out.insert(field.clone(), to_bson_value(field, value)?);
            }
            Condition::NotContains { field, value } => {
                out.insert(field.clone(), doc! { "$ne": to_bson_value(field, value)? });
            }
        }
    }
    Ok(out)
}

fn update_to_bson(update: &Update) -> HavenResult<bson::Document> {
    let mut out = bson::Document::new();
    let parts = [
        ("$set", update.set_fields()),
        ("$setOnInsert", update.set_on_insert_fields()),
        ("$addToSet", update.add_to_set_fields()),
        ("$pull", update.pull_fields()),
    ];
    for (operator, fields) in parts {
        if !fields.is_empty() {
            out.insert(operator, to_bson_document(fields)?);
        }
    }
    Ok(out)
}

// ============================================================================
// STORE
// ============================================================================

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> HavenResult<Option<Document>> {
        let found = self
            .collection(collection)
            .find_one(filter_to_bson(filter)?)
            .await
            .map_err(unavailable)?;
        Ok(found.map(from_bson_document))
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> HavenResult<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .find(filter_to_bson(filter)?)
            .await
            .map_err(unavailable)?;
        let docs: Vec<bson::Document> = cursor.try_collect().await.map_err(unavailable)?;
        Ok(docs.into_iter().map(from_bson_document).collect())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> HavenResult<Option<Document>> {
        let updated = self
            .collection(collection)
            .find_one_and_update(filter_to_bson(filter)?, update_to_bson(update)?)
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(updated.map(from_bson_document))
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> HavenResult<Option<Document>> {
        let removed = self
            .collection(collection)
            .find_one_and_delete(filter_to_bson(filter)?)
            .await
            .map_err(unavailable)?;
        Ok(removed.map(from_bson_document))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> HavenResult<u64> {
        let result = self
            .collection(collection)
            .delete_one(filter_to_bson(filter)?)
            .await
            .map_err(unavailable)?;
        Ok(result.deleted_count)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> HavenResult<()> {
        self.collection(collection)
            .insert_one(to_bson_document(&document)?)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(())
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> HavenResult<()> {
        let mut keys = bson::Document::new();
        keys.insert(field, 1);
        let model = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection(collection)
            .create_index(model)
            .await
            .map_err(unavailable)?;
        debug!(collection, field, "Unique index ensured");
        Ok(())
    }

    async fn ping(&self) -> HavenResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[test]
    fn test_dates_roundtrip_as_bson_dates() {
        let doc = json_doc(json!({
            "channelId": "c1",
            "emojiExpiresAt": "2025-03-01T13:00:00.000Z",
            "nameExpiresAt": null
        }));
        let bson_doc = to_bson_document(&doc).unwrap();
        assert!(matches!(bson_doc.get("emojiExpiresAt"), Some(Bson::DateTime(_))));
        assert_eq!(bson_doc.get("nameExpiresAt"), Some(&Bson::Null));

        let back = from_bson_document(bson_doc);
        assert_eq!(back, doc);
    }

    #[test]
    fn test_hidden_fields_stripped_and_doubles_normalized() {
        let raw = doc! {
            "_id": bson::oid::ObjectId::new(),
            "__v": 0,
            "userId": "u1",
            "mageXp": 250.0_f64,
        };
        let doc = from_bson_document(raw);
        assert!(!doc.contains_key("_id"));
        assert!(!doc.contains_key("__v"));
        assert_eq!(doc["mageXp"], json!(250));
    }

    #[test]
    fn test_filter_translation() {
        let filter = Filter::by("giveawayId", "g1")
            .eq("status", "active")
            .not_contains("participants", "u1");
        let bson_filter = filter_to_bson(&filter).unwrap();
        assert_eq!(
            bson_filter,
            doc! {
                "giveawayId": "g1",
                "status": "active",
                "participants": { "$ne": "u1" },
            }
        );
    }

    #[test]
    fn test_update_translation_skips_empty_operators() {
        let update = Update::new()
            .set("messageId", "m1")
            .add_to_set("participants", "u1");
        let bson_update = update_to_bson(&update).unwrap();
        assert_eq!(
            bson_update,
            doc! {
                "$set": { "messageId": "m1" },
                "$addToSet": { "participants": "u1" },
            }
        );
    }

    #[test]
    fn test_parse_duplicate_message() {
        let message = "E11000 duplicate key error collection: Mysthaven.channels index: channelId_1 dup key: { channelId: \"123\" }";
        assert_eq!(
            parse_duplicate_message(message),
            ("channelId".to_string(), "123".to_string())
        );
    }
}
