//! LanceDB template index
//!
//! Stores templates and their embeddings in a single LanceDB table backed by
//! local disk or object storage. The partition slug is kept as a column, but
//! lookup by id filters on `id` alone.

use std::sync::Arc;

use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, Int64Array, LargeStringArray, ListArray,
    RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_buffer::OffsetBuffer;
use arrow_schema::{ArrowError, DataType, Field, Schema};
use async_trait::async_trait;
use chrono::DateTime;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;

use super::TemplateIndex;
use crate::document::{Template, TemplateFilter, VariableDefinition};
use crate::error::{DraftingError, Result};
use crate::search::rank;

const SERVICE: &str = "template index";

/// Extra rows fetched past `limit` so ties at the cutoff can be re-ranked
const TIE_WINDOW: usize = 16;

fn index_error(e: lancedb::Error) -> DraftingError {
    tracing::error!("LanceDB operation failed: {}", e);
    DraftingError::upstream(SERVICE, e)
}

/// Template index backed by LanceDB
pub struct LanceTemplateIndex {
    db: Connection,
    table_name: String,
    dimension: usize,
}

impl LanceTemplateIndex {
    /// Connect to LanceDB and create the templates table if needed
    ///
    /// # Arguments
    /// * `uri` - Connection URI (e.g., "s3://bucket-name" or a local path)
    /// * `table_name` - Name of the templates table
    /// * `dimension` - Embedding dimension of the configured provider
    pub async fn connect(uri: &str, table_name: &str, dimension: usize) -> Result<Self> {
        let db = lancedb::connect(uri).execute().await.map_err(index_error)?;

        let index = Self {
            db,
            table_name: table_name.to_string(),
            dimension,
        };
        index.init_table().await?;
        Ok(index)
    }

    /// Arrow schema for template storage
    fn schema(&self) -> Result<Arc<Schema>> {
        let dimension: i32 = self.dimension.try_into().map_err(|_| {
            DraftingError::Validation(format!("embedding dimension {} too large", self.dimension))
        })?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("partition", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("jurisdiction", DataType::Utf8, false),
            Field::new("description", DataType::Utf8, false),
            Field::new("body", DataType::LargeUtf8, false),
            Field::new("variables_json", DataType::Utf8, false),
            Field::new(
                "tags",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                false,
            ),
            Field::new("created_at", DataType::Int64, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])))
    }

    async fn init_table(&self) -> Result<()> {
        let table_names = self.db.table_names().execute().await.map_err(index_error)?;
        if table_names.contains(&self.table_name) {
            return Ok(());
        }

        tracing::info!("Creating LanceDB table {}", self.table_name);
        let schema = self.schema()?;
        let empty: Vec<std::result::Result<RecordBatch, ArrowError>> = vec![];
        let reader = RecordBatchIterator::new(empty.into_iter(), schema);
        self.db
            .create_table(&self.table_name, reader)
            .execute()
            .await
            .map_err(index_error)?;
        Ok(())
    }

    async fn table(&self) -> Result<Table> {
        self.db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(index_error)
    }

    /// Escape strings for LanceDB SQL filter expressions
    fn escape(s: &str) -> String {
        s.replace('\'', "''")
    }

    /// Convert a template to a single-row RecordBatch
    fn template_to_batch(&self, template: &Template) -> Result<RecordBatch> {
        if template.embedding.len() != self.dimension {
            return Err(DraftingError::Validation(format!(
                "template {} has {} dimensions, index expects {}",
                template.id,
                template.embedding.len(),
                self.dimension
            )));
        }

        let schema = self.schema()?;
        let encode_error = |e: ArrowError| DraftingError::corrupted(&template.id, e);

        let variables_json = serde_json::to_string(&template.variables)
            .map_err(|e| DraftingError::corrupted(&template.id, e))?;

        let tag_values = StringArray::from(
            template
                .similarity_tags
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>(),
        );
        let tags = ListArray::try_new(
            Arc::new(Field::new("item", DataType::Utf8, true)),
            OffsetBuffer::<i32>::from_lengths([template.similarity_tags.len()]),
            Arc::new(tag_values),
            None,
        )
        .map_err(encode_error)?;

        let embedding = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimension as i32,
            Arc::new(Float32Array::from(template.embedding.clone())),
            None,
        )
        .map_err(encode_error)?;

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec![template.id.as_str()])),
            Arc::new(StringArray::from(vec![template.partition()])),
            Arc::new(StringArray::from(vec![template.title.as_str()])),
            Arc::new(StringArray::from(vec![template.doc_type.as_str()])),
            Arc::new(StringArray::from(vec![template.jurisdiction.as_str()])),
            Arc::new(StringArray::from(vec![template.description.as_str()])),
            Arc::new(LargeStringArray::from(vec![template.body.as_str()])),
            Arc::new(StringArray::from(vec![variables_json])),
            Arc::new(tags),
            Arc::new(Int64Array::from(vec![template.created_at.timestamp_micros()])),
            Arc::new(embedding),
        ];

        RecordBatch::try_new(schema, columns).map_err(encode_error)
    }

    /// Convert RecordBatch rows to templates, with `_distance` when present
    fn batch_to_templates(batch: &RecordBatch) -> Result<Vec<(Template, Option<f32>)>> {
        let ids = string_column(batch, "id")?;
        let titles = string_column(batch, "title")?;
        let doc_types = string_column(batch, "doc_type")?;
        let jurisdictions = string_column(batch, "jurisdiction")?;
        let descriptions = string_column(batch, "description")?;
        let variables = string_column(batch, "variables_json")?;
        let bodies = typed_column::<LargeStringArray>(batch, "body")?;
        let tags = typed_column::<ListArray>(batch, "tags")?;
        let created = typed_column::<Int64Array>(batch, "created_at")?;
        let embeddings = typed_column::<FixedSizeListArray>(batch, "embedding")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut templates = Vec::with_capacity(batch.num_rows());

        for i in 0..batch.num_rows() {
            let id = ids.value(i).to_string();

            // A record whose variables cannot be decoded must not look like
            // a template with zero variables
            let variables: Vec<VariableDefinition> = serde_json::from_str(variables.value(i))
                .map_err(|e| DraftingError::corrupted(&id, format!("variables: {}", e)))?;

            let tag_slice = tags.value(i);
            let tag_strings = tag_slice
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| DraftingError::corrupted(&id, "tags are not strings"))?;
            let similarity_tags = (0..tag_strings.len())
                .map(|j| tag_strings.value(j).to_string())
                .collect();

            let emb_slice = embeddings.value(i);
            let emb_values = emb_slice
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| DraftingError::corrupted(&id, "embedding is not float32"))?;
            let embedding = (0..emb_values.len()).map(|j| emb_values.value(j)).collect();

            let created_at = DateTime::from_timestamp_micros(created.value(i))
                .ok_or_else(|| DraftingError::corrupted(&id, "created_at out of range"))?;

            // Cosine distance to similarity
            let score = distances.map(|d| 1.0 - d.value(i));

            templates.push((
                Template {
                    id,
                    title: titles.value(i).to_string(),
                    doc_type: doc_types.value(i).to_string(),
                    jurisdiction: jurisdictions.value(i).to_string(),
                    description: descriptions.value(i).to_string(),
                    body: bodies.value(i).to_string(),
                    variables,
                    similarity_tags,
                    embedding,
                    created_at,
                },
                score,
            ));
        }

        Ok(templates)
    }

    async fn collect_rows<S, E>(stream: S) -> Result<Vec<(Template, Option<f32>)>>
    where
        S: futures::Stream<Item = std::result::Result<RecordBatch, E>> + Unpin,
        E: std::fmt::Display,
    {
        let batches = stream
            .try_collect::<Vec<RecordBatch>>()
            .await
            .map_err(|e| DraftingError::upstream(SERVICE, e))?;

        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(Self::batch_to_templates(batch)?);
        }
        Ok(rows)
    }
}

fn typed_column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<T>())
        .ok_or_else(|| DraftingError::corrupted(format!("column {}", name), "missing or mistyped"))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    typed_column::<StringArray>(batch, name)
}

#[async_trait]
impl TemplateIndex for LanceTemplateIndex {
    async fn insert(&self, template: &Template) -> Result<()> {
        let batch = self.template_to_batch(template)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema);

        let table = self.table().await?;
        table.add(reader).execute().await.map_err(index_error)?;

        tracing::debug!("Indexed template {} in partition {}", template.id, template.partition());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Template>> {
        let table = self.table().await?;
        let stream = table
            .query()
            .only_if(format!("id = '{}'", Self::escape(id)))
            .execute()
            .await
            .map_err(index_error)?;

        Ok(Self::collect_rows(stream)
            .await?
            .into_iter()
            .map(|(template, _)| template)
            .next())
    }

    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<(Template, f32)>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let table = self.table().await?;
        if table.count_rows(None).await.map_err(index_error)? == 0 {
            return Ok(vec![]);
        }

        let stream = table
            .query()
            .nearest_to(query.to_vec())
            .map_err(index_error)?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(limit.saturating_add(TIE_WINDOW))
            .execute()
            .await
            .map_err(index_error)?;

        let scored = Self::collect_rows(stream)
            .await?
            .into_iter()
            .map(|(template, score)| (template, score.unwrap_or(0.0)))
            .collect();

        Ok(rank(scored, limit))
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        let table = self.table().await?;
        let stream = table.query().execute().await.map_err(index_error)?;

        Ok(Self::collect_rows(stream)
            .await?
            .into_iter()
            .map(|(template, _)| template)
            .filter(|template| filter.matches(template))
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let table = self.table().await?;
        table.count_rows(None).await.map_err(index_error)
    }
}
