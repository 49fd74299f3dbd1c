
use super::{PassageMetadata, PassageRecord};
use crate::{AyurbotError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const PASSAGES_TABLE: &str = "passages";

/// Passage index backed by LanceDB
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub passage: PassageMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the passage index under the configured data directory
    ///
    /// The table is created empty with the configured embedding dimension when
    /// it does not exist yet.
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, AyurbotError> {
        let db_path = config.vector_database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            AyurbotError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                if Self::looks_corrupted(&e.to_string()) {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(&db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        AyurbotError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(AyurbotError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let mut store = Self {
            connection,
            table_name: PASSAGES_TABLE.to_string(),
            vector_dimension: config.ollama.embedding_dimension as usize,
        };

        store.initialize_table_with_recovery().await?;

        info!(
            "Vector store ready with {} dimensional passages",
            store.vector_dimension
        );
        Ok(store)
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    fn looks_corrupted(message: &str) -> bool {
        let message = message.to_lowercase();
        message.contains("corrupt") || message.contains("invalid") || message.contains("malformed")
    }

    async fn initialize_table(&mut self) -> Result<(), AyurbotError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AyurbotError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            debug!("Passages table already exists, detecting vector dimension");
            match self.detect_existing_vector_dimension().await {
                Ok(dim) => {
                    if dim != self.vector_dimension {
                        warn!(
                            "Index uses {} dimensions but {} are configured, keeping the index",
                            dim, self.vector_dimension
                        );
                    }
                    self.vector_dimension = dim;
                }
                Err(e) => {
                    warn!(
                        "Could not detect vector dimension from existing table: {}",
                        e
                    );
                }
            }
            return Ok(());
        }

        info!(
            "Creating empty passages table with {} dimensions",
            self.vector_dimension
        );

        let schema = Self::create_schema(self.vector_dimension);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| AyurbotError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize, AyurbotError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| AyurbotError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                AyurbotError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, true),
            Field::new("page", DataType::UInt32, true),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<lancedb::Table, AyurbotError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| AyurbotError::Database(format!("Failed to open table: {}", e)))
    }

    /// Add passages to the index
    ///
    /// All records in a batch must share one dimension. When it differs from
    /// the current table, the table is recreated empty with the new dimension
    /// before the batch is written.
    #[inline]
    pub async fn store_passages(&mut self, records: Vec<PassageRecord>) -> Result<(), AyurbotError> {
        let Some(first) = records.first() else {
            debug!("No passages to store");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        if vector_dim == 0 {
            return Err(AyurbotError::Database(
                "Passage vectors cannot be empty".to_string(),
            ));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(AyurbotError::Database(format!(
                "Passage {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        debug!("Storing batch of {} passages", records.len());

        if self.vector_dimension != vector_dim {
            info!(
                "Vector dimension changed from {} to {}, recreating table",
                self.vector_dimension, vector_dim
            );
            self.recreate_table_with_dimension(vector_dim).await?;
            self.vector_dimension = vector_dim;
        }

        let record_batch = self.create_record_batch(&records)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| AyurbotError::Database(format!("Failed to insert passages: {}", e)))?;

        info!("Stored {} passages", records.len());
        Ok(())
    }

    async fn recreate_table_with_dimension(&self, vector_dim: usize) -> Result<(), AyurbotError> {
        self.drop_table_if_exists().await?;

        let schema = Self::create_schema(vector_dim);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| {
                AyurbotError::Database(format!("Failed to create table with new dimensions: {}", e))
            })?;

        info!(
            "Table recreated successfully with {} dimensions",
            vector_dim
        );
        Ok(())
    }

    fn create_record_batch(&self, records: &[PassageRecord]) -> Result<RecordBatch, AyurbotError> {
        let len = records.len();
        let vector_dim = self.vector_dimension;

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut contents = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            contents.push(record.metadata.content.as_str());
            sources.push(record.metadata.source.as_deref());
            pages.push(record.metadata.page);
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    AyurbotError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| AyurbotError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Find the passages nearest to `query_vector`, nearest first
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, AyurbotError> {
        debug!("Searching for similar passages with limit: {}", limit);

        if query_vector.len() != self.vector_dimension {
            return Err(AyurbotError::Database(format!(
                "Query has {} dimensions but the index uses {}",
                query_vector.len(),
                self.vector_dimension
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| AyurbotError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| AyurbotError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(search_results)
    }

    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, AyurbotError> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| AyurbotError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, AyurbotError> {
        batch
            .column_by_name(name)
            .ok_or_else(|| AyurbotError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| AyurbotError::Database(format!("Invalid {} column type", name)))
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, AyurbotError> {
        let contents = Self::column::<StringArray>(batch, "content")?;
        let sources = Self::column::<StringArray>(batch, "source")?;
        let pages = Self::column::<UInt32Array>(batch, "page")?;
        let chunk_indices = Self::column::<UInt32Array>(batch, "chunk_index")?;
        let created_ats = Self::column::<StringArray>(batch, "created_at")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let results = (0..batch.num_rows())
            .map(|row| {
                let passage = PassageMetadata {
                    content: contents.value(row).to_string(),
                    source: (!sources.is_null(row)).then(|| sources.value(row).to_string()),
                    page: (!pages.is_null(row)).then(|| pages.value(row)),
                    chunk_index: chunk_indices.value(row),
                    created_at: created_ats.value(row).to_string(),
                };

                let distance =
                    distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

                SearchResult {
                    passage,
                    // squared L2 distance, folded into (0, 1] so higher is closer
                    similarity_score: 1.0 / (1.0 + distance),
                    distance,
                }
            })
            .collect();

        Ok(results)
    }

    /// Number of passages in the index
    #[inline]
    pub async fn count_passages(&self) -> Result<usize, AyurbotError> {
        let table = self.open_table().await?;

        table
            .count_rows(None)
            .await
            .map_err(|e| AyurbotError::Database(format!("Failed to count rows: {}", e)))
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), AyurbotError> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                AyurbotError::Database(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        std::fs::create_dir_all(db_path).map_err(|e| {
            AyurbotError::Database(format!("Failed to recreate vector database directory: {}", e))
        })?;

        info!("Database corruption recovery completed");
        Ok(())
    }

    async fn initialize_table_with_recovery(&mut self) -> Result<(), AyurbotError> {
        match self.initialize_table().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let message = e.to_string().to_lowercase();
                if Self::looks_corrupted(&message) || message.contains("schema") {
                    warn!("Table corruption detected during initialization: {}", e);

                    if let Err(drop_err) = self.drop_table_if_exists().await {
                        warn!("Failed to drop corrupted table: {}", drop_err);
                    }

                    self.initialize_table().await.map_err(|e| {
                        AyurbotError::Database(format!(
                            "Failed to recreate table after corruption: {}",
                            e
                        ))
                    })
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn drop_table_if_exists(&self) -> Result<(), AyurbotError> {
        let table_names = self.connection.table_names().execute().await.map_err(|e| {
            AyurbotError::Database(format!("Failed to list tables for drop: {}", e))
        })?;

        if table_names.contains(&self.table_name) {
            info!("Dropping existing passages table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| AyurbotError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    /// Check that the passage table exists and can be read
    #[inline]
    pub async fn validate_integrity(&self) -> bool {
        match self.open_table().await {
            Ok(table) => match table.count_rows(None).await {
                Ok(count) => {
                    debug!("Database integrity check passed, {} rows found", count);
                    true
                }
                Err(e) => {
                    error!("Failed to count rows during integrity check: {}", e);
                    false
                }
            },
            Err(e) => {
                error!("Integrity check failed: {}", e);
                false
            }
        }
    }
}
