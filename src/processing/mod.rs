//! Ingestion and retrieval pipeline: extraction, chunking, embedding, indexing and answering.

pub mod chunking;
pub mod compose;
pub mod embed;
pub mod extract;
pub mod index;
pub mod retrieval;
mod service;
pub mod session;
pub mod storage;
pub mod types;

pub use service::{
    DocumentService, PipelineSettings, RagApi, ServiceComponents, ServiceDescription,
    SessionSummary,
};
pub use types::{
    ChunkingError, ExtractionError, Fragment, FragmentContent, ImageFormat, IndexError, Modality,
    PageImage, ProcessingError, ProcessingOutcome, QueryAnswer, QueryError, RetrievedFragment,
    SourceRef,
};
