//! Selection, lifecycle, publication, and metrics logic over the
//! [`reelbot_core::Store`] traits.

pub mod collaborators;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod publication;
pub mod selector;

pub use collaborators::{
    CommandRenderer, MetricsError, MetricsSource, PublishError, Publisher, RenderError, Renderer,
    DEFAULT_RENDER_TIMEOUT,
};
pub use lifecycle::{LifecycleError, LifecycleManager};
pub use memory::MemoryStore;
pub use metrics::{MetricsCollector, MetricsReport};
pub use pipeline::{GenerationError, GenerationPipeline, TopUpReport};
pub use publication::{CycleReport, PublicationScheduler, PublishNowError};
pub use selector::{ContentSelector, SelectionError};

#[cfg(test)]
pub(crate) mod testing;
