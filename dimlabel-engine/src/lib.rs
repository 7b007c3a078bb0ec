pub mod command;
pub mod dimension;
pub mod identifier;
pub mod lookup;
pub mod placement;
pub mod record;
pub mod text;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
        #[error("entity {id} is a {found}, expected {expected}")]
        UnexpectedEntity {
            id: u64,
            expected: &'static str,
            found: &'static str,
        },
        #[error("invalid argument: {0}")]
        InvalidArgument(String),
        #[error("degenerate geometry: {0}")]
        DegenerateGeometry(&'static str),
    }
}

pub use command::{
    CommandBus, CommandContext, CommandHandler, CommandRequest, CommandResponse, LabelSettings,
};
pub use dimension::{DimensionValue, format_dim, round_dim_leader};
pub use identifier::insert_space;
pub use lookup::{LookupTable, LookupTables};
pub use placement::{LabelPlacer, PlacementFrame, compute_offset};
pub use record::{AttributeRecord, AttributeRecordReader, AttributeStore, RetrievalStrategy};
pub use text::{AssemblyMode, CompositeLabel, LabelFields, LineBreak, assemble};
