// Pipeline processing: source validation and normalization

pub mod normalize;
pub mod quality_gate;

pub use normalize::RecordNormalizer;
pub use quality_gate::SourceValidator;
