pub mod classifier;
pub mod executor;

pub use classifier::{Bucket, EvaluationResult, ResultClassifier, ResultRecord};
pub use executor::EvaluationExecutor;
