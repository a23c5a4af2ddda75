// Core model exports
pub mod classifier;
pub mod forest;
pub mod metrics;
pub mod preprocess;
pub mod table;

pub use classifier::{Classifier, ModelError};
pub use forest::{ForestError, ForestParams, RandomForest};
pub use metrics::{accuracy, train_test_split};
pub use preprocess::preprocess_features;
pub use table::{Column, ColumnData, FeatureTable, TableError};
