pub mod bucket;
pub mod integration;

pub use bucket::BucketDataSource;
pub use integration::IntegrationDataSource;
