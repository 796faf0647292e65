//! Spatial aggregation of a detailed transmission topology.

pub mod generators;
/// Seeded k-means clustering of coordinates.
pub mod kmeans;
pub mod lines;
/// Demand distribution across aggregate nodes.
pub mod load;
pub mod nearest;
pub mod pipeline;
pub mod reducer;
/// Static lookup data: fuel costs, region centroids, zone mappings.
pub mod tables;
pub mod types;
pub mod zones;
