//! I/O for vector data: GeoJSON layers and feature sinks

mod geojson;
mod sink;

pub use geojson::{layer_to_geojson_string, read_geojson, read_geojson_str, write_geojson};
pub use sink::{
    CreatedSink, FeatureSink, GeoJsonSink, GeoJsonSinkProvider, MemorySink, MemorySinkProvider,
    SinkProvider, SinkSpec,
};
