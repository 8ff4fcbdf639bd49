pub(crate) mod collection;
pub(crate) mod reader;
pub(crate) mod table;
pub(crate) mod writer;

pub use collection::{
    output_file_name, Manifest, ManifestRecord, Metadata, SampleCollection, SampleEntry,
    MANIFEST_FILE, METADATA_FILE,
};
pub use reader::SampleReader;
pub use table::CountTable;
pub use writer::{write_stats, write_stats_csv, write_stats_file, FastqGzWriter, StatsFormat};
