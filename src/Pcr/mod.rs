pub mod Extractor;

pub use Extractor::{pcr_to_ns, PcrExtractor, PcrSample, DEFAULT_DELTA_MS, INVALID_PID, LEGAL_PACKET_SIZES, SYNC_BYTE};
