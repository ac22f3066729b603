//! Serialized-record text format shared by every injector.

mod codec;

pub use codec::{
    Field, PairLine, RecordError, SerializedPair, SerializedRecord, COL_MARKER, VAL_MARKER,
};
