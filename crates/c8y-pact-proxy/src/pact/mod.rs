//! Pact data model.
//!
//! A [`Pact`] is an ordered list of [`PactRecord`]s, each one captured HTTP
//! exchange, plus descriptive [`PactInfo`]. Pacts are identified by a
//! [`PactId`] usually derived from the test title.

mod core;
mod id;
mod info;
mod mode;
mod record;

pub use self::core::{MockSequencing, Pact};
pub use self::id::{PactId, TitleTree};
pub use self::info::{PactInfo, PactParty, PactVersion, PACT_FORMAT_VERSION};
pub use self::mode::{PactMode, RecordingMode};
pub use self::record::{
    find_header, is_ok_status, HeaderValue, Headers, PactAuth, PactOptions, PactRecord,
    PactRequest, PactResponse,
};
