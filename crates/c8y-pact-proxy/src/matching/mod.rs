//! Request lookup and response verification.
//!
//! - `url` - URL equivalence used to find recorded requests
//! - `pact` - structural and schema matching of responses against records

mod pact;
mod url;

pub use self::pact::{
    DefaultPactMatcher, MatchInput, MatchOptions, PactMatcher, DEFAULT_IGNORED_PROPERTIES,
};
pub use self::url::{
    DefaultUrlMatcher, RequestMatchingOptions, UrlMatcher, DEFAULT_IGNORED_URL_PARAMETERS,
};
