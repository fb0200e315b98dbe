//! Marker headers added to controller responses.

use hyper::header::{HeaderName, HeaderValue};
use hyper::Response;

pub static X_C8YCTRL_MOCKED: HeaderName = HeaderName::from_static("x-c8yctrl-mocked");
pub static X_C8YCTRL_PROXIED: HeaderName = HeaderName::from_static("x-c8yctrl-proxied");
pub static X_C8YCTRL_RECORDED: HeaderName = HeaderName::from_static("x-c8yctrl-recorded");

pub static VALUE_TRUE: HeaderValue = HeaderValue::from_static("true");

/// Extension trait for setting marker headers on responses.
pub trait MarkerHeadersExt {
    fn mark(&mut self, name: &HeaderName);
}

impl<B> MarkerHeadersExt for Response<B> {
    fn mark(&mut self, name: &HeaderName) {
        self.headers_mut().insert(name.clone(), VALUE_TRUE.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;

    #[test]
    fn test_mark_sets_true() {
        let mut response = Response::new(Full::new(Bytes::new()));
        response.mark(&X_C8YCTRL_MOCKED);
        assert_eq!(response.headers().get("x-c8yctrl-mocked").unwrap(), "true");
        assert!(response.headers().get(&X_C8YCTRL_PROXIED).is_none());
    }
}
