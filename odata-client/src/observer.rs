//! Hook for inspecting raw exchanges

use std::sync::Mutex;

use crate::transport::{HttpRequest, HttpResponse};

/// Notified with every request the service sends and the response it got
pub trait RequestObserver: Send + Sync {
    fn http_response(&self, request: &HttpRequest, response: &HttpResponse);
}

/// Keeps the most recent exchange
#[derive(Debug, Default)]
pub struct LastCallObserver {
    last: Mutex<Option<(HttpRequest, HttpResponse)>>,
}

impl LastCallObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) -> Option<HttpRequest> {
        self.last
            .lock()
            .ok()
            .and_then(|last| last.as_ref().map(|(request, _)| request.clone()))
    }

    pub fn response(&self) -> Option<HttpResponse> {
        self.last
            .lock()
            .ok()
            .and_then(|last| last.as_ref().map(|(_, response)| response.clone()))
    }
}

impl RequestObserver for LastCallObserver {
    fn http_response(&self, request: &HttpRequest, response: &HttpResponse) {
        match self.last.lock() {
            Ok(mut last) => *last = Some((request.clone(), response.clone())),
            Err(_) => log::warn!("Request observer lock is poisoned, exchange not recorded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;

    #[test]
    fn test_last_call_is_kept() {
        let observer = LastCallObserver::new();
        assert!(observer.request().is_none());

        let request = HttpRequest {
            method: Method::Get,
            url: "http://example.com/Employees".to_string(),
            headers: Vec::new(),
            body: None,
        };
        observer.http_response(&request, &HttpResponse::new(200));
        observer.http_response(&request, &HttpResponse::new(404));
        assert_eq!(observer.request(), Some(request));
        assert_eq!(observer.response().map(|r| r.status), Some(404));
    }
}
