//! In-memory [`HttpClient`] used by the unit tests.

use std::cell::RefCell;

use serde_json::Value;

use crate::http::{FetchError, HttpClient, HttpRequest, HttpResponse};

struct Route {
    url: String,
    matcher: Option<(&'static str, String)>,
    reply: Result<HttpResponse, FetchError>,
}

/// Answers requests from a routing table and records every call. Unrouted
/// requests fail with a transport error, like an unreachable host.
#[derive(Default)]
pub struct StubClient {
    routes: RefCell<Vec<Route>>,
    calls: RefCell<Vec<String>>,
    posted: RefCell<Vec<Value>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every request to `url` regardless of query.
    pub fn route(&self, url: &str, reply: Result<HttpResponse, FetchError>) -> &Self {
        self.insert(url, None, reply)
    }

    /// Routes requests to `url` carrying `key=value` in the query.
    pub fn route_query(
        &self,
        url: &str,
        key: &'static str,
        value: &str,
        reply: Result<HttpResponse, FetchError>,
    ) -> &Self {
        self.insert(url, Some((key, value.to_string())), reply)
    }

    fn insert(
        &self,
        url: &str,
        matcher: Option<(&'static str, String)>,
        reply: Result<HttpResponse, FetchError>,
    ) -> &Self {
        let mut routes = self.routes.borrow_mut();
        routes.retain(|route| !(route.url == url && route.matcher == matcher));
        // query-specific routes take priority over catch-all ones
        let route = Route {
            url: url.to_string(),
            matcher,
            reply,
        };
        if route.matcher.is_some() {
            routes.insert(0, route);
        } else {
            routes.push(route);
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn posted(&self) -> Vec<Value> {
        self.posted.borrow().clone()
    }

    fn answer(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let mut call = request.url.clone();
        for (index, (key, value)) in request.query.iter().enumerate() {
            call.push(if index == 0 { '?' } else { '&' });
            call.push_str(&format!("{key}={value}"));
        }
        self.calls.borrow_mut().push(call);

        self.routes
            .borrow()
            .iter()
            .find(|route| {
                route.url == request.url
                    && route
                        .matcher
                        .as_ref()
                        .is_none_or(|(key, value)| request.query_value(key) == Some(value.as_str()))
            })
            .map(|route| route.reply.clone())
            .unwrap_or_else(|| Err(FetchError::Transport(format!("no route for {}", request.url))))
    }
}

impl HttpClient for StubClient {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        self.answer(request)
    }

    fn post_json(&self, request: &HttpRequest, body: &Value) -> Result<HttpResponse, FetchError> {
        self.posted.borrow_mut().push(body.clone());
        self.answer(request)
    }
}

/// Builds a feed document the way the public upload feed lays it out.
pub fn feed_xml(author: &str, entries: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
"#,
    );
    xml.push_str(&format!(
        "<title>{author}</title>\n<author><name>{author}</name><uri>https://www.youtube.com/channel/x</uri></author>\n"
    ));
    for (video_id, title, published) in entries {
        xml.push_str(&format!(
            r#"<entry>
  <id>yt:video:{video_id}</id>
  <yt:videoId>{video_id}</yt:videoId>
  <title>{title}</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v={video_id}"/>
  <published>{published}</published>
  <media:group>
    <media:title>{title}</media:title>
    <media:description>About {title}</media:description>
  </media:group>
</entry>
"#
        ));
    }
    xml.push_str("</feed>\n");
    xml
}
