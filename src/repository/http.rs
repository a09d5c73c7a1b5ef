//! Remote backend speaking JSON over HTTP

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode, Url};

use super::{Backend, Entity, EntityKind, Progress, PutOptions, Search};
use crate::experiment::SplitRecord;
use crate::{Error, Result};

/// Client for a remote tracking server.
///
/// | call   | request                                   |
/// |--------|-------------------------------------------|
/// | list   | `GET {base}/{kind}s?folder=&experiment=&run=` |
/// | get    | `GET {base}/{kind}s/{id}`                 |
/// | put    | `PUT {base}/{kind}s/{id}?allow_overwrite=` |
/// | delete | `DELETE {base}/{kind}s/{id}`              |
///
/// Ids are sent as single percent-encoded path segments. Bodies are tagged
/// [`Entity`] JSON. 404 means absent, 409 means conflict.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    /// Client for `base_url`, authenticating with `token` when given.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `base_url` is not an absolute hierarchical URL;
    /// the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let raw: String = base_url.into();
        let base_url = Url::parse(raw.trim_end_matches('/'))
            .map_err(|err| Error::Config(format!("invalid remote url {raw:?}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("remote url {raw:?} cannot carry a path")));
        }
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `{base}/{kind}s[/{id}]/{extra...}` with every segment percent-encoded.
    fn url(&self, kind: EntityKind, id: Option<&str>, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&format!("{}s", kind.as_str()));
            segments.extend(id);
            segments.extend(extra);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn check(response: Response, kind: EntityKind, id: &str) -> Result<Response> {
    match response.status() {
        StatusCode::CONFLICT => Err(Error::conflict(kind, id)),
        _ => Ok(response.error_for_status()?),
    }
}

impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn list(&self, kind: EntityKind, search: &Search) -> Result<Vec<Entity>> {
        let mut query = Vec::new();
        if let Some(pattern) = search.folder_pattern() {
            query.push(("folder", pattern));
        }
        if let Some(experiment) = search.experiment() {
            query.push(("experiment", experiment));
        }
        if let Some(run) = search.run() {
            query.push(("run", run));
        }

        let response = self
            .request(Method::GET, self.url(kind, None, &[]))
            .query(&query)
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let mut entities: Vec<Entity> = check(response, kind, "*")?.json()?;
        // The server may ignore some filters.
        entities.retain(|e| e.kind() == kind && search.matches(e));
        entities.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(entities)
    }

    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        let response = self.request(Method::GET, self.url(kind, Some(id), &[])).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response, kind, id)?.json()?))
    }

    fn put(&self, entity: &Entity, options: &PutOptions) -> Result<()> {
        let (kind, id) = (entity.kind(), entity.id());
        let response = self
            .request(Method::PUT, self.url(kind, Some(id), &[]))
            .query(&[("allow_overwrite", options.allow_overwrite)])
            .json(entity)
            .send()?;
        check(response, kind, id)?;

        tracing::debug!(%kind, id, url = self.base_url(), "entity uploaded");
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let response = self.request(Method::DELETE, self.url(kind, Some(id), &[])).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response, kind, id)?;
        Ok(true)
    }

    fn put_progress(&self, split: &SplitRecord, progress: &Progress) {
        let url = self.url(EntityKind::Split, Some(split.split_id()), &["progress"]);
        let sent = self
            .request(Method::POST, url)
            .json(progress)
            .send()
            .and_then(Response::error_for_status);
        if let Err(err) = sent {
            tracing::debug!(split = split.split_id(), %err, "progress not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let backend = HttpBackend::new("http://localhost:8080/api/", None).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8080/api");
        assert_eq!(
            backend.url(EntityKind::Split, Some("s1"), &[]).as_str(),
            "http://localhost:8080/api/splits/s1"
        );
        assert_eq!(
            backend.url(EntityKind::Experiment, None, &[]).as_str(),
            "http://localhost:8080/api/experiments"
        );
        assert_eq!(
            backend.url(EntityKind::Split, Some("s1"), &["progress"]).as_str(),
            "http://localhost:8080/api/splits/s1/progress"
        );
    }

    #[test]
    fn test_ids_are_single_encoded_segments() {
        let backend = HttpBackend::new("http://localhost:8080/api", None).unwrap();
        let url = backend.url(EntityKind::Experiment, Some("iris/v2#1?x"), &[]);

        assert_eq!(url.as_str(), "http://localhost:8080/api/experiments/iris%2Fv2%231%3Fx");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
        assert_eq!(url.path_segments().unwrap().count(), 3);
    }

    #[test]
    fn test_host_without_path() {
        let backend = HttpBackend::new("http://tracker.local", None).unwrap();
        assert_eq!(
            backend.url(EntityKind::Run, Some("r1"), &[]).as_str(),
            "http://tracker.local/runs/r1"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = HttpBackend::new("not a url", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(matches!(HttpBackend::new("mailto:ops@example.com", None), Err(Error::Config(_))));
    }

    #[test]
    fn test_unreachable_server_is_an_error() {
        let backend = HttpBackend::new("http://127.0.0.1:9/api", None).unwrap();
        let err = backend.get(EntityKind::Experiment, "iris").unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
