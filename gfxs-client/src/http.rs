use std::time::Duration;

use async_trait::async_trait;
use gfxs_api::{
    BackendError, BackendResult, BatchArchive, DroppedFile, FilterStore, RenderBackend,
    RenderReply, RenderResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, header};
use thiserror::Error;
use url::Url;

/// Errors building a client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme: {0}")]
    Scheme(String),

    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Client for a GFXS render server.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
    timeout: Option<Duration>,
}

impl HttpBackend {
    /// Connect to the server at `base`, e.g. `http://localhost:8080`.
    pub fn new(base: &str) -> Result<Self, ClientError> {
        Self::build(base, None)
    }

    /// Like [`HttpBackend::new`], bounding every request by `timeout`.
    pub fn with_timeout(base: &str, timeout: Duration) -> Result<Self, ClientError> {
        Self::build(base, Some(timeout))
    }

    fn build(base: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut base = Url::parse(base)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::Scheme(base.scheme().to_string()));
        }
        // Endpoints are joined onto the base; keep it a directory.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "gfxs/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base,
            timeout,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base
            .join(path)
            .map_err(|e| BackendError::Protocol(format!("bad endpoint {path}: {e}")))
    }

    fn map_error(&self, e: reqwest::Error) -> BackendError {
        match self.timeout {
            Some(timeout) if e.is_timeout() => BackendError::Timeout(timeout),
            _ => BackendError::Transport(e.to_string()),
        }
    }

    /// Fail on non-2xx, keeping the body as the message.
    async fn check(&self, response: Response) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!("server returned {}: {}", status, body.trim());
        Err(BackendError::Status {
            code: status.as_u16(),
            body: body.trim().to_string(),
        })
    }

    async fn bytes(&self, response: Response) -> BackendResult<Vec<u8>> {
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| self.map_error(e))
    }
}

fn file_part(file: &DroppedFile) -> BackendResult<Part> {
    let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
    match &file.content_type {
        Some(mime) => part
            .mime_str(mime)
            .map_err(|e| BackendError::Protocol(format!("bad content type {mime}: {e}"))),
        None => Ok(part),
    }
}

/// File name from a `Content-Disposition` header value, if it carries one.
pub fn archive_name(disposition: Option<&str>) -> Option<String> {
    disposition?.split(';').find_map(|param| {
        let (key, name) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = name.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[async_trait]
impl RenderBackend for HttpBackend {
    async fn render(&self, document: &str) -> BackendResult<RenderReply> {
        let url = self.endpoint("render")?;
        let response = self
            .client
            .post(url)
            .form(&[("gfxs", document)])
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let body = self.bytes(self.check(response).await?).await?;

        let wire: RenderResponse = serde_json::from_slice(&body)
            .map_err(|e| BackendError::Protocol(format!("invalid render response: {e}")))?;
        wire.into_reply()
    }

    async fn upload_image(&self, image: &DroppedFile) -> BackendResult<()> {
        let url = self.endpoint("upload")?;
        let form = Form::new().part("image", file_part(image)?);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        self.check(response).await?;
        tracing::debug!("uploaded {} ({} bytes)", image.name, image.bytes.len());
        Ok(())
    }

    async fn render_batch(
        &self,
        document: &str,
        images: &[DroppedFile],
    ) -> BackendResult<BatchArchive> {
        let url = self.endpoint("renderBatch")?;
        let mut form = Form::new().text("gfxs", document.to_string());
        for image in images {
            form = form.part("images", file_part(image)?);
        }
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let response = self.check(response).await?;

        // Left empty when the server names nothing; the caller picks a default.
        let file_name = archive_name(
            response
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
        )
        .unwrap_or_default();
        let bytes = self.bytes(response).await?;
        Ok(BatchArchive { file_name, bytes })
    }
}

#[async_trait]
impl FilterStore for HttpBackend {
    async fn list(&self) -> BackendResult<Vec<String>> {
        let url = self.endpoint("filters")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let body = self.bytes(self.check(response).await?).await?;

        // An empty directory is sent as `null`.
        let names: Option<Vec<String>> = serde_json::from_slice(&body)
            .map_err(|e| BackendError::Protocol(format!("invalid filter list: {e}")))?;
        Ok(names.unwrap_or_default())
    }

    async fn read(&self, name: &str) -> BackendResult<String> {
        let url = self.endpoint("filter")?;
        let response = self
            .client
            .get(url)
            .query(&[("name", name)])
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(name.to_string()));
        }
        self.check(response)
            .await?
            .text()
            .await
            .map_err(|e| self.map_error(e))
    }

    async fn write(&self, name: &str, document: &str) -> BackendResult<()> {
        let url = self.endpoint("saveFilter")?;
        let form = Form::new()
            .text("name", name.to_string())
            .text("filter", document.to_string());
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        self.check(response).await?;
        Ok(())
    }
}
