use reqwest::{
    Client, Request,
    header::{HeaderMap, HeaderName, HeaderValue},
};

use crate::{
    domain::TestConfig,
    error::{AppError, AppResult, HttpError, ValidationError},
};

/// Builds the one client shared by every dispatch of a run.
///
/// The request timeout covers the whole exchange, body included, so a
/// hanging server can hold a dispatch for at most `config.timeout`.
///
/// # Errors
///
/// Returns an error when the underlying client cannot be constructed.
pub fn build_client(config: &TestConfig) -> AppResult<Client> {
    let mut client_builder = Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout);

    if let Some(user_agent) = config.user_agent.as_deref() {
        client_builder = client_builder.user_agent(user_agent);
    }

    client_builder
        .build()
        .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))
}

/// Fully built request that is cloned once per dispatch slot.
#[derive(Debug)]
pub struct RequestTemplate {
    request: Request,
}

impl RequestTemplate {
    /// # Errors
    ///
    /// Returns an error for invalid URLs or headers, or when the request
    /// cannot be cloned.
    pub fn new(client: &Client, config: &TestConfig) -> AppResult<Self> {
        let url = config.parsed_url()?;
        let headers = build_headers(&config.headers)?;

        let mut request_builder = client
            .request(config.method.to_reqwest(), url)
            .headers(headers);
        if let Some(body) = config.body.as_ref() {
            request_builder = request_builder.body(body.clone());
        }

        let request = request_builder
            .build()
            .map_err(|err| AppError::http(HttpError::BuildRequestFailed { source: err }))?;
        let template = Self { request };
        // An in-memory body always clones; check once so dispatch never has to.
        template.instantiate()?;
        Ok(template)
    }

    /// # Errors
    ///
    /// Returns an error if the request body is not cloneable.
    pub fn instantiate(&self) -> AppResult<Request> {
        self.request
            .try_clone()
            .ok_or_else(|| AppError::http(HttpError::CloneRequestFailed))
    }

    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }
}

fn build_headers(headers: &[(String, String)]) -> AppResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            AppError::validation(ValidationError::InvalidHeaderName {
                header: name.clone(),
                source: err,
            })
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            AppError::validation(ValidationError::InvalidHeaderValue {
                header: name.clone(),
                source: err,
            })
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}
