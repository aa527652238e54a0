use std::collections::HashMap;
use std::io::Read;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_LENGTH};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub user_agent: String,
}

impl FetchRequest {
    pub fn new(url: String, user_agent: String) -> Self {
        Self {
            url,
            headers: HashMap::new(),
            user_agent,
        }
    }
}

/// What a HEAD probe tells us about the resource before we commit to
/// streaming it.
#[derive(Debug, Clone)]
pub struct FetchProbe {
    pub status_code: u16,
    pub total_bytes: Option<u64>,
    pub content_disposition: Option<String>,
}

/// An open response body ready to stream. Decoupled from any particular
/// HTTP client so a fake can hand back canned bytes.
pub struct FetchStream {
    pub status_code: u16,
    pub total_bytes: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

pub trait NetClient: Send + Sync {
    fn probe(&self, req: &FetchRequest) -> CoreResult<FetchProbe>;
    fn get_stream(&self, req: &FetchRequest) -> CoreResult<FetchStream>;
}

#[derive(Clone)]
pub struct ReqwestNetClient {
    client: Client,
}

impl ReqwestNetClient {
    pub fn new(user_agent: &str) -> CoreResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|err| CoreError::Network(err.to_string()))?;
        Ok(Self { client })
    }

    fn request_headers(&self, req: &FetchRequest) -> CoreResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &req.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| CoreError::Network(err.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| CoreError::Network(err.to_string()))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

impl NetClient for ReqwestNetClient {
    fn probe(&self, req: &FetchRequest) -> CoreResult<FetchProbe> {
        let resp = self
            .client
            .head(&req.url)
            .headers(self.request_headers(req)?)
            .send()
            .map_err(|err| CoreError::Network(err.to_string()))?;
        let status = resp.status();
        let headers = resp.headers();
        let total_bytes = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let content_disposition = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        Ok(FetchProbe {
            status_code: status.as_u16(),
            total_bytes,
            content_disposition,
        })
    }

    fn get_stream(&self, req: &FetchRequest) -> CoreResult<FetchStream> {
        let resp = self
            .client
            .get(&req.url)
            .headers(self.request_headers(req)?)
            .send()
            .map_err(|err| CoreError::Network(err.to_string()))?;
        Ok(FetchStream {
            status_code: resp.status().as_u16(),
            total_bytes: resp.content_length(),
            reader: Box::new(resp),
        })
    }
}
