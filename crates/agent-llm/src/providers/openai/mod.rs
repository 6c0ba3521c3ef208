use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use agent_core::{tools::ToolSchema, Message};

use super::common::openai_compat::{
    build_openai_compat_body, parse_openai_compat_response, parse_openai_compat_sse_data_strict,
};
use super::common::sse::llm_stream_from_sse;

/// Wire dialect of the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiFlavor {
    /// `POST {base}/chat/completions` with a bearer token.
    #[default]
    OpenAI,
    /// Azure-style deployment routing with an `api-key` header and an empty
    /// `api-version` query parameter.
    Dial,
}

impl std::str::FromStr for ApiFlavor {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "dial" | "azure" => Ok(Self::Dial),
            other => Err(format!("unknown API flavor '{}'", other)),
        }
    }
}

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    flavor: ApiFlavor,
    max_output_tokens: Option<u32>,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            flavor: ApiFlavor::OpenAI,
            max_output_tokens: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_flavor(mut self, flavor: ApiFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        match self.flavor {
            ApiFlavor::OpenAI => format!("{}/chat/completions", self.base_url),
            ApiFlavor::Dial => format!(
                "{}/openai/deployments/{}/chat/completions",
                self.base_url, self.model
            ),
        }
    }

    fn request(&self, messages: &[Message], tools: Option<&[ToolSchema]>, stream: bool) -> RequestBuilder {
        let body =
            build_openai_compat_body(&self.model, messages, tools, stream, self.max_output_tokens);

        let request = self.client.post(self.endpoint()).json(&body);
        match self.flavor {
            ApiFlavor::OpenAI => {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            }
            ApiFlavor::Dial => request
                .query(&[("api-version", "")])
                .header("api-key", &self.api_key),
        }
    }

    async fn send(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        stream: bool,
    ) -> Result<reqwest::Response> {
        log::debug!(
            "Requesting completion from {} (model={}, messages={}, tools={}, stream={})",
            self.endpoint(),
            self.model,
            messages.len(),
            tools.map(<[ToolSchema]>::len).unwrap_or(0),
            stream
        );

        let response = self.request(messages, tools, stream).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> Result<LLMStream> {
        let response = self.send(messages, tools, true).await?;

        Ok(llm_stream_from_sse(
            response,
            parse_openai_compat_sse_data_strict,
        ))
    }

    async fn chat(&self, messages: &[Message], tools: Option<&[ToolSchema]>) -> Result<Message> {
        let response = self.send(messages, tools, false).await?;
        let body = response.text().await?;
        parse_openai_compat_response(&body)
    }
}
