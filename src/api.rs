use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::models::{
    AtividadesResponse, BatchSendRequest, BatchSendResponse, Cliente, DashboardStats,
    PreviewRequest, PreviewResponse, Template, TemplateCreate, TemplateUpdate,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("URL da API inválida: {0}")]
    InvalidBaseUrl(String),
    #[error("falha de comunicação com o servidor: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("não encontrado: {0}")]
    NotFound(String),
    #[error("erro do servidor ({status}): {detail}")]
    Status { status: u16, detail: String },
    #[error("resposta inválida do servidor: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Blocking client for the billing backend. Lives behind the worker
/// threads; the UI thread never calls it directly.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let base = Url::parse(&config.api_url)
            .map_err(|err| ApiError::InvalidBaseUrl(format!("{}: {err}", config.api_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(config.api_url.clone()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { http, base })
    }

    pub fn listar_clientes(&self, limit: u32) -> Result<Vec<Cliente>, ApiError> {
        let url = self.endpoint(&["clientes"], true);
        let response = self
            .http
            .get(url)
            .query(&[("limit", limit.to_string())])
            .send()?;
        parse_json(response)
    }

    pub fn buscar_clientes(&self, nome: &str, limit: u32) -> Result<Vec<Cliente>, ApiError> {
        let url = self.endpoint(&["clientes"], true);
        let response = self
            .http
            .get(url)
            .query(&[("nome", nome), ("limit", &limit.to_string())])
            .send()?;
        parse_json(response)
    }

    pub fn listar_templates(&self) -> Result<Vec<Template>, ApiError> {
        let url = self.endpoint(&["templates"], true);
        let response = self.http.get(url).send()?;
        parse_json(response)
    }

    pub fn obter_template(&self, nome: &str) -> Result<Template, ApiError> {
        let url = self.endpoint(&["templates", nome], false);
        let response = self.http.get(url).send()?;
        parse_json(response)
    }

    pub fn criar_template(&self, template: &TemplateCreate) -> Result<Template, ApiError> {
        let url = self.endpoint(&["templates"], true);
        let response = self.http.post(url).json(template).send()?;
        parse_json(response)
    }

    pub fn atualizar_template(
        &self,
        nome: &str,
        update: &TemplateUpdate,
    ) -> Result<Template, ApiError> {
        let url = self.endpoint(&["templates", nome], false);
        let response = self.http.put(url).json(update).send()?;
        parse_json(response)
    }

    pub fn excluir_template(&self, nome: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["templates", nome], false);
        let response = self.http.delete(url).send()?;
        ensure_success(response)?;
        Ok(())
    }

    pub fn preview(&self, request: &PreviewRequest) -> Result<PreviewResponse, ApiError> {
        let url = self.endpoint(&["cobrancas", "preview"], false);
        let response = self.http.post(url).json(request).send()?;
        parse_json(response)
    }

    pub fn enviar_lote(&self, request: &BatchSendRequest) -> Result<BatchSendResponse, ApiError> {
        let url = self.endpoint(&["cobrancas", "enviar-lote"], false);
        let response = self.http.post(url).json(request).send()?;
        parse_json(response)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        let url = self.endpoint(&["dashboard", "stats"], false);
        let response = self.http.get(url).send()?;
        parse_json(response)
    }

    pub fn atividades_recentes(&self, limit: u32) -> Result<AtividadesResponse, ApiError> {
        let url = self.endpoint(&["dashboard", "atividades-recentes"], false);
        let response = self
            .http
            .get(url)
            .query(&[("limit", limit.to_string())])
            .send()?;
        parse_json(response)
    }

    /// Appends percent-encoded path segments to the configured base URL.
    /// FastAPI collection routes expect the trailing slash.
    fn endpoint(&self, segments: &[&str], trailing_slash: bool) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments.iter().copied());
            if trailing_slash {
                path.push("");
            }
        }
        url
    }
}

fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = error_detail(response);
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(detail));
    }
    Err(ApiError::Status {
        status: status.as_u16(),
        detail,
    })
}

fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = ensure_success(response)?;
    let body = response.text()?;
    Ok(serde_json::from_str(&body)?)
}

/// FastAPI error bodies carry `{"detail": "..."}`; anything else is shown
/// raw, truncated to keep the status line readable.
fn error_detail(response: Response) -> String {
    let body = response.text().unwrap_or_default();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "sem detalhes".to_string();
    }
    let mut detail: String = trimmed.chars().take(200).collect();
    if detail.len() < trimmed.len() {
        detail.push_str("...");
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        let config = Config {
            api_url: base.to_string(),
            ..Config::default()
        };
        ApiClient::new(&config).expect("client")
    }

    #[test]
    fn endpoint_preserva_prefixo_da_base() {
        let api = client("http://localhost:8000/api");
        let url = api.endpoint(&["clientes"], true);
        assert_eq!(url.as_str(), "http://localhost:8000/api/clientes/");
    }

    #[test]
    fn endpoint_codifica_nome_de_template() {
        let api = client("http://localhost:8000/api");
        let url = api.endpoint(&["templates", "cobrança mensal"], false);
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/templates/cobran%C3%A7a%20mensal"
        );
    }

    #[test]
    fn endpoint_ignora_barra_final_da_base() {
        let api = client("http://localhost:8000/api/");
        let url = api.endpoint(&["dashboard", "stats"], false);
        assert_eq!(url.as_str(), "http://localhost:8000/api/dashboard/stats");
    }

    #[test]
    fn base_invalida_e_recusada() {
        let config = Config {
            api_url: "nao-e-uma-url".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            ApiClient::new(&config),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }
}
