use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Cliente {
    pub id: i64,
    pub nome: String,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Cliente {
    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or("ativo")
    }

    pub fn is_ativo(&self) -> bool {
        self.status_label() == "ativo"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub id: i64,
    pub nome: String,
    pub template_text: String,
    #[serde(default)]
    pub variaveis: Option<String>,
    #[serde(default = "default_ativo")]
    pub ativo: bool,
}

fn default_ativo() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateCreate {
    pub nome: String,
    pub template_text: String,
    pub variaveis: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variaveis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TipoCobranca {
    Financeira,
    Documento,
}

impl TipoCobranca {
    pub const ALL: [TipoCobranca; 2] = [TipoCobranca::Financeira, TipoCobranca::Documento];

    pub fn label(self) -> &'static str {
        match self {
            TipoCobranca::Financeira => "financeira",
            TipoCobranca::Documento => "documento",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewRequest {
    pub template_name: String,
    pub cliente_id: i64,
    pub variaveis_extras: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewResponse {
    pub cliente_nome: String,
    pub mensagem_renderizada: String,
    #[serde(default)]
    pub variaveis_utilizadas: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSendRequest {
    pub clientes_ids: Vec<i64>,
    pub tipo: TipoCobranca,
    pub mensagem_padrao: Option<String>,
    pub template_name: Option<String>,
    pub variaveis_extras: BTreeMap<String, String>,
    pub mensagens_customizadas: BTreeMap<i64, String>,
    pub enviar_agora: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchSendResponse {
    pub total_clientes: i64,
    pub enviados: i64,
    pub erros: i64,
    pub detalhes: Vec<DetalheEnvio>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetalheEnvio {
    pub cliente_nome: String,
    pub status: String,
    #[serde(default)]
    pub erro: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardStats {
    pub total_clientes: i64,
    pub clientes_ativos: i64,
    pub clientes_inadimplentes: i64,
    pub cobrancas_mes: i64,
    pub documentos_pendentes: i64,
    pub taxa_resposta: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Atividade {
    pub tipo: String,
    pub cliente: String,
    pub status: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtividadesResponse {
    pub total: i64,
    pub atividades: Vec<Atividade>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cliente_sem_status_usa_ativo() {
        let cliente: Cliente =
            serde_json::from_str(r#"{"id": 7, "nome": "Ana"}"#).expect("decode cliente");
        assert_eq!(cliente.status_label(), "ativo");
        assert!(cliente.is_ativo());
        assert!(cliente.telefone.is_none());
    }

    #[test]
    fn cliente_inadimplente_nao_e_ativo() {
        let cliente: Cliente = serde_json::from_str(
            r#"{"id": 3, "nome": "Bruno", "telefone": "+5511999990000", "status": "inadimplente"}"#,
        )
        .expect("decode cliente");
        assert!(!cliente.is_ativo());
        assert_eq!(cliente.status_label(), "inadimplente");
    }

    #[test]
    fn template_sem_flag_ativo_assume_true() {
        let template: Template =
            serde_json::from_str(r#"{"id": 1, "nome": "lembrete", "template_text": "Ola {nome}"}"#)
                .expect("decode template");
        assert!(template.ativo);
        assert!(template.variaveis.is_none());
    }

    #[test]
    fn tipo_cobranca_serializa_em_snake_case() {
        assert_eq!(
            serde_json::to_string(&TipoCobranca::Financeira).expect("serialize"),
            "\"financeira\""
        );
        assert_eq!(
            serde_json::to_string(&TipoCobranca::Documento).expect("serialize"),
            "\"documento\""
        );
    }

    #[test]
    fn template_update_omite_campos_ausentes() {
        let update = TemplateUpdate {
            template_text: Some("novo texto".into()),
            variaveis: None,
            ativo: None,
        };
        let json = serde_json::to_string(&update).expect("serialize");
        assert_eq!(json, r#"{"template_text":"novo texto"}"#);
    }

    #[test]
    fn atividades_decodificam_campos_opcionais() {
        let resposta: AtividadesResponse = serde_json::from_str(
            r#"{
                "total": 2,
                "atividades": [
                    {"tipo": "cobranca", "cliente": "Ana", "status": "enviado",
                     "data": "2026-08-20T14:02:00", "preview": "Ola Ana..."},
                    {"tipo": "documento", "cliente": "Bruno", "status": "pendente"}
                ]
            }"#,
        )
        .expect("decode atividades");
        assert_eq!(resposta.total, 2);
        assert_eq!(resposta.atividades.len(), 2);
        assert!(resposta.atividades[1].data.is_none());
        assert!(resposta.atividades[1].preview.is_none());
    }

    #[test]
    fn batch_send_response_decodifica_detalhes() {
        let resposta: BatchSendResponse = serde_json::from_str(
            r#"{
                "total_clientes": 2,
                "enviados": 1,
                "erros": 1,
                "detalhes": [
                    {"cliente_nome": "Ana", "status": "enviado"},
                    {"cliente_nome": "Bruno", "status": "erro", "erro": "contato invalido"}
                ]
            }"#,
        )
        .expect("decode resposta");
        assert_eq!(resposta.detalhes.len(), 2);
        assert!(resposta.detalhes[0].erro.is_none());
        assert_eq!(
            resposta.detalhes[1].erro.as_deref(),
            Some("contato invalido")
        );
    }
}
