use std::sync::mpsc::{self, Receiver, Sender};

use crate::api::{ApiClient, ApiError};
use crate::models::{
    AtividadesResponse, BatchSendRequest, BatchSendResponse, Cliente, DashboardStats,
    PreviewRequest, PreviewResponse, Template, TemplateCreate, TemplateUpdate,
};

pub struct ClienteQuery {
    pub seq: u64,
    /// `None` fetches the unfiltered list.
    pub termo: Option<String>,
    pub limit: u32,
}

pub struct ClienteQueryResult {
    pub seq: u64,
    pub termo: Option<String>,
    pub result: Result<Vec<Cliente>, ApiError>,
}

/// Serves customer list/search queries. Queued requests are drained down to
/// the newest one before hitting the network; superseded queries never
/// leave the process.
pub fn spawn_cliente_worker(
    api: ApiClient,
    ctx: egui::Context,
) -> (Sender<ClienteQuery>, Receiver<ClienteQueryResult>) {
    let (request_tx, request_rx) = mpsc::channel::<ClienteQuery>();
    let (response_tx, response_rx) = mpsc::channel::<ClienteQueryResult>();
    std::thread::spawn(move || {
        while let Ok(mut query) = request_rx.recv() {
            while let Ok(newer) = request_rx.try_recv() {
                query = newer;
            }

            let result = match query.termo.as_deref() {
                Some(termo) => api.buscar_clientes(termo, query.limit),
                None => api.listar_clientes(query.limit),
            };

            let sent = response_tx.send(ClienteQueryResult {
                seq: query.seq,
                termo: query.termo,
                result,
            });
            if sent.is_err() {
                break;
            }
            ctx.request_repaint();
        }
    });

    (request_tx, response_rx)
}

pub enum ApiTask {
    Preview(PreviewRequest),
    EnviarLote(BatchSendRequest),
    CarregarTemplates,
    ObterTemplate { nome: String },
    CriarTemplate(TemplateCreate),
    AtualizarTemplate { nome: String, update: TemplateUpdate },
    ExcluirTemplate { nome: String },
    CarregarDashboard { atividades_limit: u32 },
}

pub enum ApiTaskResult {
    Preview(Result<PreviewResponse, ApiError>),
    EnvioConcluido(Result<BatchSendResponse, ApiError>),
    Templates(Result<Vec<Template>, ApiError>),
    TemplateCarregado(Result<Template, ApiError>),
    TemplateSalvo(Result<Template, ApiError>),
    TemplateExcluido {
        nome: String,
        result: Result<(), ApiError>,
    },
    Dashboard {
        stats: Result<DashboardStats, ApiError>,
        atividades: Result<AtividadesResponse, ApiError>,
    },
}

/// Runs everything that is not a customer query, one task at a time in
/// submission order. Dispatches are never raced against each other.
pub fn spawn_task_worker(
    api: ApiClient,
    ctx: egui::Context,
) -> (Sender<ApiTask>, Receiver<ApiTaskResult>) {
    let (task_tx, task_rx) = mpsc::channel::<ApiTask>();
    let (result_tx, result_rx) = mpsc::channel::<ApiTaskResult>();
    std::thread::spawn(move || {
        while let Ok(task) = task_rx.recv() {
            let message = match task {
                ApiTask::Preview(request) => ApiTaskResult::Preview(api.preview(&request)),
                ApiTask::EnviarLote(request) => {
                    ApiTaskResult::EnvioConcluido(api.enviar_lote(&request))
                }
                ApiTask::CarregarTemplates => ApiTaskResult::Templates(api.listar_templates()),
                ApiTask::ObterTemplate { nome } => {
                    ApiTaskResult::TemplateCarregado(api.obter_template(&nome))
                }
                ApiTask::CriarTemplate(template) => {
                    ApiTaskResult::TemplateSalvo(api.criar_template(&template))
                }
                ApiTask::AtualizarTemplate { nome, update } => {
                    ApiTaskResult::TemplateSalvo(api.atualizar_template(&nome, &update))
                }
                ApiTask::ExcluirTemplate { nome } => {
                    let result = api.excluir_template(&nome);
                    ApiTaskResult::TemplateExcluido { nome, result }
                }
                ApiTask::CarregarDashboard { atividades_limit } => ApiTaskResult::Dashboard {
                    stats: api.dashboard_stats(),
                    atividades: api.atividades_recentes(atividades_limit),
                },
            };

            if result_tx.send(message).is_err() {
                break;
            }
            ctx.request_repaint();
        }
    });

    (task_tx, result_rx)
}
